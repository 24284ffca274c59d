//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! The direct user-identity provider: a `Profile` built once from a
//! tenancy/user/fingerprint triple and a private key supplied inline, by
//! file path, or by a caller callback. The key is decrypted lazily on
//! first use and cached for the lifetime of the provider.

use std::sync::Arc;

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use tokio::sync::OnceCell;

use crate::auth::profile_provider::{CredentialsProvider, Profile, ProfileProvider, ValueSource};
use crate::crypto::load_private_key_pem;
use crate::error::{ia_err, NoSQLError};
use crate::region::{is_valid_ocid, Region};
use tracing::instrument;

#[derive(Debug)]
pub struct SimpleProfileProvider {
    tenancy_id: String,
    user_id: String,
    fingerprint: String,
    key_source: ValueSource,
    passphrase: Option<ValueSource>,
    region: Option<Region>,
    key: OnceCell<Arc<RsaPrivateKey>>,
}

impl SimpleProfileProvider {
    pub fn new(
        tenancy_id: String,
        user_id: String,
        fingerprint: String,
        key_source: ValueSource,
        passphrase: Option<ValueSource>,
        region: Option<Region>,
    ) -> Result<SimpleProfileProvider, NoSQLError> {
        if !is_valid_ocid(&tenancy_id) {
            return ia_err!("'{}' is not a valid tenancy OCID", tenancy_id);
        }
        if !is_valid_ocid(&user_id) {
            return ia_err!("'{}' is not a valid user OCID", user_id);
        }
        Ok(SimpleProfileProvider {
            tenancy_id,
            user_id,
            fingerprint,
            key_source,
            passphrase,
            region,
            key: OnceCell::new(),
        })
    }

    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy_id, self.user_id, self.fingerprint)
    }

    #[instrument(skip(self))]
    async fn load_key(&self) -> Result<Arc<RsaPrivateKey>, NoSQLError> {
        self.key
            .get_or_try_init(|| async {
                tracing::trace!("decrypting direct-identity private key");
                let pem = self.key_source.resolve().await?;
                let pass = match &self.passphrase {
                    Some(p) => Some(p.resolve().await?),
                    None => None,
                };
                let key = load_private_key_pem(&pem, pass.as_deref().map(str::as_bytes))?;
                Ok(Arc::new(key))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl ProfileProvider for SimpleProfileProvider {
    #[instrument(skip(self), fields(key_id = %self.key_id()))]
    async fn get_profile(&self, _force_refresh: bool) -> Result<Profile, NoSQLError> {
        let private_key = self.load_key().await?;
        Ok(Profile {
            key_id: self.key_id(),
            private_key,
            tenant_id: Some(self.tenancy_id.clone()),
            region: self.region.clone(),
        })
    }

    fn region(&self) -> Option<Region> {
        self.region.clone()
    }
}

/// A direct-identity provider whose tenancy/user/fingerprint/private-key
/// record is produced by a caller callback rather than assembled from
/// individual config values. The callback is invoked once and the result
/// validated and cached the same way `SimpleProfileProvider` caches its key.
pub struct CredentialsProviderProfileProvider {
    provider: Arc<dyn CredentialsProvider>,
    region: Option<Region>,
    profile: OnceCell<Profile>,
}

impl std::fmt::Debug for CredentialsProviderProfileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CredentialsProviderProfileProvider").finish_non_exhaustive()
    }
}

impl CredentialsProviderProfileProvider {
    pub fn new(provider: Arc<dyn CredentialsProvider>, region: Option<Region>) -> CredentialsProviderProfileProvider {
        CredentialsProviderProfileProvider {
            provider,
            region,
            profile: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ProfileProvider for CredentialsProviderProfileProvider {
    #[instrument(skip(self))]
    async fn get_profile(&self, _force_refresh: bool) -> Result<Profile, NoSQLError> {
        self.profile
            .get_or_try_init(|| async {
                tracing::trace!("invoking credentials-provider callback");
                let creds = self.provider.get_credentials().await?;
                if !is_valid_ocid(&creds.tenancy) {
                    return ia_err!("'{}' is not a valid tenancy OCID", creds.tenancy);
                }
                if !is_valid_ocid(&creds.user) {
                    return ia_err!("'{}' is not a valid user OCID", creds.user);
                }
                let private_key = load_private_key_pem(&creds.private_key_pem, creds.passphrase.as_deref().map(str::as_bytes))?;
                Ok(Profile {
                    key_id: format!("{}/{}/{}", creds.tenancy, creds.user, creds.fingerprint),
                    private_key: Arc::new(private_key),
                    tenant_id: Some(creds.tenancy),
                    region: self.region.clone(),
                })
            })
            .await
            .cloned()
    }

    fn region(&self) -> Option<Region> {
        self.region.clone()
    }
}
