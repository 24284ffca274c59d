//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Session-token identity: `keyId = "ST$<security token file contents>"`,
//! signed with the user's own private key. There is no federation call —
//! the token is expected to already be a valid security token, typically
//! placed on disk by the OCI CLI's `session authenticate` flow.

use std::sync::Arc;

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::auth::profile_provider::{Profile, ProfileProvider, ValueSource};
use crate::crypto::load_private_key_pem;
use crate::error::NoSQLError;
use crate::region::Region;

#[derive(Debug)]
pub struct SessionTokenProfileProvider {
    security_token_file: String,
    key_source: ValueSource,
    passphrase: Option<ValueSource>,
    region: Option<Region>,
    key: OnceCell<Arc<RsaPrivateKey>>,
}

impl SessionTokenProfileProvider {
    pub fn new(
        security_token_file: String,
        key_source: ValueSource,
        passphrase: Option<ValueSource>,
        region: Option<Region>,
    ) -> SessionTokenProfileProvider {
        SessionTokenProfileProvider {
            security_token_file,
            key_source,
            passphrase,
            region,
            key: OnceCell::new(),
        }
    }

    #[instrument(skip(self))]
    async fn load_key(&self) -> Result<Arc<RsaPrivateKey>, NoSQLError> {
        self.key
            .get_or_try_init(|| async {
                tracing::trace!("decrypting session-token private key");
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

    fn read_token(&self) -> Result<String, NoSQLError> {
        let content = std::fs::read_to_string(&self.security_token_file)?;
        let token = content.trim();
        if token.is_empty() {
            return Err(NoSQLError::new(
                crate::error::NoSQLErrorCode::CredentialsError,
                &format!("security token file '{}' is empty", self.security_token_file),
            ));
        }
        Ok(token.to_string())
    }
}

#[async_trait]
impl ProfileProvider for SessionTokenProfileProvider {
    #[instrument(skip(self))]
    async fn get_profile(&self, _force_refresh: bool) -> Result<Profile, NoSQLError> {
        let token = self.read_token()?;
        let private_key = self.load_key().await?;
        Ok(Profile {
            key_id: format!("ST${}", token),
            private_key,
            tenant_id: None,
            region: self.region.clone(),
        })
    }

    fn region(&self) -> Option<Region> {
        self.region.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use std::io::Write;

    fn test_pem() -> String {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_key_id_reads_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"abc.def.ghi\n").unwrap();
        drop(f);

        let provider = SessionTokenProfileProvider::new(
            path.to_str().unwrap().to_string(),
            ValueSource::Inline(test_pem()),
            None,
            None,
        );
        let profile = provider.get_profile(false).await.unwrap();
        assert_eq!(profile.key_id, "ST$abc.def.ghi");
    }

    #[tokio::test]
    async fn test_empty_token_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::File::create(&path).unwrap();

        let provider = SessionTokenProfileProvider::new(
            path.to_str().unwrap().to_string(),
            ValueSource::Inline(test_pem()),
            None,
            None,
        );
        let err = provider.get_profile(false).await.unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::CredentialsError);
    }
}
