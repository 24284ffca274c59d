//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Resource-principal token exchange: the security token, private key, and
//! region are supplied by the surrounding OCI service (Functions, Data
//! Flow, ...) via environment variables, each either an inline value or an
//! absolute path to a file the platform keeps current. There is no network
//! call here -- `refresh()` just re-reads the environment and any paths it
//! names, so a platform-driven token rotation is picked up on the next
//! cache miss without restarting the process.

use std::env;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::instrument;

use crate::auth::cached_provider::TokenExchange;
use crate::auth::profile_provider::Profile;
use crate::crypto::load_private_key_pem;
use crate::error::{cred_err, NoSQLError};
use crate::jwt::parse_claims;
use crate::region::Region;

const RP_VERSION_ENV: &str = "OCI_RESOURCE_PRINCIPAL_VERSION";
const RP_RPST_ENV: &str = "OCI_RESOURCE_PRINCIPAL_RPST";
const RP_PRIVATE_PEM_ENV: &str = "OCI_RESOURCE_PRINCIPAL_PRIVATE_PEM";
const RP_PRIVATE_PEM_PASSPHRASE_ENV: &str = "OCI_RESOURCE_PRINCIPAL_PRIVATE_PEM_PASSPHRASE";
const RP_REGION_ENV: &str = "OCI_RESOURCE_PRINCIPAL_REGION";
const RP_VERSION_SUPPORTED: &str = "2.2";

fn is_path(val: &str) -> bool {
    std::path::Path::new(val).is_absolute()
}

fn read_env(var: &str) -> Result<String, NoSQLError> {
    env::var(var).map_err(|e| cred_err!("error reading environment variable '{}': {}", var, e).unwrap_err())
}

fn resolve_value_or_path(val: &str) -> Result<String, NoSQLError> {
    if is_path(val) {
        return Ok(std::fs::read_to_string(val)?.trim_end().to_string());
    }
    Ok(val.to_string())
}

/// Reads the resource-principal environment on every `refresh()`, trading
/// none of it for cached file descriptors, so a rotated token or key is
/// observed as soon as the cache considers itself stale.
#[derive(Debug, Default)]
pub struct ResourcePrincipalExchange {
    last_compartment: Mutex<Option<String>>,
}

impl ResourcePrincipalExchange {
    pub fn new() -> Result<ResourcePrincipalExchange, NoSQLError> {
        let version = read_env(RP_VERSION_ENV)?;
        if version != RP_VERSION_SUPPORTED {
            return cred_err!(
                "resource principal version '{}' is not supported, expected '{}'",
                version,
                RP_VERSION_SUPPORTED
            );
        }
        Ok(ResourcePrincipalExchange::default())
    }
}

#[async_trait]
impl TokenExchange for ResourcePrincipalExchange {
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(Profile, i64), NoSQLError> {
        tracing::trace!("reading resource principal environment");
        let rpst = read_env(RP_RPST_ENV)?;
        let private_pem = read_env(RP_PRIVATE_PEM_ENV)?;
        let passphrase = env::var(RP_PRIVATE_PEM_PASSPHRASE_ENV).ok();
        let region_id = read_env(RP_REGION_ENV)?;

        if let Some(p) = &passphrase {
            if is_path(p) != is_path(&private_pem) {
                return cred_err!("resource principal passphrase and private key must both be paths or both be inline values");
            }
        }

        let key_pem = resolve_value_or_path(&private_pem)?;
        let pass = match &passphrase {
            Some(p) => Some(resolve_value_or_path(p)?),
            None => None,
        };
        let private_key = load_private_key_pem(&key_pem, pass.as_deref().map(str::as_bytes))?;

        let token = {
            if is_path(&rpst) {
                std::fs::read_to_string(&rpst)?
                    .lines()
                    .next()
                    .ok_or_else(|| cred_err!("resource principal token file is empty").unwrap_err())?
                    .to_string()
            } else {
                rpst
            }
        };

        let claims = parse_claims(&token)?;
        let tenant_id = claims
            .res_tenant
            .ok_or_else(|| cred_err!("resource principal token missing 'res_tenant' claim").unwrap_err())?;
        let exp = claims
            .exp
            .ok_or_else(|| cred_err!("resource principal token missing 'exp' claim").unwrap_err())?;
        *self.last_compartment.lock().unwrap() = claims.res_compartment;

        let region = crate::region::string_to_region(&region_id)
            .unwrap_or_else(|_| crate::region::region_from_metadata(&region_id, ""));

        Ok((
            Profile {
                key_id: format!("ST${}", token),
                private_key: Arc::new(private_key),
                tenant_id: Some(tenant_id),
                region: Some(region),
            },
            exp,
        ))
    }

    fn compartment_id(&self) -> Option<String> {
        self.last_compartment.lock().unwrap().clone()
    }
}
