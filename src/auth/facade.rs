//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! The public entry point for this subsystem: [`Authorization`] turns one
//! outgoing request into the header set it must carry, dispatching to
//! either the cloud signature cache or the on-prem bearer-token provider
//! depending on how it was built.
//!
//! Builder shape -- consuming-self, fallible setters returning
//! `Result<Self, NoSQLError>`, one mutually-exclusive auth mode, a
//! `from_environment()` convenience -- is grounded directly on
//! `handle_builder.rs`'s `HandleBuilder`.

use std::env;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::instrument;

use crate::auth::cached_provider::CachedProfileProvider;
use crate::auth::config_file_provider::ConfigFileProfileProvider;
use crate::auth::instance_principal_provider::InstancePrincipalExchange;
use crate::auth::oke_provider::OkeExchange;
use crate::auth::onprem_provider::OnpremProvider;
use crate::auth::profile_provider::{CredentialsProvider, ProfileProvider, ValueProvider, ValueSource};
use crate::auth::resource_principal_provider::ResourcePrincipalExchange;
use crate::auth::session_token_provider::SessionTokenProfileProvider;
use crate::auth::signature_cache::{SignatureCache, SignatureCacheOptions};
use crate::auth::simple_provider::{CredentialsProviderProfileProvider, SimpleProfileProvider};
use crate::config::{resolve_endpoint, EndpointConfig};
use crate::error::{ia_err, NoSQLError};
use crate::http_client::{HttpClient, HttpClientOptions};
use crate::imds::ImdsClient;
use crate::region::{is_valid_ocid, string_to_region, Region};

const ORACLE_NOSQL_ENDPOINT: &str = "ORACLE_NOSQL_ENDPOINT";
const ORACLE_NOSQL_REGION: &str = "ORACLE_NOSQL_REGION";
const ORACLE_NOSQL_AUTH: &str = "ORACLE_NOSQL_AUTH";
const ORACLE_NOSQL_AUTH_FILE: &str = "ORACLE_NOSQL_AUTH_FILE";
const ORACLE_NOSQL_CA_CERT: &str = "ORACLE_NOSQL_CA_CERT";
const ORACLE_NOSQL_ACCEPT_INVALID_CERTS: &str = "ORACLE_NOSQL_ACCEPT_INVALID_CERTS";

enum Mode {
    Cloud {
        cache: Arc<SignatureCache>,
        endpoint: EndpointConfig,
        delegation_token: Option<ValueSource>,
    },
    Onprem {
        provider: Arc<OnpremProvider>,
    },
}

/// Produces the headers a request needs to be accepted by the service,
/// whichever mode the handle was built for.
pub struct Authorization {
    mode: Mode,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.mode {
            Mode::Cloud { endpoint, .. } => f.debug_struct("Authorization").field("endpoint", &endpoint.url).finish(),
            Mode::Onprem { .. } => write!(f, "Authorization(onprem)"),
        }
    }
}

impl Authorization {
    pub fn builder() -> AuthorizationBuilder {
        AuthorizationBuilder::new()
    }

    /// Sign or attach credentials to one outgoing request and return the
    /// headers it must carry. `body` is `Some` for DDL/control-plane
    /// operations that require content-signing; on-prem mode ignores it,
    /// since it authorizes with a bearer token rather than per-request
    /// signing. Equivalent to `get_authorization_with_compartment` with
    /// `compartment` set to `None`.
    pub async fn get_authorization(&self, method: &str, path: &str, body: Option<&[u8]>) -> Result<HeaderMap, NoSQLError> {
        self.get_authorization_with_compartment(method, path, body, None).await
    }

    /// Sign or attach credentials to one outgoing request, overriding the
    /// compartment the request is billed/scoped against for this call only.
    /// `compartment` takes precedence over whatever the identity's own
    /// provider chain would otherwise default to.
    #[instrument(skip(self, body))]
    pub async fn get_authorization_with_compartment(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
        compartment: Option<&str>,
    ) -> Result<HeaderMap, NoSQLError> {
        match &self.mode {
            Mode::Cloud {
                cache,
                endpoint,
                delegation_token,
            } => {
                let mut headers = cache.get_headers(method, path, &endpoint.host, body, compartment).await?;
                if let Some(token) = delegation_token {
                    let value = token.resolve().await?;
                    headers.insert("opc-obo-token", HeaderValue::from_str(&value)?);
                }
                Ok(headers)
            }
            Mode::Onprem { provider } => {
                let mut headers = HeaderMap::new();
                let bearer = provider.authorization_header(false).await?;
                headers.insert("authorization", HeaderValue::from_str(&bearer)?);
                Ok(headers)
            }
        }
    }

    /// Called by the data-plane retry handler when a request comes back
    /// with an `INVALID_AUTHORIZATION` hint: discard the cached token so
    /// the next call re-fetches cleanly.
    pub async fn invalidate(&self) {
        match &self.mode {
            Mode::Cloud { cache, .. } => cache.invalidate().await,
            Mode::Onprem { provider } => {
                let _ = provider.authorization_header(true).await;
            }
        }
    }

    /// Prefetch a Profile and Signature so the first data request does no
    /// synchronous work, and arm the background refresh timer.
    pub async fn precache_auth(&self) -> Result<(), NoSQLError> {
        match &self.mode {
            Mode::Cloud { cache, endpoint, .. } => {
                cache.get_headers("GET", "/", &endpoint.host, None, None).await?;
                cache.arm_background_refresh().await;
            }
            Mode::Onprem { provider } => {
                provider.authorization_header(false).await?;
                provider.clone().arm_renew_timer().await;
            }
        }
        Ok(())
    }

    /// Idempotent: cancel any pending refresh timer, log out of on-prem
    /// stores, and release HTTP resources.
    pub async fn close(&self) {
        match &self.mode {
            Mode::Cloud { cache, .. } => cache.close().await,
            Mode::Onprem { provider } => provider.close().await,
        }
    }
}

enum CloudSource {
    Values {
        tenancy: String,
        user: String,
        fingerprint: String,
        key: ValueSource,
        passphrase: Option<ValueSource>,
    },
    File {
        path: String,
        profile: String,
    },
    SessionToken {
        token_file: String,
        key: ValueSource,
        passphrase: Option<ValueSource>,
    },
    Instance,
    Resource,
    Oke {
        sa_token: Option<ValueSource>,
    },
    Provider(Arc<dyn CredentialsProvider>),
}

enum OnpremSource {
    UserPass { user: ValueSource, password: ValueSource },
    File(String),
    FromProvider(Arc<dyn ValueProvider>),
}

#[derive(Default)]
pub struct AuthorizationBuilder {
    endpoint_override: Option<String>,
    region: Option<Region>,
    danger_accept_invalid_certs: bool,
    extra_root_cert_pem: Option<String>,
    cloud: Option<CloudSource>,
    onprem: Option<OnpremSource>,
    delegation_token: Option<ValueSource>,
    federation_endpoint_override: Option<String>,
    signature_cache_options: SignatureCacheOptions,
    security_token_refresh_ahead_ms: Option<i64>,
}

impl AuthorizationBuilder {
    pub fn new() -> AuthorizationBuilder {
        AuthorizationBuilder::default()
    }

    fn check_mode_unset(&self) -> Result<(), NoSQLError> {
        if self.cloud.is_some() || self.onprem.is_some() {
            return ia_err!("an authentication mode has already been configured on this builder");
        }
        Ok(())
    }

    /// Direct user identity: tenancy/user/fingerprint plus a private key
    /// source, bypassing any config file.
    pub fn cloud_auth_from_values(
        mut self,
        tenancy: &str,
        user: &str,
        fingerprint: &str,
        key: ValueSource,
        passphrase: Option<ValueSource>,
    ) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        if !is_valid_ocid(tenancy) {
            return ia_err!("'{}' is not a valid tenancy OCID", tenancy);
        }
        if !is_valid_ocid(user) {
            return ia_err!("'{}' is not a valid user OCID", user);
        }
        self.cloud = Some(CloudSource::Values {
            tenancy: tenancy.to_string(),
            user: user.to_string(),
            fingerprint: fingerprint.to_string(),
            key,
            passphrase,
        });
        Ok(self)
    }

    /// Direct user identity whose whole record (tenancy/user/fingerprint/
    /// private key) is produced by a caller callback, typically backed by a
    /// secret manager rather than a config file on disk.
    pub fn cloud_auth_from_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.cloud = Some(CloudSource::Provider(provider));
        Ok(self)
    }

    /// Use an OCI config file's named profile for user-based authentication.
    pub fn cloud_auth_from_file(mut self, config_file: &str, profile: &str) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.cloud = Some(CloudSource::File {
            path: config_file.to_string(),
            profile: profile.to_string(),
        });
        Ok(self)
    }

    /// A security-token file signed with the caller's own key, bypassing
    /// any config file (config files detect this mode themselves from the
    /// presence of `security_token_file`).
    pub fn cloud_auth_session_token(mut self, token_file: &str, key: ValueSource, passphrase: Option<ValueSource>) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.cloud = Some(CloudSource::SessionToken {
            token_file: token_file.to_string(),
            key,
            passphrase,
        });
        Ok(self)
    }

    /// Use OCI Instance Principal: the instance's own certificate identity,
    /// no config file required.
    pub fn cloud_auth_from_instance(mut self) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.cloud = Some(CloudSource::Instance);
        Ok(self)
    }

    /// Override the regional IAM federation endpoint Instance Principal
    /// calls to exchange its certificate for a security token.
    pub fn federation_endpoint(mut self, endpoint: &str) -> Result<Self, NoSQLError> {
        self.federation_endpoint_override = Some(endpoint.to_string());
        Ok(self)
    }

    /// Attach a delegation token, injected as `opc-obo-token` on every
    /// request signed under Instance Principal.
    pub fn delegation_token(mut self, token: ValueSource) -> Result<Self, NoSQLError> {
        self.delegation_token = Some(token);
        Ok(self)
    }

    /// Use OCI Resource Principal, as available inside Functions, Data
    /// Flow, and similar OCI-managed compute.
    pub fn cloud_auth_from_resource(mut self) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.cloud = Some(CloudSource::Resource);
        Ok(self)
    }

    /// Use OKE workload identity: exchange the pod's projected service
    /// account token for a resource-principal session token at the node's
    /// local proxy. `sa_token` overrides the default projected-token path.
    pub fn cloud_auth_from_oke(mut self, sa_token: Option<ValueSource>) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.cloud = Some(CloudSource::Oke { sa_token });
        Ok(self)
    }

    /// A cloud-standard region identifier, e.g. `us-ashburn-1`. Defaults
    /// the endpoint to that region's NoSQL cloud service endpoint unless
    /// one was already set.
    pub fn cloud_region(mut self, region: &str) -> Result<Self, NoSQLError> {
        let r = string_to_region(region)?;
        self.region = Some(r);
        Ok(self)
    }

    /// An explicit connection endpoint, e.g. `https://nosql.mycompany.com:8080`
    /// for an on-premises server, or `http://localhost:8080` for a local
    /// development instance. Overrides any endpoint a region or config
    /// file profile would otherwise default to.
    pub fn endpoint(mut self, endpoint: &str) -> Result<Self, NoSQLError> {
        self.endpoint_override = Some(endpoint.to_string());
        Ok(self)
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Result<Self, NoSQLError> {
        self.danger_accept_invalid_certs = accept;
        Ok(self)
    }

    /// Trust an additional CA certificate (PEM) for on-prem or OKE HTTPS
    /// connections that present a self-signed or internal-CA certificate.
    pub fn add_cert_from_pemfile(mut self, pemfile: &str) -> Result<Self, NoSQLError> {
        self.extra_root_cert_pem = Some(std::fs::read_to_string(pemfile)?);
        Ok(self)
    }

    /// Username/password for a secure on-premises NoSQL server.
    pub fn onprem_auth(mut self, username: &str, password: &str) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.onprem = Some(OnpremSource::UserPass {
            user: ValueSource::Inline(username.to_string()),
            password: ValueSource::Inline(password.to_string()),
        });
        Ok(self)
    }

    /// Username/password for a secure on-premises NoSQL server, read from a
    /// `{"user": ..., "password": ...}` JSON document. Re-read on every
    /// login/renew, so a rotated file is picked up without restarting.
    pub fn onprem_auth_from_file(mut self, filename: &str) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.onprem = Some(OnpremSource::File(filename.to_string()));
        Ok(self)
    }

    /// Username/password for a secure on-premises NoSQL server, produced by
    /// a caller callback returning a `{"user": ..., "password": ...}` JSON
    /// document. Invoked on every login/renew, same as the file-based mode.
    pub fn onprem_auth_from_provider(mut self, provider: Arc<dyn ValueProvider>) -> Result<Self, NoSQLError> {
        self.check_mode_unset()?;
        self.onprem = Some(OnpremSource::FromProvider(provider));
        Ok(self)
    }

    pub fn signature_cache_options(mut self, opts: SignatureCacheOptions) -> Self {
        self.signature_cache_options = opts;
        self
    }

    /// Lead time before a security token's `exp` at which the principal
    /// providers' background refresh timer fires (Instance/Resource/OKE
    /// only; the signature cache's own timer is configured separately via
    /// [`Self::signature_cache_options`]).
    pub fn security_token_refresh_ahead_ms(mut self, ms: i64) -> Result<Self, NoSQLError> {
        self.security_token_refresh_ahead_ms = Some(ms);
        Ok(self)
    }

    /// Collect `ORACLE_NOSQL_ENDPOINT`/`ORACLE_NOSQL_REGION`/
    /// `ORACLE_NOSQL_AUTH`/`ORACLE_NOSQL_AUTH_FILE`/`ORACLE_NOSQL_CA_CERT`/
    /// `ORACLE_NOSQL_ACCEPT_INVALID_CERTS` from the process environment.
    pub fn from_environment(mut self) -> Result<Self, NoSQLError> {
        let auth_file = env::var(ORACLE_NOSQL_AUTH_FILE).ok();
        if let Ok(val) = env::var(ORACLE_NOSQL_ENDPOINT) {
            self = self.endpoint(&val)?;
        }
        if let Ok(val) = env::var(ORACLE_NOSQL_REGION) {
            self = self.cloud_region(&val)?;
        }
        if let Ok(val) = env::var(ORACLE_NOSQL_CA_CERT) {
            self = self.add_cert_from_pemfile(&val)?;
        }
        if let Ok(val) = env::var(ORACLE_NOSQL_ACCEPT_INVALID_CERTS) {
            let lv = val.to_lowercase();
            if lv == "true" || lv == "1" {
                self = self.danger_accept_invalid_certs(true)?;
            }
        }
        if let Ok(val) = env::var(ORACLE_NOSQL_AUTH) {
            match val.to_lowercase().as_str() {
                "onprem" => match &auth_file {
                    Some(f) => self = self.onprem_auth_from_file(f)?,
                    None => return ia_err!("{}=onprem requires {} to be set", ORACLE_NOSQL_AUTH, ORACLE_NOSQL_AUTH_FILE),
                },
                "resource" => self = self.cloud_auth_from_resource()?,
                "instance" => self = self.cloud_auth_from_instance()?,
                "oke" => self = self.cloud_auth_from_oke(None)?,
                "user" => match &auth_file {
                    Some(f) => self = self.cloud_auth_from_file(f, "DEFAULT")?,
                    None => self = self.cloud_auth_from_file("~/.oci/config", "DEFAULT")?,
                },
                other => return ia_err!("invalid value '{}' for {}", other, ORACLE_NOSQL_AUTH),
            }
        }
        Ok(self)
    }

    fn http_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            danger_accept_invalid_certs: self.danger_accept_invalid_certs,
            extra_root_cert_pem: self.extra_root_cert_pem.clone(),
            ..Default::default()
        }
    }

    /// Resolve the configured options into an [`Authorization`]. Exactly
    /// one of a cloud auth source or an on-prem auth source must have been
    /// configured.
    #[instrument(skip(self))]
    pub async fn build(self) -> Result<Authorization, NoSQLError> {
        if self.onprem.is_none() && self.cloud.is_none() {
            return ia_err!("no authentication mode was configured");
        }

        let http_options = self.http_options();
        let endpoint_override = self.endpoint_override.clone();
        let region = self.region.clone();
        let extra_root_cert_pem = self.extra_root_cert_pem.clone();
        let federation_endpoint_override = self.federation_endpoint_override.clone();
        let delegation_token = self.delegation_token.clone();
        let signature_cache_options = self.signature_cache_options.clone();
        let security_token_refresh_ahead_ms = self.security_token_refresh_ahead_ms;

        if let Some(onprem) = self.onprem {
            tracing::debug!("building on-prem authorization");
            let endpoint = resolve_endpoint(endpoint_override.as_deref(), region.as_ref())?;
            let http = HttpClient::new(http_options)?;
            let provider = match onprem {
                OnpremSource::UserPass { user, password } => OnpremProvider::new_with_user_pass(http, &endpoint.url, user, password),
                OnpremSource::File(path) => OnpremProvider::new_with_credentials_file(http, &endpoint.url, path),
                OnpremSource::FromProvider(provider) => OnpremProvider::new_with_credentials_provider(http, &endpoint.url, provider),
            };
            return Ok(Authorization {
                mode: Mode::Onprem { provider: Arc::new(provider) },
            });
        }

        tracing::debug!("building cloud authorization");
        fn with_refresh_ahead<T: crate::auth::cached_provider::TokenExchange>(
            provider: CachedProfileProvider<T>,
            refresh_ahead_ms: Option<i64>,
        ) -> CachedProfileProvider<T> {
            match refresh_ahead_ms {
                Some(ms) => provider.with_refresh_ahead_ms(ms),
                None => provider,
            }
        }

        let provider: Arc<dyn ProfileProvider> = match self.cloud.unwrap() {
            CloudSource::Values {
                tenancy,
                user,
                fingerprint,
                key,
                passphrase,
            } => Arc::new(SimpleProfileProvider::new(tenancy, user, fingerprint, key, passphrase, region.clone())?),
            CloudSource::File { path, profile } => Arc::new(ConfigFileProfileProvider::new_from_file(&path, &profile)?),
            CloudSource::SessionToken { token_file, key, passphrase } => {
                Arc::new(SessionTokenProfileProvider::new(token_file, key, passphrase, region.clone()))
            }
            CloudSource::Provider(credentials_provider) => {
                Arc::new(CredentialsProviderProfileProvider::new(credentials_provider, region.clone()))
            }
            CloudSource::Instance => {
                let http = HttpClient::new(http_options)?;
                let imds = ImdsClient::new(http.clone());
                let exchange = InstancePrincipalExchange::new(imds, http, federation_endpoint_override, delegation_token.clone())?;
                Arc::new(with_refresh_ahead(CachedProfileProvider::new(exchange), security_token_refresh_ahead_ms))
            }
            CloudSource::Resource => Arc::new(with_refresh_ahead(
                CachedProfileProvider::new(ResourcePrincipalExchange::new()?),
                security_token_refresh_ahead_ms,
            )),
            CloudSource::Oke { sa_token } => {
                let exchange = OkeExchange::new(sa_token, extra_root_cert_pem, region.clone())?;
                Arc::new(with_refresh_ahead(CachedProfileProvider::new(exchange), security_token_refresh_ahead_ms))
            }
        };

        let region = provider.region().or(region);
        let endpoint = resolve_endpoint(endpoint_override.as_deref(), region.as_ref())?;
        let cache = SignatureCache::new(provider, signature_cache_options);
        Ok(Authorization {
            mode: Mode::Cloud {
                cache,
                endpoint,
                delegation_token,
            },
        })
    }
}
