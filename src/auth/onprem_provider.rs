//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! On-premises kvstore authentication: username/password login against
//! `/V2/nosql/security/login`, a bearer token renewed before expiry at
//! `/renew`, and a best-effort `/logout` on close. Unlike the cloud
//! providers, there is no RSA signing here -- the service trusts a bearer
//! token directly, so this module does not implement `ProfileProvider`;
//! it hands the facade a ready-to-use `Authorization: Bearer ...` header.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use base64ct::Encoding;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::instrument;
use zeroize::Zeroize;

use crate::auth::cached_provider::{now_millis, RefreshTimer};
use crate::auth::profile_provider::{ValueProvider, ValueSource};
use crate::error::{ia_err, NoSQLError};
use crate::http_client::HttpClient;

/// Lead time subtracted from a token's `expireAt` before it's considered
/// due for renewal.
const NO_RENEW_BEFORE_MS: i64 = 10_000;

#[derive(Debug, Default, Deserialize)]
struct OnpremToken {
    token: String,
    #[serde(rename = "expireAt")]
    expire_at: i64,
}

struct Credentials {
    user: String,
    password: String,
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// On-prem credentials may be supplied inline, via a file, or via a
/// callback returning a `{"user":..., "password":...}` JSON document.
enum CredentialsSource {
    UserPass { user: ValueSource, password: ValueSource },
    JsonFile(String),
    FromProvider(Arc<dyn ValueProvider>),
}

pub struct OnpremProvider {
    http: HttpClient,
    endpoint: String,
    credentials: CredentialsSource,
    token: Mutex<OnpremToken>,
    timer: RefreshTimer,
    closed: StdMutex<bool>,
}

impl std::fmt::Debug for OnpremProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("OnpremProvider").field("endpoint", &self.endpoint).finish_non_exhaustive()
    }
}

impl OnpremProvider {
    pub fn new_with_user_pass(http: HttpClient, endpoint_base: &str, user: ValueSource, password: ValueSource) -> OnpremProvider {
        OnpremProvider {
            http,
            endpoint: format!("{}/V2/nosql/security", endpoint_base.trim_end_matches('/')),
            credentials: CredentialsSource::UserPass { user, password },
            token: Mutex::new(OnpremToken::default()),
            timer: RefreshTimer::new(),
            closed: StdMutex::new(false),
        }
    }

    pub fn new_with_credentials_file(http: HttpClient, endpoint_base: &str, path: String) -> OnpremProvider {
        OnpremProvider {
            http,
            endpoint: format!("{}/V2/nosql/security", endpoint_base.trim_end_matches('/')),
            credentials: CredentialsSource::JsonFile(path),
            token: Mutex::new(OnpremToken::default()),
            timer: RefreshTimer::new(),
            closed: StdMutex::new(false),
        }
    }

    pub fn new_with_credentials_provider(http: HttpClient, endpoint_base: &str, provider: Arc<dyn ValueProvider>) -> OnpremProvider {
        OnpremProvider {
            http,
            endpoint: format!("{}/V2/nosql/security", endpoint_base.trim_end_matches('/')),
            credentials: CredentialsSource::FromProvider(provider),
            token: Mutex::new(OnpremToken::default()),
            timer: RefreshTimer::new(),
            closed: StdMutex::new(false),
        }
    }

    #[instrument(skip(self))]
    async fn load_credentials(&self) -> Result<Credentials, NoSQLError> {
        #[derive(Deserialize)]
        struct Doc {
            user: String,
            password: String,
        }
        match &self.credentials {
            CredentialsSource::UserPass { user, password } => Ok(Credentials {
                user: user.resolve().await?,
                password: password.resolve().await?,
            }),
            CredentialsSource::JsonFile(path) => {
                let content = std::fs::read_to_string(path)?;
                let doc: Doc = serde_json::from_str(&content)?;
                Ok(Credentials {
                    user: doc.user,
                    password: doc.password,
                })
            }
            CredentialsSource::FromProvider(provider) => {
                let content = provider.get_value().await?;
                let doc: Doc = serde_json::from_str(&content)?;
                Ok(Credentials {
                    user: doc.user,
                    password: doc.password,
                })
            }
        }
    }

    /// Produce a valid `Authorization: Bearer ...` header value, logging in
    /// or renewing as needed.
    #[instrument(skip(self))]
    pub async fn authorization_header(&self, force: bool) -> Result<String, NoSQLError> {
        let mut guard = self.token.lock().await;
        if !force && !guard.token.is_empty() && (guard.expire_at - NO_RENEW_BEFORE_MS) > now_millis() {
            tracing::trace!("on-prem bearer token cache hit");
            return Ok(format!("Bearer {}", guard.token));
        }

        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        let (url, auth_value) = if guard.token.is_empty() {
            let creds = self.load_credentials().await?;
            let basic = base64ct::Base64::encode_string(format!("{}:{}", creds.user, creds.password).as_bytes());
            (format!("{}/login", self.endpoint), format!("Basic {}", basic))
        } else {
            (format!("{}/renew", self.endpoint), format!("Bearer {}", guard.token))
        };
        headers.insert("authorization", HeaderValue::from_str(&auth_value)?);

        tracing::trace!(url = %url, "calling on-prem security service");
        let resp = self.http.get(&url, headers).await?;
        let body = resp.text().await?;
        let parsed: OnpremToken = serde_json::from_str(&body)
            .map_err(|_| ia_err!("error from on-prem security service: {}", body).unwrap_err())?;
        guard.token = parsed.token.clone();
        guard.expire_at = parsed.expire_at;
        Ok(format!("Bearer {}", guard.token))
    }

    /// Renew at the midpoint of the token's remaining lifetime; failures
    /// are logged and simply leave the next foreground call to retry --
    /// they are never fatal and never rescheduled from here.
    pub async fn arm_renew_timer(self: std::sync::Arc<Self>) {
        let delay_ms = {
            let guard = self.token.lock().await;
            if guard.token.is_empty() {
                return;
            }
            let remaining = guard.expire_at - now_millis();
            if remaining <= 0 {
                return;
            }
            (remaining / 2).max(1) as u64
        };
        let provider = self.clone();
        self.timer
            .arm(std::time::Duration::from_millis(delay_ms), async move {
                if let Err(e) = provider.authorization_header(true).await {
                    tracing::warn!(error = %e, "on-prem token renew failed; next request will retry");
                }
            })
            .await;
    }

    pub async fn close(&self) {
        {
            let mut closed = self.closed.lock().unwrap();
            if *closed {
                return;
            }
            *closed = true;
        }
        self.timer.cancel().await;
        let guard = self.token.lock().await;
        if guard.token.is_empty() {
            return;
        }
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", guard.token)) {
            headers.insert("authorization", v);
            let url = format!("{}/logout", self.endpoint);
            if let Err(e) = self.http.get(&url, headers).await {
                tracing::debug!(error = %e, "on-prem logout failed, ignoring");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::http_client::HttpClientOptions;

    #[tokio::test]
    async fn test_load_credentials_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"user":"alice","password":"s3cret"}"#).unwrap();

        let http = HttpClient::new(HttpClientOptions::default()).unwrap();
        let provider = OnpremProvider::new_with_credentials_file(http, "https://store.example.com:8080", path.to_str().unwrap().to_string());
        let creds = provider.load_credentials().await.unwrap();
        assert_eq!(creds.user, "alice");
        assert_eq!(creds.password, "s3cret");
    }

    #[derive(Debug)]
    struct FakeValueProvider(String);

    #[async_trait::async_trait]
    impl ValueProvider for FakeValueProvider {
        async fn get_value(&self) -> Result<String, NoSQLError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_load_credentials_from_provider_callback() {
        let http = HttpClient::new(HttpClientOptions::default()).unwrap();
        let provider = OnpremProvider::new_with_credentials_provider(
            http,
            "https://store.example.com:8080",
            Arc::new(FakeValueProvider(r#"{"user":"bob","password":"hunter2"}"#.to_string())),
        );
        let creds = provider.load_credentials().await.unwrap();
        assert_eq!(creds.user, "bob");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_endpoint_base_trims_trailing_slash() {
        let http = HttpClient::new(HttpClientOptions::default()).unwrap();
        let provider = OnpremProvider::new_with_user_pass(
            http,
            "https://store.example.com:8080/",
            ValueSource::Inline("u".to_string()),
            ValueSource::Inline("p".to_string()),
        );
        assert_eq!(provider.endpoint, "https://store.example.com:8080/V2/nosql/security");
    }
}
