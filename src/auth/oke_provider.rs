//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! OKE workload-identity token exchange: trade the pod's projected
//! Kubernetes service-account token for an OCI resource-principal session
//! token at the node's local proxy, `https://<KUBERNETES_SERVICE_HOST>:12250`.
//!
//! There is no teacher precedent for this provider -- the retrieved SDK
//! predates OKE workload identity -- so the request/response shapes below
//! are built directly from the component design rather than adapted from
//! an existing file.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::instrument;

use crate::auth::cached_provider::TokenExchange;
use crate::auth::profile_provider::{Profile, ValueSource};
use crate::crypto::{generate_session_keypair, public_key_spki_der_base64};
use crate::error::{bpm_err, NoSQLError};
use crate::http_client::{HttpClient, HttpClientOptions};
use crate::jwt::require_unexpired;
use crate::region::Region;

const OKE_PROXY_PORT: u16 = 12250;
const OKE_PROXY_PATH: &str = "/resourcePrincipalSessionTokens";
const SA_TOKEN_DEFAULT_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

fn random_request_id() -> String {
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            std::char::from_digit(n as u32, 16).unwrap().to_ascii_uppercase()
        })
        .collect()
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs() as i64
}

/// Unwrap the node proxy's response envelope: the body arrives as a
/// quoted, base64-encoded string wrapping the actual JSON document.
fn unwrap_oke_response(raw: &str) -> Result<Value, NoSQLError> {
    let unquoted = raw.trim().trim_matches('"');
    let decoded = Base64::decode_vec(unquoted).map_err(|e| bpm_err!("error base64-decoding OKE proxy response: {}", e).unwrap_err())?;
    let json_text = String::from_utf8(decoded).map_err(|e| bpm_err!("OKE proxy response is not valid UTF-8: {}", e).unwrap_err())?;
    serde_json::from_str(&json_text).map_err(NoSQLError::from)
}

/// Strip the parsed `token` field's required leading three characters. The
/// value already embeds its own `"ST$"` prefix; those three bytes are
/// dropped here so the single prefix this module adds when building the
/// Profile's `keyId` isn't doubled.
fn strip_oke_token_prefix(token: &str) -> Result<String, NoSQLError> {
    if token.len() < 3 {
        return bpm_err!("OKE session token too short to strip prefix: '{}'", token);
    }
    Ok(token[3..].to_string())
}

#[derive(Debug)]
pub struct OkeExchange {
    http: HttpClient,
    proxy_host: String,
    sa_token: ValueSource,
    region: Option<Region>,
}

impl OkeExchange {
    pub fn new(sa_token: Option<ValueSource>, ca_cert_pem: Option<String>, region: Option<Region>) -> Result<OkeExchange, NoSQLError> {
        let proxy_host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            NoSQLError::new(
                crate::error::NoSQLErrorCode::CredentialsError,
                "KUBERNETES_SERVICE_HOST is not set; not running in an OKE pod",
            )
        })?;
        let http = HttpClient::new(HttpClientOptions {
            extra_root_cert_pem: ca_cert_pem,
            ..Default::default()
        })?;
        Ok(OkeExchange {
            http,
            proxy_host,
            sa_token: sa_token.unwrap_or_else(|| ValueSource::FromFile(SA_TOKEN_DEFAULT_FILE.to_string())),
            region,
        })
    }
}

#[async_trait]
impl TokenExchange for OkeExchange {
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(Profile, i64), NoSQLError> {
        let sa_token = self.sa_token.resolve().await?;
        require_unexpired(&sa_token, now_secs())?;

        let (session_private_key, session_public_key) = generate_session_keypair()?;
        let pod_key = public_key_spki_der_base64(&session_public_key)?;
        let body = serde_json::json!({ "podKey": pod_key }).to_string();

        let url = format!("https://{}:{}{}", self.proxy_host, OKE_PROXY_PORT, OKE_PROXY_PATH);
        let mut headers = HeaderMap::new();
        headers.insert("opc-request-id", HeaderValue::from_str(&random_request_id())?);
        headers.insert("authorization", HeaderValue::from_str(&format!("Bearer {}", sa_token))?);
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        tracing::trace!(url = %url, "exchanging OKE service account token for a session token");
        let resp = self.http.post(&url, headers, body).await?;
        if !resp.status().is_success() {
            return Err(NoSQLError::new(
                crate::error::NoSQLErrorCode::ServerError,
                &format!("OKE proxy returned status {}", resp.status()),
            ));
        }
        let raw_text = resp.text().await?;
        let parsed = unwrap_oke_response(&raw_text)?;
        let token_field = parsed
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| bpm_err!("OKE proxy response missing 'token'").unwrap_err())?;
        let token = strip_oke_token_prefix(token_field)?;

        let exp = require_unexpired(&token, now_secs())?;

        Ok((
            Profile {
                key_id: format!("ST${}", token),
                private_key: Arc::new(session_private_key),
                tenant_id: None,
                region: self.region.clone(),
            },
            exp,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use base64ct::Base64UrlUnpadded;

    fn make_jwt(payload_json: &str) -> String {
        let header = Base64UrlUnpadded::encode_string(b"{\"alg\":\"none\"}");
        let payload = Base64UrlUnpadded::encode_string(payload_json.as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    /// Wrap a session token the way the node proxy does: `{"token":
    /// "ST$<jwt>"}`, base64-encoded, then quoted -- the full envelope
    /// `unwrap_oke_response`/`strip_oke_token_prefix` must unwind.
    fn wrap_proxy_response(embedded_token: &str) -> String {
        let json = serde_json::json!({ "token": embedded_token }).to_string();
        format!("\"{}\"", Base64::encode_string(json.as_bytes()))
    }

    #[test]
    fn test_unwrap_oke_response_full_envelope() {
        let jwt = make_jwt(r#"{"exp":99999999999}"#);
        let embedded = format!("ST${}", jwt);
        let wire = wrap_proxy_response(&embedded);

        let parsed = unwrap_oke_response(&wire).unwrap();
        let token_field = parsed.get("token").and_then(Value::as_str).unwrap();
        assert_eq!(token_field, embedded);

        let token = strip_oke_token_prefix(token_field).unwrap();
        assert_eq!(token, jwt);
        // the final keyId must carry exactly one "ST$" prefix, not the
        // "ST$ST$..." that stripping the raw body (instead of the parsed
        // token field) would have produced.
        assert_eq!(format!("ST${}", token), format!("ST${}", jwt));
    }

    #[test]
    fn test_strip_oke_token_prefix() {
        assert_eq!(strip_oke_token_prefix("abcXYZ").unwrap(), "XYZ");
    }

    #[test]
    fn test_strip_oke_token_prefix_too_short() {
        let err = strip_oke_token_prefix("ab").unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::BadProtocolMessage);
    }

    #[test]
    fn test_unwrap_oke_response_rejects_bad_base64() {
        let err = unwrap_oke_response("\"not valid base64!!\"").unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::BadProtocolMessage);
    }

    #[test]
    fn test_random_request_id_shape() {
        let id = random_request_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.chars().all(|c| !c.is_ascii_lowercase()));
    }
}
