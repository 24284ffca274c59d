//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Minimal JWT-lite parsing.
//!
//! This subsystem never verifies a token's signature: tokens consumed here
//! (security tokens, resource-principal RPSTs, Kubernetes service-account
//! tokens) arrive over a channel already trusted (TLS to IMDS, TLS to the
//! federation endpoint, a projected volume mounted by the kubelet), so only
//! the claims are of interest.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::Value;

use crate::error::{bpm_err, is_err, NoSQLError};

/// The claims this crate cares about, decoded from a JWT-like token's
/// payload segment.
#[derive(Debug, Clone, Default)]
pub struct Claims {
    pub exp: Option<i64>,
    pub res_tenant: Option<String>,
    pub res_compartment: Option<String>,
}

/// Parse `header.payload.signature` and decode the payload segment as JSON.
/// The header and signature segments are not inspected.
pub fn parse_claims(token: &str) -> Result<Claims, NoSQLError> {
    let mut parts = token.split('.');
    if parts.next().is_none() {
        return bpm_err!("invalid token: missing header segment");
    }
    let payload = match parts.next() {
        Some(p) if !p.is_empty() => p,
        _ => return bpm_err!("invalid token: missing payload segment"),
    };
    let decoded = Base64UrlUnpadded::decode_vec(payload)
        .map_err(|e| NoSQLError::new(crate::error::NoSQLErrorCode::BadProtocolMessage, &format!("invalid base64url in token payload: {}", e)))?;
    let v: Value = serde_json::from_slice(&decoded)?;

    Ok(Claims {
        exp: v.get("exp").and_then(Value::as_i64),
        res_tenant: v.get("res_tenant").and_then(Value::as_str).map(str::to_string),
        res_compartment: v.get("res_compartment").and_then(Value::as_str).map(str::to_string),
    })
}

/// Parse claims and require that `exp` is present and in the future,
/// returning the expiration (seconds since epoch) on success.
pub fn require_unexpired(token: &str, now_secs: i64) -> Result<i64, NoSQLError> {
    let claims = parse_claims(token)?;
    let exp = match claims.exp {
        Some(e) => e,
        None => return is_err!("token is missing required 'exp' claim"),
    };
    if exp <= now_secs {
        return is_err!("token has already expired (exp={}, now={})", exp, now_secs);
    }
    Ok(exp)
}

#[cfg(test)]
mod test {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};

    fn make_token(payload_json: &str) -> String {
        let header = Base64UrlUnpadded::encode_string(b"{\"alg\":\"none\"}");
        let payload = Base64UrlUnpadded::encode_string(payload_json.as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_parse_claims_full() {
        let token = make_token(r#"{"exp":9999999999,"res_tenant":"ocid1.tenancy.oc1..aaa","res_compartment":"ocid1.compartment.oc1..bbb"}"#);
        let claims = parse_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(9999999999));
        assert_eq!(claims.res_tenant.as_deref(), Some("ocid1.tenancy.oc1..aaa"));
        assert_eq!(claims.res_compartment.as_deref(), Some("ocid1.compartment.oc1..bbb"));
    }

    #[test]
    fn test_parse_claims_missing_payload() {
        let err = parse_claims("onlyheader").unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::BadProtocolMessage);
    }

    #[test]
    fn test_require_unexpired_rejects_past() {
        let token = make_token(r#"{"exp":100}"#);
        let err = require_unexpired(&token, 200).unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::IllegalState);
    }

    #[test]
    fn test_require_unexpired_missing_exp() {
        let token = make_token(r#"{"res_tenant":"x"}"#);
        let err = require_unexpired(&token, 200).unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::IllegalState);
    }

    #[test]
    fn test_require_unexpired_ok() {
        let token = make_token(r#"{"exp":99999999999}"#);
        let exp = require_unexpired(&token, 200).unwrap();
        assert_eq!(exp, 99999999999);
    }
}
