//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Builds the exact signing content and `Signature` header value described
//! in the component design for the signature cache, and reused as-is by
//! the instance-principal provider to sign its own federation POST.

use chrono::Utc;
use rsa::RsaPrivateKey;

use crate::crypto::{sha256_base64, sign_sha256_base64};

const REQUEST_TARGET: &str = "(request-target)";

/// RFC 1123 date string, with the literal `GMT` offset the signing content
/// expects (`to_rfc2822` would otherwise append a numeric `+0000`).
pub fn formatted_date_time_utc() -> String {
    let rfc2822 = Utc::now().to_rfc2822();
    let without_offset = rfc2822.split('+').next().unwrap_or(&rfc2822).trim_end();
    format!("{} GMT", without_offset)
}

/// Everything needed to compute a signing string plus the headers that must
/// accompany the outgoing request.
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub host: &'a str,
    pub date: &'a str,
    /// Present for PUT/POST/PATCH requests whose body must be content-signed.
    pub body: Option<&'a [u8]>,
}

pub struct SignedHeaders {
    pub authorization: String,
    pub date: String,
    pub content_sha256: Option<String>,
}

/// Build the signing content, sign it, and assemble the `Signature` header.
pub fn sign_request(req: &SigningRequest, key: &RsaPrivateKey, key_id: &str) -> SignedHeaders {
    let mut headers_to_sign = vec![REQUEST_TARGET, "host", "date"];
    let content_sha256 = req.body.map(sha256_base64);
    if content_sha256.is_some() {
        headers_to_sign.push("content-length");
        headers_to_sign.push("content-type");
        headers_to_sign.push("x-content-sha256");
    }

    let content_length = req.body.map(|b| b.len()).unwrap_or(0);
    let signing_content = headers_to_sign
        .iter()
        .map(|h| match *h {
            REQUEST_TARGET => format!("{}: {} {}", REQUEST_TARGET, req.method.to_lowercase(), req.path),
            "host" => format!("host: {}", req.host),
            "date" => format!("date: {}", req.date),
            "content-length" => format!("content-length: {}", content_length),
            "content-type" => "content-type: application/json".to_string(),
            "x-content-sha256" => format!("x-content-sha256: {}", content_sha256.as_deref().unwrap_or("")),
            other => unreachable!("unexpected header in signing content: {}", other),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let signature = sign_sha256_base64(key, signing_content.as_bytes());
    let authorization = format!(
        r#"Signature headers="{}",keyId="{}",algorithm="rsa-sha256",signature="{}",version="1""#,
        headers_to_sign.join(" "),
        key_id,
        signature,
    );

    SignedHeaders {
        authorization,
        date: req.date.to_string(),
        content_sha256,
    }
}
