//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Instance Metadata Service client.
//!
//! V2 is tried first with the fixed `Authorization: Bearer Oracle` header;
//! a 404 (the resource does not exist under V2, e.g. on an older image)
//! falls back to V1. Any other error status, including other 5xx
//! responses, is NOT retried against V1 -- that path already gets a
//! transport/5xx retry inside [`HttpClient`], and a second fallback would
//! hide a real outage behind a stale V1 response.

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::NoSQLError;
use crate::http_client::HttpClient;

const V2_BASE: &str = "http://169.254.169.254/opc/v2";
const V1_BASE: &str = "http://169.254.169.254/opc/v1";

pub struct ImdsClient {
    client: HttpClient,
}

impl ImdsClient {
    pub fn new(client: HttpClient) -> ImdsClient {
        ImdsClient { client }
    }

    fn auth_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer Oracle"));
        headers
    }

    /// Fetch a path relative to the metadata root, e.g. `"instance/region"`.
    pub async fn get(&self, path: &str) -> Result<String, NoSQLError> {
        let v2_url = format!("{}/{}", V2_BASE, path);
        let resp = self.client.get(&v2_url, Self::auth_headers()).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(path, "IMDS v2 returned 404, falling back to v1");
            let v1_url = format!("{}/{}", V1_BASE, path);
            let resp = self.client.get(&v1_url, HeaderMap::new()).await?;
            return text_or_error(resp).await;
        }
        text_or_error(resp).await
    }

    pub async fn get_region(&self) -> Result<String, NoSQLError> {
        Ok(self.get("instance/canonicalRegionName").await?.trim().to_lowercase())
    }

    pub async fn get_realm_domain(&self) -> Result<String, NoSQLError> {
        Ok(self
            .get("instance/regionInfo/realmDomainComponent")
            .await?
            .trim()
            .to_lowercase())
    }

    pub async fn get_leaf_certificate(&self) -> Result<String, NoSQLError> {
        self.get("identity/cert.pem").await
    }

    pub async fn get_leaf_private_key(&self) -> Result<String, NoSQLError> {
        self.get("identity/key.pem").await
    }

    pub async fn get_intermediate_certificate(&self) -> Result<String, NoSQLError> {
        self.get("identity/intermediate.pem").await
    }
}

async fn text_or_error(resp: reqwest::Response) -> Result<String, NoSQLError> {
    if !resp.status().is_success() {
        return Err(NoSQLError::new(
            crate::error::NoSQLErrorCode::ServerError,
            &format!("IMDS returned status {}", resp.status()),
        ));
    }
    Ok(resp.text().await?)
}
