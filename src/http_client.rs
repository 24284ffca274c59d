//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! A thin HTTP client shared by the IMDS, federation, OKE and on-prem login
//! paths: per-request timeout, a single fixed-delay retry on transport
//! error or 5xx, and an optional relaxed TLS posture for internal
//! endpoints that present self-signed or unverifiable certificates.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};

use crate::error::NoSQLError;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Build-time options for a micro-client instance.
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub timeout: Duration,
    pub danger_accept_invalid_certs: bool,
    pub extra_root_cert_pem: Option<String>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        HttpClientOptions {
            timeout: DEFAULT_TIMEOUT,
            danger_accept_invalid_certs: false,
            extra_root_cert_pem: None,
        }
    }
}

/// Wraps a `reqwest::Client` with the retry/timeout policy this subsystem
/// needs for its handful of non-data-plane HTTP calls.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(opts: HttpClientOptions) -> Result<HttpClient, NoSQLError> {
        let mut builder = Client::builder().timeout(opts.timeout);
        if opts.danger_accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = &opts.extra_root_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(NoSQLError::from)?;
            builder = builder.add_root_certificate(cert);
        }
        let inner = builder.build().map_err(NoSQLError::from)?;
        Ok(HttpClient {
            inner,
            timeout: opts.timeout,
        })
    }

    /// Issue `request`, retrying once after `RETRY_DELAY` on a transport
    /// error or a 5xx response. 4xx responses are returned as-is for the
    /// caller to interpret (callers distinguish 401/404 from other codes).
    async fn send_with_retry(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, NoSQLError> {
        match build().send().await {
            Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "retrying after server error");
            }
            Err(e) => {
                tracing::debug!(error = %e, "retrying after transport error");
            }
        }
        tokio::time::sleep(RETRY_DELAY).await;
        build().send().await.map_err(NoSQLError::from)
    }

    pub async fn get(&self, url: &str, headers: reqwest::header::HeaderMap) -> Result<Response, NoSQLError> {
        let headers = headers.clone();
        self.send_with_retry(move || {
            self.inner
                .get(url)
                .headers(headers.clone())
                .timeout(self.timeout)
        })
        .await
    }

    pub async fn post(
        &self,
        url: &str,
        headers: reqwest::header::HeaderMap,
        body: String,
    ) -> Result<Response, NoSQLError> {
        let headers = headers.clone();
        let body = body.clone();
        self.send_with_retry(move || {
            self.inner
                .post(url)
                .headers(headers.clone())
                .body(body.clone())
                .timeout(self.timeout)
        })
        .await
    }

    pub fn method(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner.request(method, url).timeout(self.timeout)
    }
}
