//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Instance-principal token exchange: fetch the instance's X.509 identity
//! from IMDS, generate an ephemeral session keypair, and trade the
//! certificate for a short-lived security token at the regional
//! federation endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;
use x509_parser::prelude::*;

use crate::auth::cached_provider::TokenExchange;
use crate::auth::profile_provider::{Profile, ValueSource};
use crate::auth::signer::{formatted_date_time_utc, sign_request, SigningRequest};
use crate::crypto::{generate_session_keypair, public_key_spki_der_base64, sha1_fingerprint_colon_hex, strip_pem_armor};
use crate::error::{bpm_err, is_err, NoSQLError};
use crate::http_client::HttpClient;
use crate::imds::ImdsClient;
use crate::region::{region_from_metadata, Region};

#[derive(Debug)]
pub struct InstancePrincipalExchange {
    imds: ImdsClient,
    http: HttpClient,
    federation_endpoint_override: Option<String>,
    delegation_token: Option<ValueSource>,
    last_tenant: Mutex<Option<String>>,
    last_region: Mutex<Option<Region>>,
}

impl InstancePrincipalExchange {
    pub fn new(
        imds: ImdsClient,
        http: HttpClient,
        federation_endpoint_override: Option<String>,
        delegation_token: Option<ValueSource>,
    ) -> Result<InstancePrincipalExchange, NoSQLError> {
        if let Some(ep) = &federation_endpoint_override {
            validate_federation_endpoint_shape(ep)?;
        }
        Ok(InstancePrincipalExchange {
            imds,
            http,
            federation_endpoint_override,
            delegation_token,
            last_tenant: Mutex::new(None),
            last_region: Mutex::new(None),
        })
    }

    pub fn delegation_token(&self) -> Option<&ValueSource> {
        self.delegation_token.as_ref()
    }

    #[instrument(skip(self))]
    async fn federation_endpoint(&self) -> Result<(String, Region), NoSQLError> {
        if let Some(ep) = &self.federation_endpoint_override {
            // A user-specified endpoint carries no region metadata of its own;
            // still resolve the instance's region for the Profile we return.
            let region_id = self.imds.get_region().await?;
            let sld = self.imds.get_realm_domain().await?;
            let region = region_from_metadata(&region_id, &sld);
            return Ok((ep.clone(), region));
        }
        let region_id = self.imds.get_region().await?;
        let sld = self.imds.get_realm_domain().await?;
        let region = region_from_metadata(&region_id, &sld);
        Ok((format!("https://auth.{}.{}", region_id, sld), region))
    }
}

fn validate_federation_endpoint_shape(endpoint: &str) -> Result<(), NoSQLError> {
    let url = Url::parse(endpoint).map_err(NoSQLError::from)?;
    if url.scheme() != "https" {
        return crate::error::ia_err!("federationEndpoint must use https: '{}'", endpoint);
    }
    if url.port().is_some() {
        return crate::error::ia_err!("federationEndpoint must not specify a port: '{}'", endpoint);
    }
    if !url.path().is_empty() && url.path() != "/" {
        return crate::error::ia_err!("federationEndpoint must not have a path: '{}'", endpoint);
    }
    if url.query().is_some() {
        return crate::error::ia_err!("federationEndpoint must not have a query: '{}'", endpoint);
    }
    Ok(())
}

fn tenant_id_from_leaf_cert(cert_pem: &str) -> Result<String, NoSQLError> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| bpm_err!("error parsing leaf certificate PEM: {}", e).unwrap_err())?;
    let cert = pem
        .parse_x509()
        .map_err(|e| bpm_err!("error parsing leaf certificate DER: {}", e).unwrap_err())?;
    let subject = cert.subject();

    for rdn in subject.iter_organizational_unit() {
        if let Ok(s) = rdn.as_str() {
            if let Some(val) = s.strip_prefix("opc-tenant:") {
                return Ok(val.to_string());
            }
        }
    }
    for rdn in subject.iter_organization() {
        if let Ok(s) = rdn.as_str() {
            if let Some(val) = s.strip_prefix("opc-identity:") {
                return Ok(val.to_string());
            }
        }
    }
    is_err!("leaf certificate subject has no opc-tenant or opc-identity attribute")
}

fn leaf_cert_fingerprint(cert_pem: &str) -> Result<String, NoSQLError> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| bpm_err!("error parsing leaf certificate PEM: {}", e).unwrap_err())?;
    Ok(sha1_fingerprint_colon_hex(&pem.contents))
}

#[async_trait]
impl TokenExchange for InstancePrincipalExchange {
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(Profile, i64), NoSQLError> {
        let leaf_cert = self.imds.get_leaf_certificate().await?;
        let leaf_key_pem = self.imds.get_leaf_private_key().await?;
        let intermediate_cert = self.imds.get_intermediate_certificate().await?;

        let tenant_id = tenant_id_from_leaf_cert(&leaf_cert)?;
        {
            let mut guard = self.last_tenant.lock().await;
            if let Some(prev) = guard.as_ref() {
                if prev != &tenant_id {
                    return is_err!(
                        "instance principal tenant id changed across refreshes: '{}' -> '{}'",
                        prev,
                        tenant_id
                    );
                }
            }
            *guard = Some(tenant_id.clone());
        }

        let (federation_endpoint, region) = self.federation_endpoint().await?;
        *self.last_region.lock().await = Some(region.clone());

        let (session_private_key, session_public_key) = generate_session_keypair()?;
        let leaf_key = crate::crypto::load_private_key_pem(&leaf_key_pem, None)?;
        let fingerprint = leaf_cert_fingerprint(&leaf_cert)?;
        let federation_key_id = format!("{}/fed-x509/{}", tenant_id, fingerprint);

        let body = serde_json::json!({
            "certificate": strip_pem_armor(&leaf_cert),
            "publicKey": public_key_spki_der_base64(&session_public_key)?,
            "intermediateCertificates": [strip_pem_armor(&intermediate_cert)],
            "purpose": "DEFAULT",
        })
        .to_string();

        let url = Url::parse(&federation_endpoint)
            .map_err(NoSQLError::from)?
            .join("/v1/x509")
            .map_err(NoSQLError::from)?;
        let host = url.host_str().ok_or_else(|| {
            NoSQLError::new(crate::error::NoSQLErrorCode::IllegalArgument, "federation endpoint has no host")
        })?;

        let date = formatted_date_time_utc();
        let signed = sign_request(
            &SigningRequest {
                method: "POST",
                path: url.path(),
                host,
                date: &date,
                body: Some(body.as_bytes()),
            },
            &leaf_key,
            &federation_key_id,
        );

        let mut headers = HeaderMap::new();
        headers.insert("date", HeaderValue::from_str(&signed.date)?);
        headers.insert("authorization", HeaderValue::from_str(&signed.authorization)?);
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("content-length", HeaderValue::from(body.len()));
        if let Some(csha) = &signed.content_sha256 {
            headers.insert("x-content-sha256", HeaderValue::from_str(csha)?);
        }

        tracing::trace!(url = %federation_endpoint, "exchanging instance certificate for a security token");
        let resp = self.http.post(url.as_str(), headers, body).await?;
        if !resp.status().is_success() {
            return Err(NoSQLError::new(
                crate::error::NoSQLErrorCode::ServerError,
                &format!("federation endpoint returned status {}", resp.status()),
            ));
        }
        let text = resp.text().await?;
        let parsed: Value = serde_json::from_str(&text)?;
        let token = parsed
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| bpm_err!("federation response missing 'token'").unwrap_err())?;
        let exp = crate::jwt::parse_claims(token)?.exp.unwrap_or(now_plus_one_hour());

        Ok((
            Profile {
                key_id: format!("ST${}", token),
                private_key: Arc::new(session_private_key),
                tenant_id: Some(tenant_id),
                region: Some(region),
            },
            exp,
        ))
    }
}

fn now_plus_one_hour() -> i64 {
    crate::auth::cached_provider::now_millis() / 1000 + 3600
}
