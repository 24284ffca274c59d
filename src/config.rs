//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Endpoint resolution shared by the facade builder: normalizing an
//! explicit `endpoint()` string or defaulting one from a configured
//! `Region`, the way `handle_builder.rs`'s `endpoint()`/`cloud_region()`
//! do for the full SDK.

use crate::error::{ia_err, NoSQLError};
use crate::region::Region;

/// A fully-resolved target: the URL the facade's owned HTTP clients
/// connect to, and the bare hostname that goes into the `host` signing
/// line (ports are never part of the signed host, matching
/// `auth_common/signer.rs`'s `url_data.host()` lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub url: String,
    pub host: String,
}

/// Split a raw endpoint into `(use_https, host[:port])`, stripping a
/// recognized scheme prefix the same way `HandleBuilder::endpoint()` does.
/// An endpoint given with no scheme is assumed https, since that is the
/// only scheme the cloud service and a properly configured on-prem server
/// ever present.
fn normalize_endpoint(raw: &str) -> (bool, String) {
    if let Some(rest) = raw.strip_prefix("https://") {
        (true, rest.to_string())
    } else if let Some(rest) = raw.strip_prefix("http://") {
        (false, rest.to_string())
    } else {
        (true, raw.to_string())
    }
}

/// Resolve the endpoint to connect to: an explicit endpoint always wins;
/// otherwise fall back to the configured region's NoSQL cloud endpoint.
/// At least one of the two must be present.
pub fn resolve_endpoint(explicit: Option<&str>, region: Option<&Region>) -> Result<EndpointConfig, NoSQLError> {
    let raw = match (explicit, region) {
        (Some(e), _) => e.to_string(),
        (None, Some(r)) => r.nosql_endpoint(),
        (None, None) => return ia_err!("either an endpoint or a region must be configured"),
    };
    let (use_https, host_port) = normalize_endpoint(&raw);
    let host = host_port.split(':').next().unwrap_or("").to_string();
    if host.is_empty() {
        return ia_err!("invalid endpoint '{}': no host", raw);
    }
    let scheme = if use_https { "https" } else { "http" };
    Ok(EndpointConfig {
        url: format!("{}://{}", scheme, host_port),
        host,
    })
}
