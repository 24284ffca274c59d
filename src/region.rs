//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Region identifiers and the realm-domain registry.
//!
//! A [`Region`] maps a short region identifier such as `us-ashburn-1` to the
//! realm second-level-domain it lives in and the NoSQL service endpoint for
//! that realm. Only the realms actually in production for the NoSQL service
//! are registered; unknown identifiers are rejected rather than guessed at.

use crate::error::{ia_err, NoSQLError};

/// A single OCI region known to this SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    id: String,
    code: String,
    second_level_domain: String,
}

impl Region {
    /// The region identifier, e.g. `us-ashburn-1`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The short region code, e.g. `IAD`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The realm second-level-domain, e.g. `oraclecloud.com`.
    pub fn second_level_domain(&self) -> &str {
        &self.second_level_domain
    }

    /// The NoSQL cloud service endpoint for this region.
    pub fn nosql_endpoint(&self) -> String {
        format!("https://nosql.{}.oci.{}", self.id, self.second_level_domain)
    }

    /// The IAM federation endpoint used by instance principals in this region.
    pub fn federation_endpoint(&self) -> String {
        format!("https://auth.{}.{}", self.id, self.second_level_domain)
    }
}

macro_rules! region {
    ($id:expr, $code:expr, $sld:expr) => {
        Region {
            id: $id.to_string(),
            code: $code.to_string(),
            second_level_domain: $sld.to_string(),
        }
    };
}

const OC1: &str = "oraclecloud.com";
const OC2: &str = "oraclegovcloud.com";
const OC3: &str = "oraclegovcloud.com";
const OC4: &str = "oraclegovcloud.uk";
const OC8: &str = "oraclecloud8.com";
const OC9: &str = "oraclecloud9.com";
const OC10: &str = "oraclecloud10.com";

fn known_regions() -> Vec<Region> {
    vec![
        region!("us-ashburn-1", "IAD", OC1),
        region!("us-phoenix-1", "PHX", OC1),
        region!("us-sanjose-1", "SJC", OC1),
        region!("ca-toronto-1", "YYZ", OC1),
        region!("ca-montreal-1", "YUL", OC1),
        region!("sa-saopaulo-1", "GRU", OC1),
        region!("sa-santiago-1", "SCL", OC1),
        region!("sa-vinhedo-1", "VCP", OC1),
        region!("uk-london-1", "LHR", OC1),
        region!("uk-cardiff-1", "CWL", OC1),
        region!("eu-frankfurt-1", "FRA", OC1),
        region!("eu-amsterdam-1", "AMS", OC1),
        region!("eu-zurich-1", "ZRH", OC1),
        region!("eu-madrid-1", "MAD", OC1),
        region!("eu-milan-1", "LIN", OC1),
        region!("eu-marseille-1", "MRS", OC1),
        region!("eu-paris-1", "CDG", OC1),
        region!("eu-stockholm-1", "ARN", OC1),
        region!("me-jeddah-1", "JED", OC1),
        region!("me-dubai-1", "DXB", OC1),
        region!("me-abudhabi-1", "AUH", OC1),
        region!("af-johannesburg-1", "JNB", OC1),
        region!("ap-mumbai-1", "BOM", OC1),
        region!("ap-hyderabad-1", "HYD", OC1),
        region!("ap-osaka-1", "KIX", OC1),
        region!("ap-tokyo-1", "NRT", OC1),
        region!("ap-seoul-1", "ICN", OC1),
        region!("ap-chuncheon-1", "YNY", OC1),
        region!("ap-singapore-1", "SIN", OC1),
        region!("ap-singapore-2", "SGU", OC1),
        region!("ap-sydney-1", "SYD", OC1),
        region!("ap-melbourne-1", "MEL", OC1),
        region!("il-jerusalem-1", "MTZ", OC1),
        region!("us-langley-1", "LFI", OC2),
        region!("us-luke-1", "LUF", OC2),
        region!("us-gov-ashburn-1", "WAS", OC3),
        region!("us-gov-chicago-1", "ORD", OC3),
        region!("us-gov-phoenix-1", "PHX", OC3),
        region!("uk-gov-london-1", "LTN", OC4),
        region!("uk-gov-cardiff-1", "BRS", OC4),
        region!("ap-chiyoda-1", "NJA", OC8),
        region!("ap-ibaraki-1", "UKB", OC8),
        region!("me-dcc-muscat-1", "MCT", OC9),
        region!("ap-dcc-canberra-1", "CBR", OC10),
    ]
}

/// Resolve a region identifier (e.g. `"us-ashburn-1"`) into a [`Region`].
///
/// Fails with `IllegalArgument` if the identifier is not in the built-in
/// registry; there is no dynamic discovery of new realms in this subsystem.
pub fn string_to_region(id: &str) -> Result<Region, NoSQLError> {
    let needle = id.trim().to_lowercase();
    for r in known_regions() {
        if r.id == needle {
            return Ok(r);
        }
    }
    ia_err!("unknown or unsupported region identifier '{}'", id)
}

/// Resolve a region from an IMDS-reported region name plus realm domain
/// component, used by the instance-principal and OKE providers when no
/// region has been supplied by configuration.
pub fn region_from_metadata(region_id: &str, second_level_domain: &str) -> Region {
    // Prefer the registered code/domain if we know this region already; IMDS
    // occasionally reports a domain that differs in case from the registry.
    if let Ok(r) = string_to_region(region_id) {
        return r;
    }
    Region {
        id: region_id.to_lowercase(),
        code: region_id.to_uppercase(),
        second_level_domain: second_level_domain.to_string(),
    }
}

/// Syntax-check an OCID-shaped identifier without validating that the
/// resource it names actually exists.
///
/// Shape: `<type>.<realm>.<region>.<specific>`, each dot- or colon-separated
/// segment non-empty except that internal segments may be empty (as in
/// `ocid1.tenancy.oc1..aaaa...`).
pub fn is_valid_ocid(value: &str) -> bool {
    // ^([0-9a-zA-Z-_]+[.:])([0-9a-zA-Z-_]*[.:]){3,}([0-9a-zA-Z-_]+)$
    fn is_seg_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    }
    let bytes: Vec<char> = value.chars().collect();
    if bytes.is_empty() {
        return false;
    }
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in &bytes {
        if *c == '.' || *c == ':' {
            segments.push(std::mem::take(&mut current));
        } else if is_seg_char(*c) {
            current.push(*c);
        } else {
            return false;
        }
    }
    segments.push(current);
    // need: first segment non-empty, last segment non-empty, at least 4
    // separators total (5 segments), middle segments may be empty.
    if segments.len() < 5 {
        return false;
    }
    if segments.first().map(|s| s.is_empty()).unwrap_or(true) {
        return false;
    }
    if segments.last().map(|s| s.is_empty()).unwrap_or(true) {
        return false;
    }
    true
}
