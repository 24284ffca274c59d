//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! The `ProfileProvider` capability every cloud identity source implements,
//! and the [`Profile`] it produces.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use rsa::RsaPrivateKey;

use crate::error::NoSQLError;
use crate::region::Region;

/// The signing material needed to produce a `Signature` header for one
/// request: a `keyId`, the private key it names, and (when known) the
/// tenant and region that material belongs to.
#[derive(Clone)]
pub struct Profile {
    pub key_id: String,
    pub private_key: Arc<RsaPrivateKey>,
    pub tenant_id: Option<String>,
    pub region: Option<Region>,
}

impl Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("key_id", &self.key_id)
            .field("tenant_id", &self.tenant_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Any source of signing material: a user's own credentials, or a
/// principal-based exchange that produces a short-lived security token.
///
/// Caching and single-flight coalescing are composed on top of this trait
/// (see `cached_provider`), not baked into individual implementations.
#[async_trait]
pub trait ProfileProvider: Send + Sync + Debug {
    /// Produce a `Profile`, refreshing underlying material if `force_refresh`
    /// is set or the implementation's own cache considers itself stale.
    async fn get_profile(&self, force_refresh: bool) -> Result<Profile, NoSQLError>;

    /// The region this provider knows about, if any. Direct/file-based
    /// providers may expose one from configuration; principal-based
    /// providers may only learn it after the first successful refresh.
    fn region(&self) -> Option<Region> {
        None
    }

    /// A compartment this provider can default requests to (only resource
    /// principal, when `useResourcePrincipalCompartment` applies).
    fn compartment_id(&self) -> Option<String> {
        None
    }

    /// Release any resources (HTTP clients, background timers) this
    /// provider owns. Idempotent; errors are logged and swallowed.
    async fn close(&self) {}
}

/// A value that may be supplied inline, read from a file, or produced by an
/// async callback, validated eagerly wherever it's constructed. Used for the
/// handful of fields that can come from any of those three places: private
/// keys, on-prem credentials, delegation tokens, and service-account
/// tokens.
#[derive(Clone)]
pub enum ValueSource {
    Inline(String),
    FromFile(String),
    FromProvider(Arc<dyn ValueProvider>),
}

impl Debug for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ValueSource::Inline(_) => write!(f, "ValueSource::Inline(..)"),
            ValueSource::FromFile(p) => write!(f, "ValueSource::FromFile({:?})", p),
            ValueSource::FromProvider(_) => write!(f, "ValueSource::FromProvider(..)"),
        }
    }
}

impl ValueSource {
    pub async fn resolve(&self) -> Result<String, NoSQLError> {
        match self {
            ValueSource::Inline(v) => Ok(v.clone()),
            ValueSource::FromFile(path) => std::fs::read_to_string(path)
                .map(|s| s.trim_end().to_string())
                .map_err(NoSQLError::from),
            ValueSource::FromProvider(p) => p.get_value().await,
        }
    }
}

/// A caller-supplied async callback producing a string value (a delegation
/// token, a service-account token, or a set of on-prem credentials encoded
/// as the caller sees fit).
#[async_trait]
pub trait ValueProvider: Send + Sync + Debug {
    async fn get_value(&self) -> Result<String, NoSQLError>;
}

/// The whole-record result of a [`CredentialsProvider`] callback: a direct
/// cloud identity supplied as one unit rather than assembled field by field.
#[derive(Clone)]
pub struct UserCredentials {
    pub tenancy: String,
    pub user: String,
    pub fingerprint: String,
    pub private_key_pem: String,
    pub passphrase: Option<String>,
}

impl Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("tenancy", &self.tenancy)
            .field("user", &self.user)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// A caller-supplied async callback producing a whole direct-identity
/// record at once (tenancy, user, fingerprint, and private key), typically
/// backed by a secret manager rather than a config file on disk.
#[async_trait]
pub trait CredentialsProvider: Send + Sync + Debug {
    async fn get_credentials(&self) -> Result<UserCredentials, NoSQLError>;
}
