//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Top-of-chain cloud signature cache: wraps a [`ProfileProvider`] chain,
//! signs each outgoing request with the cached profile, and refreshes
//! ahead of expiry in the background. This is the layer that produces the
//! `Authorization`/`date`/`x-content-sha256` headers the facade attaches
//! to a request, grounded on `auth_common/signer.rs`'s header-construction
//! logic (now lifted into `auth/signer.rs`) plus the duration/refresh-ahead
//! and forced-invalidation rules in the component design.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::auth::cached_provider::now_millis;
use crate::auth::profile_provider::{Profile, ProfileProvider};
use crate::auth::signer::{formatted_date_time_utc, sign_request, SigningRequest};
use crate::error::NoSQLError;

/// Hard ceiling on how long a cached profile may be reused before the
/// chain is asked again, independent of the underlying security token's
/// own expiry. Spec default: 300s, capped at 300s.
pub const MAX_DURATION_SECONDS: u32 = 300;
const DEFAULT_REFRESH_AHEAD_MS: i64 = 10_000;

#[derive(Clone, Debug)]
pub struct SignatureCacheOptions {
    pub duration_seconds: u32,
    pub refresh_ahead_ms: i64,
}

impl Default for SignatureCacheOptions {
    fn default() -> Self {
        SignatureCacheOptions {
            duration_seconds: MAX_DURATION_SECONDS,
            refresh_ahead_ms: DEFAULT_REFRESH_AHEAD_MS,
        }
    }
}

impl SignatureCacheOptions {
    fn clamped_duration_ms(&self) -> i64 {
        self.duration_seconds.min(MAX_DURATION_SECONDS) as i64 * 1000
    }
}

/// A cached profile plus the timestamp it was fetched at. Exposed publicly
/// so callers that precache authorization can inspect what is currently
/// held without triggering a new chain call.
#[derive(Clone, Debug)]
pub struct SecurityToken {
    pub profile: Profile,
    pub fetched_at_ms: i64,
}

impl SecurityToken {
    fn is_fresh(&self, duration_ms: i64, now_ms: i64) -> bool {
        now_ms - self.fetched_at_ms < duration_ms
    }
}

/// Identifies the exact request shape a signed header set was produced
/// for. A cache hit must match all of these or the signature would be
/// wrong for the new request.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SignatureKey {
    method: String,
    path: String,
    host: String,
    body: Option<Vec<u8>>,
    compartment_override: Option<String>,
}

/// The memoized `SignatureDetails`: the exact header set produced for one
/// `SignatureKey`, held alongside the token it was signed with so a cache
/// hit returns byte-identical `Date`/`Authorization` values.
#[derive(Clone)]
struct CachedSignature {
    key: SignatureKey,
    headers: HeaderMap,
}

struct CacheEntry {
    token: SecurityToken,
    signed: Option<CachedSignature>,
}

pub struct SignatureCache {
    provider: Arc<dyn ProfileProvider>,
    options: SignatureCacheOptions,
    state: Mutex<Option<CacheEntry>>,
    timer: crate::auth::cached_provider::RefreshTimer,
}

impl std::fmt::Debug for SignatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SignatureCache").field("options", &self.options).finish_non_exhaustive()
    }
}

impl SignatureCache {
    pub fn new(provider: Arc<dyn ProfileProvider>, options: SignatureCacheOptions) -> Arc<SignatureCache> {
        Arc::new(SignatureCache {
            provider,
            options,
            state: Mutex::new(None),
            timer: crate::auth::cached_provider::RefreshTimer::new(),
        })
    }

    /// Force the next call to re-fetch from the chain, regardless of the
    /// cached entry's age. Called by the facade when a request comes back
    /// with an `INVALID_AUTHORIZATION` hint. Both the signed header cache
    /// and the security token underneath are discarded.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    /// Refresh the cached profile if the entry is stale or absent, dropping
    /// any previously signed headers (they were built from the old
    /// profile). Returns the profile now backing the cache, fresh or not.
    async fn current_profile(&self, force_refresh: bool) -> Result<Profile, NoSQLError> {
        let mut guard = self.state.lock().await;
        let now_ms = now_millis();
        if !force_refresh {
            if let Some(entry) = guard.as_ref() {
                if entry.token.is_fresh(self.options.clamped_duration_ms(), now_ms) {
                    return Ok(entry.token.profile.clone());
                }
            }
        }
        let profile = self.provider.get_profile(force_refresh).await?;
        *guard = Some(CacheEntry {
            token: SecurityToken {
                profile: profile.clone(),
                fetched_at_ms: now_ms,
            },
            signed: None,
        });
        Ok(profile)
    }

    /// Arm (or re-arm) the background refresh timer to fire
    /// `refresh_ahead_ms` before the cache's hard duration elapses.
    pub async fn arm_background_refresh(self: &Arc<Self>) {
        let delay_ms = (self.options.clamped_duration_ms() - self.options.refresh_ahead_ms).max(1_000) as u64;
        let cache = self.clone();
        self.timer
            .arm(std::time::Duration::from_millis(delay_ms), async move {
                if let Err(e) = cache.current_profile(true).await {
                    tracing::warn!(error = %e, "background signature cache refresh failed; next request will retry");
                }
            })
            .await;
    }

    pub async fn close(&self) {
        self.timer.cancel().await;
        self.provider.close().await;
    }

    fn resolve_compartment(&self, profile: &Profile, override_compartment: Option<&str>) -> Option<String> {
        if let Some(c) = override_compartment {
            return Some(c.to_string());
        }
        if let Some(c) = self.provider.compartment_id() {
            return Some(c);
        }
        profile.tenant_id.clone()
    }

    /// Sign one request, returning the header set to attach to it. `body`
    /// is `Some` for DDL/control-plane operations that require
    /// content-signing (`content-length`/`content-type`/`x-content-sha256`
    /// folded into the signing content).
    ///
    /// A request whose method/path/host/body/compartment-override exactly
    /// matches the last signed request, and which falls inside the
    /// cache's duration, gets back the identical bytes (same `Date`, same
    /// `Authorization`) rather than a freshly signed set: the cached value
    /// is the `SignatureDetails`, not just the profile it was built from.
    #[instrument(skip(self, body))]
    pub async fn get_headers(
        &self,
        method: &str,
        path: &str,
        host: &str,
        body: Option<&[u8]>,
        override_compartment: Option<&str>,
    ) -> Result<HeaderMap, NoSQLError> {
        let key = SignatureKey {
            method: method.to_string(),
            path: path.to_string(),
            host: host.to_string(),
            body: body.map(|b| b.to_vec()),
            compartment_override: override_compartment.map(|c| c.to_string()),
        };

        let mut guard = self.state.lock().await;
        let now_ms = now_millis();
        if let Some(entry) = guard.as_ref() {
            if entry.token.is_fresh(self.options.clamped_duration_ms(), now_ms) {
                if let Some(signed) = &entry.signed {
                    if signed.key == key {
                        tracing::trace!("signature cache hit");
                        return Ok(signed.headers.clone());
                    }
                }
            }
        }
        drop(guard);
        tracing::trace!("signature cache miss, signing request");

        let profile = self.current_profile(false).await?;
        let date = formatted_date_time_utc();
        let signed = sign_request(
            &SigningRequest {
                method,
                path,
                host,
                date: &date,
                body,
            },
            &profile.private_key,
            &profile.key_id,
        );

        let mut headers = HeaderMap::new();
        headers.insert("date", HeaderValue::from_str(&signed.date)?);
        headers.insert("authorization", HeaderValue::from_str(&signed.authorization)?);
        if let Some(csha) = &signed.content_sha256 {
            headers.insert("x-content-sha256", HeaderValue::from_str(csha)?);
            headers.insert("content-type", HeaderValue::from_static("application/json"));
            headers.insert("content-length", HeaderValue::from(body.map(|b| b.len()).unwrap_or(0)));
        }
        if let Some(compartment) = self.resolve_compartment(&profile, override_compartment) {
            headers.insert("x-nosql-compartment-id", HeaderValue::from_str(&compartment)?);
        }

        let mut guard = self.state.lock().await;
        if let Some(entry) = guard.as_mut() {
            entry.signed = Some(CachedSignature { key, headers: headers.clone() });
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::region::string_to_region;
    use async_trait::async_trait;
    use rsa::RsaPrivateKey;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FixedProvider {
        calls: AtomicU32,
        compartment: Option<String>,
    }

    #[async_trait]
    impl ProfileProvider for FixedProvider {
        async fn get_profile(&self, _force_refresh: bool) -> Result<Profile, NoSQLError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut rng = rand::thread_rng();
            let key = RsaPrivateKey::new(&mut rng, 512).unwrap();
            Ok(Profile {
                key_id: "t/u/f".to_string(),
                private_key: Arc::new(key),
                tenant_id: Some("ocid1.tenancy.oc1..t".to_string()),
                region: Some(string_to_region("us-ashburn-1").unwrap()),
            })
        }

        fn compartment_id(&self) -> Option<String> {
            self.compartment.clone()
        }
    }

    #[tokio::test]
    async fn test_cache_reuses_profile_within_duration() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        // second call must not have refreshed the chain
        let guard = cache.state.lock().await;
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        cache.get_headers("GET", "/p", "h", None, None).await.unwrap();
        cache.invalidate().await;
        let guard_before = cache.state.lock().await;
        assert!(guard_before.is_none());
        drop(guard_before);
        cache.get_headers("GET", "/p", "h", None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_identical_request_returns_byte_identical_headers_within_ttl() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        let first = cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        let second = cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        assert_eq!(first.get("date"), second.get("date"));
        assert_eq!(first.get("authorization"), second.get("authorization"));
    }

    #[tokio::test]
    async fn test_different_request_shape_resigns_even_within_ttl() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        let data_op = cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        let ddl_op = cache.get_headers("POST", "/V2/nosql/table/ddl", "nosql.example.com", None, None).await.unwrap();
        assert_ne!(data_op.get("authorization"), ddl_op.get("authorization"));
    }

    #[tokio::test]
    async fn test_signature_refreshes_after_duration_elapses() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(
            provider,
            SignatureCacheOptions {
                duration_seconds: 1,
                refresh_ahead_ms: 0,
            },
        );
        let first = cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let second = cache.get_headers("GET", "/V2/nosql/data", "nosql.example.com", None, None).await.unwrap();
        // a fresh profile is generated with a new RSA key each call, so a
        // real re-sign after expiry produces a different signature even
        // for the identical request shape.
        assert_ne!(first.get("authorization"), second.get("authorization"));
    }

    #[tokio::test]
    async fn test_compartment_falls_back_to_tenant_id() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        let headers = cache.get_headers("GET", "/p", "h", None, None).await.unwrap();
        assert_eq!(headers.get("x-nosql-compartment-id").unwrap(), "ocid1.tenancy.oc1..t");
    }

    #[tokio::test]
    async fn test_compartment_override_wins() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: Some("ocid1.compartment.oc1..chain".to_string()),
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        let headers = cache
            .get_headers("GET", "/p", "h", None, Some("ocid1.compartment.oc1..override"))
            .await
            .unwrap();
        assert_eq!(headers.get("x-nosql-compartment-id").unwrap(), "ocid1.compartment.oc1..override");
    }

    #[tokio::test]
    async fn test_content_signing_headers_present_for_body() {
        let provider: Arc<dyn ProfileProvider> = Arc::new(FixedProvider {
            calls: AtomicU32::new(0),
            compartment: None,
        });
        let cache = SignatureCache::new(provider, SignatureCacheOptions::default());
        let headers = cache
            .get_headers("POST", "/V2/nosql/table/ddl", "h", Some(b"{}"), None)
            .await
            .unwrap();
        assert!(headers.contains_key("x-content-sha256"));
        assert!(headers.contains_key("content-length"));
        assert!(headers.contains_key("content-type"));
    }
}
