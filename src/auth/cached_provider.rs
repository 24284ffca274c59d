//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Shared base for the principal-based providers (instance, resource, OKE):
//! caches the `Profile` produced by a token exchange, keyed off the
//! security token's `exp` claim, and coalesces concurrent refreshes.
//!
//! Single-flight is implemented by holding the cache's own
//! `tokio::sync::Mutex` across the refresh `.await`: the first caller to
//! miss the cache performs the exchange while holding the lock; every
//! other concurrent caller blocks on the same lock and, once it acquires
//! it, finds a freshly populated and valid entry rather than triggering a
//! second exchange.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::auth::profile_provider::{Profile, ProfileProvider};
use crate::error::NoSQLError;
use crate::region::Region;

/// Default lead time subtracted from a security token's `exp` before the
/// background refresh timer fires, mirroring the signature cache's own
/// refresh-ahead default.
const DEFAULT_SECURITY_TOKEN_REFRESH_AHEAD_MS: i64 = 10_000;

pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as i64
}

/// Performs the actual credential exchange for one principal kind. Returns
/// the new `Profile` plus the `exp` (seconds since epoch) of the security
/// token backing it.
#[async_trait]
pub trait TokenExchange: Send + Sync + Debug {
    async fn refresh(&self) -> Result<(Profile, i64), NoSQLError>;

    /// Safety margin subtracted from `exp` before considering the cached
    /// profile invalid; spec default is 0 for most providers.
    fn expire_before_ms(&self) -> i64 {
        0
    }

    /// A compartment this exchange's last-fetched token names (only
    /// resource principal, via its token's `res_compartment` claim).
    fn compartment_id(&self) -> Option<String> {
        None
    }
}

struct CachedEntry {
    profile: Profile,
    exp_secs: i64,
}

/// Wraps a [`TokenExchange`] with the caching/single-flight contract every
/// principal-based `ProfileProvider` needs, plus a security-token-layer
/// background refresh timer distinct from the signature cache's own timer
/// above it.
pub struct CachedProfileProvider<T: TokenExchange> {
    exchange: Arc<T>,
    state: Arc<Mutex<Option<CachedEntry>>>,
    closed: AtomicBool,
    refresh_ahead_ms: i64,
    timer: Arc<RefreshTimer>,
}

impl<T: TokenExchange> Debug for CachedProfileProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CachedProfileProvider")
            .field("exchange", &self.exchange)
            .finish()
    }
}

impl<T: TokenExchange> CachedProfileProvider<T> {
    pub fn new(exchange: T) -> CachedProfileProvider<T> {
        CachedProfileProvider {
            exchange: Arc::new(exchange),
            state: Arc::new(Mutex::new(None)),
            closed: AtomicBool::new(false),
            refresh_ahead_ms: DEFAULT_SECURITY_TOKEN_REFRESH_AHEAD_MS,
            timer: Arc::new(RefreshTimer::new()),
        }
    }

    /// Override the lead time before a security token's `exp` at which the
    /// background refresh timer fires (`securityTokenRefreshAheadMs`).
    pub fn with_refresh_ahead_ms(mut self, refresh_ahead_ms: i64) -> Self {
        self.refresh_ahead_ms = refresh_ahead_ms;
        self
    }

    fn is_valid(entry: &CachedEntry, expire_before_ms: i64, now_ms: i64) -> bool {
        entry.exp_secs * 1000 - expire_before_ms > now_ms
    }

    /// `exp*1000 - now - expireBeforeMs`, the same quantity the background
    /// refresh timer uses to decide its delay; exposed so callers can
    /// inspect the current entry's remaining lifetime without triggering a
    /// new exchange.
    pub async fn current_duration_ms(&self) -> Option<i64> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .map(|e| e.exp_secs * 1000 - now_millis() - self.exchange.expire_before_ms())
    }

    /// Arm (or re-arm) the background refresh timer to fire
    /// `refresh_ahead_ms` before the cached security token's `exp`.
    /// Refresh failures are logged and left for the next foreground call to
    /// retry; a successful background refresh replaces the cached entry so
    /// the next foreground call sees it without re-exchanging.
    async fn arm_background_refresh(&self, exp_secs: i64) {
        let delay_ms = (exp_secs * 1000 - now_millis() - self.refresh_ahead_ms).max(1_000) as u64;
        let exchange = self.exchange.clone();
        let state = self.state.clone();
        self.timer
            .arm(std::time::Duration::from_millis(delay_ms), async move {
                match exchange.refresh().await {
                    Ok((profile, exp_secs)) => {
                        *state.lock().await = Some(CachedEntry { profile, exp_secs });
                        tracing::trace!(exp_secs, "background security-token refresh succeeded");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "background security-token refresh failed; next request will retry");
                    }
                }
            })
            .await;
    }
}

#[async_trait]
impl<T: TokenExchange> ProfileProvider for CachedProfileProvider<T> {
    #[instrument(skip(self))]
    async fn get_profile(&self, force_refresh: bool) -> Result<Profile, NoSQLError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NoSQLError::new(
                crate::error::NoSQLErrorCode::IllegalState,
                "authorization provider has been closed",
            ));
        }
        let mut guard = self.state.lock().await;
        let now_ms = now_millis();
        if !force_refresh {
            if let Some(entry) = guard.as_ref() {
                if Self::is_valid(entry, self.exchange.expire_before_ms(), now_ms) {
                    tracing::trace!("security-token cache hit");
                    return Ok(entry.profile.clone());
                }
            }
        }
        tracing::trace!(force_refresh, "security-token cache miss, exchanging for a new token");
        let (profile, exp_secs) = self.exchange.refresh().await?;
        let result = profile.clone();
        *guard = Some(CachedEntry { profile, exp_secs });
        drop(guard);
        self.arm_background_refresh(exp_secs).await;
        Ok(result)
    }

    fn region(&self) -> Option<Region> {
        self.state
            .try_lock()
            .ok()
            .and_then(|g| g.as_ref().and_then(|e| e.profile.region.clone()))
    }

    fn compartment_id(&self) -> Option<String> {
        self.exchange.compartment_id()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.timer.cancel().await;
    }
}

/// A single cancelable reset-on-success background timer, shared by the
/// security-token cache and the signature cache. Dropping the handle (or
/// calling `cancel`) stops the timer; it never panics into the runtime —
/// callback failures are logged and simply leave the next foreground call
/// to retry.
pub struct RefreshTimer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshTimer {
    pub fn new() -> RefreshTimer {
        RefreshTimer {
            handle: Mutex::new(None),
        }
    }

    /// Arm a one-shot timer that fires `action` after `delay`, replacing
    /// any previously armed timer.
    pub async fn arm<F>(&self, delay: std::time::Duration, action: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.handle.lock().await;
        if let Some(old) = guard.take() {
            old.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        *guard = Some(handle);
    }

    pub async fn cancel(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(old) = guard.take() {
            old.abort();
        }
    }
}

impl Default for RefreshTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::region::string_to_region;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc as StdArc;

    #[derive(Debug)]
    struct CountingExchange {
        calls: StdArc<AtomicU32>,
        exp_secs: i64,
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn refresh(&self) -> Result<(Profile, i64), NoSQLError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut rng = rand::thread_rng();
            let key = rsa::RsaPrivateKey::new(&mut rng, 512).unwrap();
            Ok((
                Profile {
                    key_id: "ST$tok".to_string(),
                    private_key: StdArc::new(key),
                    tenant_id: None,
                    region: Some(string_to_region("us-ashburn-1").unwrap()),
                },
                self.exp_secs,
            ))
        }
    }

    #[tokio::test]
    async fn test_cache_hit_reuses_profile() {
        let calls = StdArc::new(AtomicU32::new(0));
        let provider = CachedProfileProvider::new(CountingExchange {
            calls: calls.clone(),
            exp_secs: now_millis() / 1000 + 3600,
        });
        let p1 = provider.get_profile(false).await.unwrap();
        let p2 = provider.get_profile(false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(p1.key_id, p2.key_id);
    }

    #[tokio::test]
    async fn test_force_refresh_triggers_new_exchange() {
        let calls = StdArc::new(AtomicU32::new(0));
        let provider = CachedProfileProvider::new(CountingExchange {
            calls: calls.clone(),
            exp_secs: now_millis() / 1000 + 3600,
        });
        provider.get_profile(false).await.unwrap();
        provider.get_profile(true).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_refreshes() {
        let calls = StdArc::new(AtomicU32::new(0));
        let provider = CachedProfileProvider::new(CountingExchange {
            calls: calls.clone(),
            exp_secs: now_millis() / 1000 - 10,
        });
        provider.get_profile(false).await.unwrap();
        provider.get_profile(false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_background_refresh_updates_cache_without_foreground_call() {
        let calls = StdArc::new(AtomicU32::new(0));
        let provider = CachedProfileProvider::new(CountingExchange {
            calls: calls.clone(),
            exp_secs: now_millis() / 1000 + 5,
        })
        .with_refresh_ahead_ms(4_000);
        provider.get_profile(false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(std::time::Duration::from_millis(1_300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // the refreshed entry is served without triggering a third exchange.
        provider.get_profile(false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_rejects_further_calls() {
        let calls = StdArc::new(AtomicU32::new(0));
        let provider = CachedProfileProvider::new(CountingExchange {
            calls: calls.clone(),
            exp_secs: now_millis() / 1000 + 3600,
        });
        provider.close().await;
        let err = provider.get_profile(false).await.unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::IllegalState);
    }
}
