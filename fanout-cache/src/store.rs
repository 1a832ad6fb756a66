//! Tiered store: one logical cache over two physical backends.
//!
//! The primary (shared) backend is preferred whenever its health flag says
//! so. Any backend error immediately flips the flag and the operation falls
//! through to the fallback; a background probe flips it back once the
//! primary answers a ping. The flags are advisory and last-write-wins - a
//! falsely "unavailable" flag only costs one probe interval before the next
//! success restores it, so no locking is needed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fanout_core::{CacheError, CachedPayload};
use tracing::{debug, error, info, warn};

use crate::backend::CacheBackend;
use crate::pattern::KeyPattern;

/// Advisory availability state for one backend.
///
/// Mutated only by store operations (on success or failure) and by the
/// recovery probe. `Available` / `Unavailable` gates whether the primary is
/// attempted at all, so a dead backend costs one failed call, not a retry
/// storm per request.
#[derive(Debug)]
pub struct BackendHealth {
    available: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl BackendHealth {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn mark_success(&self) {
        self.available.store(true, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn mark_failure(&self) {
        self.available.store(false, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-tier cache store with automatic failover.
///
/// `P` is the preferred durable/shared backend, `F` the local in-process
/// fallback. Callers never talk to the backends directly.
pub struct TieredStore<P, F> {
    primary: P,
    fallback: F,
    primary_health: Arc<BackendHealth>,
    fallback_health: Arc<BackendHealth>,
}

impl<P, F> TieredStore<P, F>
where
    P: CacheBackend,
    F: CacheBackend,
{
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            primary_health: Arc::new(BackendHealth::new()),
            fallback_health: Arc::new(BackendHealth::new()),
        }
    }

    /// Health state of the primary backend.
    pub fn primary_health(&self) -> &BackendHealth {
        &self.primary_health
    }

    /// Health state of the fallback backend.
    pub fn fallback_health(&self) -> &BackendHealth {
        &self.fallback_health
    }

    /// Get the payload stored under a key.
    ///
    /// A healthy primary answers definitively: its miss is final and the
    /// fallback is not consulted, so drift between tiers cannot resurface
    /// stale fallback entries. Backend errors degrade to the fallback and
    /// at worst to a miss; they are never surfaced to the caller.
    pub async fn get(&self, key: &str) -> Option<CachedPayload> {
        if self.primary_health.is_available() {
            match self.primary.get(key).await {
                Ok(result) => {
                    self.primary_health.mark_success();
                    debug!(
                        backend = self.primary.name(),
                        key,
                        hit = result.is_some(),
                        "cache read"
                    );
                    return result;
                }
                Err(e) => {
                    self.primary_health.mark_failure();
                    warn!(
                        backend = self.primary.name(),
                        key,
                        error = %e,
                        "primary read failed, degrading to fallback"
                    );
                }
            }
        }

        match self.fallback.get(key).await {
            Ok(result) => {
                self.fallback_health.mark_success();
                debug!(
                    backend = self.fallback.name(),
                    key,
                    hit = result.is_some(),
                    "cache read"
                );
                result
            }
            Err(e) => {
                self.fallback_health.mark_failure();
                error!(backend = self.fallback.name(), key, error = %e, "fallback read failed");
                None
            }
        }
    }

    /// Store a payload under a key with the given TTL.
    ///
    /// A successful primary write does not also write the fallback - one
    /// source of truth per key, no duplication to drift. Returns whether
    /// any backend accepted the write.
    pub async fn set(&self, key: &str, payload: &CachedPayload, ttl: Duration) -> bool {
        if self.primary_health.is_available() {
            match self.primary.set(key, payload, ttl).await {
                Ok(()) => {
                    self.primary_health.mark_success();
                    debug!(backend = self.primary.name(), key, "cache write");
                    return true;
                }
                Err(e) => {
                    self.primary_health.mark_failure();
                    warn!(
                        backend = self.primary.name(),
                        key,
                        error = %e,
                        "primary write failed, degrading to fallback"
                    );
                }
            }
        }

        match self.fallback.set(key, payload, ttl).await {
            Ok(()) => {
                self.fallback_health.mark_success();
                debug!(backend = self.fallback.name(), key, "cache write");
                true
            }
            Err(e) => {
                self.fallback_health.mark_failure();
                error!(backend = self.fallback.name(), key, error = %e, "fallback write failed");
                false
            }
        }
    }

    /// Delete the entry under a key, preferring the primary.
    pub async fn delete(&self, key: &str) -> bool {
        if self.primary_health.is_available() {
            match self.primary.delete(key).await {
                Ok(deleted) => {
                    self.primary_health.mark_success();
                    debug!(backend = self.primary.name(), key, deleted, "cache delete");
                    return deleted;
                }
                Err(e) => {
                    self.primary_health.mark_failure();
                    warn!(
                        backend = self.primary.name(),
                        key,
                        error = %e,
                        "primary delete failed, degrading to fallback"
                    );
                }
            }
        }

        match self.fallback.delete(key).await {
            Ok(deleted) => {
                self.fallback_health.mark_success();
                deleted
            }
            Err(e) => {
                self.fallback_health.mark_failure();
                error!(backend = self.fallback.name(), key, error = %e, "fallback delete failed");
                false
            }
        }
    }

    /// Delete every key matching a glob in BOTH backends.
    ///
    /// Pattern deletes are invalidation-wide: unlike single-key operations
    /// they are exhaustive across both tiers, so a stale entry cannot
    /// survive in whichever backend is currently non-preferred. Returns the
    /// total number of deleted keys.
    pub async fn delete_by_pattern(&self, glob: &str) -> Result<usize, CacheError> {
        let pattern = KeyPattern::compile(glob)?;
        let mut deleted = 0;

        if self.primary_health.is_available() {
            match self.delete_matching(&self.primary, &pattern).await {
                Ok(count) => {
                    self.primary_health.mark_success();
                    deleted += count;
                }
                Err(e) => {
                    self.primary_health.mark_failure();
                    warn!(
                        backend = self.primary.name(),
                        pattern = glob,
                        error = %e,
                        "primary pattern delete failed"
                    );
                }
            }
        }

        match self.delete_matching(&self.fallback, &pattern).await {
            Ok(count) => deleted += count,
            Err(e) => {
                self.fallback_health.mark_failure();
                error!(
                    backend = self.fallback.name(),
                    pattern = glob,
                    error = %e,
                    "fallback pattern delete failed"
                );
            }
        }

        if deleted > 0 {
            info!(pattern = glob, deleted, "pattern invalidation");
        }
        Ok(deleted)
    }

    /// All keys matching a glob across both backends, de-duplicated.
    pub async fn keys_by_pattern(&self, glob: &str) -> Result<Vec<String>, CacheError> {
        let pattern = KeyPattern::compile(glob)?;
        let mut merged = BTreeSet::new();

        if self.primary_health.is_available() {
            match self.primary.keys(&pattern).await {
                Ok(keys) => {
                    self.primary_health.mark_success();
                    merged.extend(keys);
                }
                Err(e) => {
                    self.primary_health.mark_failure();
                    warn!(
                        backend = self.primary.name(),
                        pattern = glob,
                        error = %e,
                        "primary key scan failed"
                    );
                }
            }
        }

        match self.fallback.keys(&pattern).await {
            Ok(keys) => merged.extend(keys),
            Err(e) => {
                self.fallback_health.mark_failure();
                error!(
                    backend = self.fallback.name(),
                    pattern = glob,
                    error = %e,
                    "fallback key scan failed"
                );
            }
        }

        Ok(merged.into_iter().collect())
    }

    async fn delete_matching<B: CacheBackend>(
        &self,
        backend: &B,
        pattern: &KeyPattern,
    ) -> Result<usize, CacheError> {
        let keys = backend.keys(pattern).await?;
        let mut deleted = 0;
        for key in keys {
            if backend.delete(&key).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl<P, F> TieredStore<P, F>
where
    P: CacheBackend + 'static,
    F: CacheBackend + 'static,
{
    /// Spawn the recovery probe for the primary backend.
    ///
    /// While the primary is marked unavailable, pings it every `interval`
    /// and restores the health flag on the first success - the reconnect
    /// signal that ends degraded operation.
    pub fn spawn_probe(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if store.primary_health.is_available() {
                    continue;
                }
                match store.primary.ping().await {
                    Ok(()) => {
                        store.primary_health.mark_success();
                        info!(
                            backend = store.primary.name(),
                            "primary backend recovered, resuming preferred reads"
                        );
                    }
                    Err(e) => {
                        debug!(backend = store.primary.name(), error = %e, "primary still down");
                    }
                }
            }
        })
    }
}
