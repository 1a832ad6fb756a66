//! Cache backend trait.
//!
//! A backend is a plain key-value store with TTL and pattern scans. The
//! failover preference between backends lives in [`crate::store`], not here;
//! implementations only report their own failures.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use fanout_core::{CacheError, CachedPayload};

use crate::pattern::KeyPattern;

/// Trait for physical cache backends.
///
/// Implementations must be safe for concurrent use; every operation is a
/// single attempt with no internal retry loop. Callers that need retries
/// wrap whole fetch-and-cache operations, not individual backend calls.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Get the payload stored under a key, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<CachedPayload>, CacheError>;

    /// Store a payload under a key with the given expiry.
    ///
    /// Overwrites are full replacements of any existing entry.
    async fn set(&self, key: &str, payload: &CachedPayload, ttl: Duration)
        -> Result<(), CacheError>;

    /// Delete the entry under a key. Returns whether an entry existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// All keys matching a pattern.
    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, CacheError>;

    /// Liveness probe, used by the store to detect recovery.
    ///
    /// Backends without a meaningful probe report healthy.
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
