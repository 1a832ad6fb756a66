//! Bounded in-process fallback backend.
//!
//! Entry count is capped (the shared backend is bounded only by TTL) and
//! each entry carries its own expiry, applied through moka's `Expiry`
//! policy.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use fanout_core::{CacheError, CachedPayload};
use moka::future::Cache;
use moka::Expiry;

use super::CacheBackend;
use crate::pattern::KeyPattern;

#[derive(Clone)]
struct Stored {
    payload: CachedPayload,
    ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<String, Stored> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backend over a bounded [`moka::future::Cache`].
pub struct MemoryBackend {
    cache: Cache<String, Stored>,
}

impl MemoryBackend {
    /// Create a backend bounded to `max_entries`.
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryExpiry)
                .build(),
        }
    }

    /// Number of live entries (after pending maintenance).
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedPayload>, CacheError> {
        Ok(self.cache.get(key).await.map(|stored| stored.payload))
    }

    async fn set(
        &self,
        key: &str,
        payload: &CachedPayload,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let stored = Stored {
            payload: payload.clone(),
            ttl,
        };
        self.cache.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, CacheError> {
        self.cache.run_pending_tasks().await;
        Ok(self
            .cache
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.as_ref().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(data: serde_json::Value) -> CachedPayload {
        CachedPayload::new(data, 200, Vec::new())
    }

    #[tokio::test]
    async fn test_set_then_get_returns_equal_payload() {
        let backend = MemoryBackend::new(100);
        let stored = payload(json!({"a": 1}));
        backend
            .set("k", &stored, Duration::from_secs(60))
            .await
            .expect("set");

        let got = backend.get("k").await.expect("get").expect("hit");
        assert_eq!(got, stored);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let backend = MemoryBackend::new(100);
        assert!(backend.get("absent").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let backend = MemoryBackend::new(100);
        backend
            .set("k", &payload(json!(1)), Duration::from_millis(50))
            .await
            .expect("set");

        assert!(backend.get("k").await.expect("get").is_some());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(backend.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_entry() {
        let backend = MemoryBackend::new(100);
        backend
            .set("k", &payload(json!(1)), Duration::from_secs(60))
            .await
            .expect("set");
        backend
            .set("k", &payload(json!(2)), Duration::from_secs(60))
            .await
            .expect("set");

        let got = backend.get("k").await.expect("get").expect("hit");
        assert_eq!(got.data, json!(2));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let backend = MemoryBackend::new(100);
        backend
            .set("k", &payload(json!(1)), Duration::from_secs(60))
            .await
            .expect("set");

        assert!(backend.delete("k").await.expect("delete"));
        assert!(!backend.delete("k").await.expect("delete"));
        assert!(backend.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_keys_by_pattern() {
        let backend = MemoryBackend::new(100);
        for key in ["GET:https://x/a", "GET:https://x/b", "POST:https://y/c"] {
            backend
                .set(key, &payload(json!(1)), Duration::from_secs(60))
                .await
                .expect("set");
        }

        let pattern = KeyPattern::compile("GET:https://x/*").expect("compile");
        let mut keys = backend.keys(&pattern).await.expect("keys");
        keys.sort();
        assert_eq!(keys, vec!["GET:https://x/a", "GET:https://x/b"]);
    }

    #[tokio::test]
    async fn test_capacity_bound_evicts() {
        let backend = MemoryBackend::new(4);
        for i in 0..32 {
            backend
                .set(&format!("k{}", i), &payload(json!(i)), Duration::from_secs(60))
                .await
                .expect("set");
        }
        assert!(backend.entry_count().await <= 4);
    }
}
