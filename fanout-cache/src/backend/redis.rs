//! Shared Redis primary backend.
//!
//! Values are stored as JSON strings with a per-key `EX` expiry; pattern
//! operations use `SCAN MATCH` rather than `KEYS` so a large keyspace never
//! blocks the server. The connection manager reconnects on its own; the
//! tiered store's probe calls [`CacheBackend::ping`] to notice recovery.

use std::time::Duration;

use async_trait::async_trait;
use fanout_core::{CacheError, CachedPayload, RedisConfig};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::CacheBackend;
use crate::pattern::KeyPattern;

/// Cache backend over a shared Redis instance.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis with the given parameters.
    ///
    /// Fails fast if the initial connection cannot be established; the
    /// embedding server decides whether to run degraded without a primary.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url())
            .map_err(|e| CacheError::backend("redis", e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::backend("redis", e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedPayload>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::backend("redis", e.to_string()))?;

        match raw {
            Some(raw) => {
                let payload = serde_json::from_str(&raw).map_err(|source| {
                    CacheError::Serialization {
                        backend: "redis",
                        source,
                    }
                })?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        payload: &CachedPayload,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(payload).map_err(|source| CacheError::Serialization {
            backend: "redis",
            source,
        })?;

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, raw, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::backend("redis", e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| CacheError::backend("redis", e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let mut matched = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> = conn
                .scan_match(pattern.raw())
                .await
                .map_err(|e| CacheError::backend("redis", e.to_string()))?;

            while let Some(key) = iter.next_item().await {
                // Redis glob semantics differ slightly from ours; re-filter.
                if pattern.matches(&key) {
                    matched.push(key);
                }
            }
        }
        Ok(matched)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("redis", e.to_string()))?;
        Ok(())
    }
}
