//! Configuration for the gateway core.
//!
//! The embedding server constructs a [`GatewayConfig`] once at startup and
//! hands it to the cache store and fetcher. Environment parsing is the
//! embedder's concern; this is just the typed shape with sane defaults.

use std::time::Duration;

/// Connection parameters for the shared Redis backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

impl RedisConfig {
    /// Render as a `redis://` connection URL.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Bounds applied during cache key derivation.
///
/// Payloads exceeding these bounds never produce a key whose length scales
/// with the payload; they degrade to a fixed-length hashed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLimits {
    /// Maximum length of a fully composed literal key.
    pub max_key_length: usize,
    /// Maximum serialized payload length eligible for literal keys.
    pub max_data_length: usize,
    /// Maximum recursive parameter count eligible for literal keys.
    pub max_params_count: usize,
}

impl Default for KeyLimits {
    fn default() -> Self {
        Self {
            max_key_length: 500,
            max_data_length: 10_000,
            max_params_count: 50,
        }
    }
}

impl KeyLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_key_length(mut self, max: usize) -> Self {
        self.max_key_length = max;
        self
    }

    pub fn with_max_data_length(mut self, max: usize) -> Self {
        self.max_data_length = max;
        self
    }

    pub fn with_max_params_count(mut self, max: usize) -> Self {
        self.max_params_count = max;
        self
    }
}

/// Configuration for the cache store and fetcher.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TTL applied to cached responses when the caller does not override it.
    pub default_ttl: Duration,
    /// Timeout applied to every outbound HTTP call.
    pub request_timeout: Duration,
    /// Connection parameters for the primary (shared) backend.
    pub redis: RedisConfig,
    /// Bounds for cache key derivation.
    pub key_limits: KeyLimits,
    /// Hard cap on combined params+body size of an outbound request.
    pub max_request_size: usize,
    /// Entry bound for the in-process fallback backend.
    pub memory_max_entries: u64,
    /// How often the store probes an unavailable primary for recovery.
    pub probe_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(10),
            redis: RedisConfig::default(),
            key_limits: KeyLimits::default(),
            max_request_size: 50_000,
            memory_max_entries: 100,
            probe_interval: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL for cached responses.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the outbound request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the Redis connection parameters.
    pub fn with_redis(mut self, redis: RedisConfig) -> Self {
        self.redis = redis;
        self
    }

    /// Set the key derivation bounds.
    pub fn with_key_limits(mut self, limits: KeyLimits) -> Self {
        self.key_limits = limits;
        self
    }

    /// Set the combined request size cap.
    pub fn with_max_request_size(mut self, max: usize) -> Self {
        self.max_request_size = max;
        self
    }

    /// Set the fallback backend's entry bound.
    pub fn with_memory_max_entries(mut self, max: u64) -> Self {
        self.memory_max_entries = max;
        self
    }

    /// Set the primary recovery probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_request_size, 50_000);
        assert_eq!(config.memory_max_entries, 100);
        assert_eq!(config.key_limits.max_key_length, 500);
        assert_eq!(config.key_limits.max_data_length, 10_000);
        assert_eq!(config.key_limits.max_params_count, 50);
        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 6379);
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new()
            .with_default_ttl(Duration::from_secs(120))
            .with_request_timeout(Duration::from_secs(5))
            .with_max_request_size(10_000)
            .with_memory_max_entries(500)
            .with_key_limits(KeyLimits::new().with_max_key_length(200));

        assert_eq!(config.default_ttl, Duration::from_secs(120));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_request_size, 10_000);
        assert_eq!(config.memory_max_entries, 500);
        assert_eq!(config.key_limits.max_key_length, 200);
    }

    #[test]
    fn test_redis_url_without_password() {
        let redis = RedisConfig::default();
        assert_eq!(redis.url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_redis_url_with_password() {
        let redis = RedisConfig {
            password: Some("hunter2".to_string()),
            db: 3,
            ..RedisConfig::default()
        };
        assert_eq!(redis.url(), "redis://:hunter2@127.0.0.1:6379/3");
    }
}
