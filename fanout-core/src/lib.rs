//! Fanout core - shared types
//!
//! Data types, configuration and the error taxonomy shared by the cache and
//! client crates. This crate performs no I/O.

pub mod config;
pub mod envelope;
pub mod error;

pub use config::{GatewayConfig, KeyLimits, RedisConfig};
pub use envelope::{CachedPayload, FetchOutcome};
pub use error::{CacheError, ConfigError, FanoutError, FanoutResult, FetchError, RetryError};

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// HTTP method of an outbound request.
///
/// Only the verbs the gateway dispatches are represented; the uppercase
/// form is what goes into derived cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// The canonical uppercase name used in cache keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether this verb participates in the cache at all.
    ///
    /// PUT and DELETE are side-effecting administrative operations where
    /// staleness is unacceptable; every call is a live network operation.
    pub fn is_cacheable(self) -> bool {
        matches!(self, Self::Get | Self::Post)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
