//! Error types for Fanout operations

use thiserror::Error;

/// Cache backend errors.
///
/// These are recovered inside the tiered store (flip the health flag, fall
/// back to the secondary backend) and at worst degrade a read to a miss;
/// the fetch layer never surfaces them to its caller as a failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Backend {backend} command failed: {reason}")]
    Backend { backend: &'static str, reason: String },

    #[error("Backend {backend} serialization failed: {source}")]
    Serialization {
        backend: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl CacheError {
    /// Shorthand for a backend command failure.
    pub fn backend(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            reason: reason.into(),
        }
    }
}

/// Outbound fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request data too large: {size} bytes (max: {max})")]
    RequestTooLarge { size: usize, max: usize },

    #[error("{method} {url} failed with status {status}: {body}")]
    Upstream {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url} transport error: {reason}")]
    Transport {
        method: &'static str,
        url: String,
        reason: String,
    },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

impl FetchError {
    /// The upstream HTTP status, if the request got far enough to have one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is an authorization failure (HTTP 401-class).
    ///
    /// Authorization failures short-circuit retry loops: retrying a bad
    /// credential wastes attempts and risks upstream lockout.
    pub fn is_authorization(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Errors from the retry executor.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("{label} failed with an authorization error, not retrying")]
    Unauthorized {
        label: String,
        #[source]
        source: E,
    },

    #[error("{label} failed after {attempts} attempts")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// The last underlying error.
    pub fn into_source(self) -> E {
        match self {
            Self::Unauthorized { source, .. } | Self::Exhausted { source, .. } => source,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Fanout errors.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Fanout operations.
pub type FanoutResult<T> = Result<T, FanoutError>;
