//! Response envelope and cached payload shapes.
//!
//! Every fetch returns a [`FetchOutcome`]; what the cache stores under a key
//! is a [`CachedPayload`]. A payload is immutable once stored - updates are
//! full replacements under the same key, never in-place mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The value stored under a cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    /// The upstream response body (or raw envelope, per caller request).
    pub data: Value,
    /// Wall-clock time of the producing outbound call.
    pub update_time: DateTime<Utc>,
    /// The upstream HTTP status at the time of caching.
    #[serde(default = "default_status")]
    pub status: u16,
    /// Upstream response headers at the time of caching.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

fn default_status() -> u16 {
    200
}

impl CachedPayload {
    /// Create a payload stamped with the current time.
    pub fn new(data: Value, status: u16, headers: Vec<(String, String)>) -> Self {
        Self {
            data,
            update_time: Utc::now(),
            status,
            headers,
        }
    }
}

/// Uniform result envelope for every fetch call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    /// Whether the data came from the cache store or a live outbound call.
    pub from_cache: bool,
    /// When the data was produced (cache timestamp or now).
    pub update_time: DateTime<Utc>,
    /// The response data.
    pub data: Value,
    /// Upstream HTTP status.
    pub status: u16,
    /// Upstream response headers.
    pub headers: Vec<(String, String)>,
}

impl FetchOutcome {
    /// Build an outcome from a cache hit.
    pub fn from_cache(payload: CachedPayload) -> Self {
        Self {
            from_cache: true,
            update_time: payload.update_time,
            data: payload.data,
            status: payload.status,
            headers: payload.headers,
        }
    }

    /// Build an outcome from a live call's payload.
    pub fn from_live(payload: CachedPayload) -> Self {
        Self {
            from_cache: false,
            update_time: payload.update_time,
            data: payload.data,
            status: payload.status,
            headers: payload.headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cached_payload_roundtrips_through_json() {
        let payload = CachedPayload::new(
            json!({"list": [1, 2, 3]}),
            200,
            vec![("content-type".to_string(), "application/json".to_string())],
        );
        let serialized = serde_json::to_string(&payload).expect("serialize");
        let deserialized: CachedPayload = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(payload, deserialized);
    }

    #[test]
    fn test_cached_payload_missing_fields_default() {
        // Entries written by older deployments carry neither status nor
        // headers.
        let raw = r#"{"data": 1, "update_time": "2024-05-01T00:00:00Z"}"#;
        let payload: CachedPayload = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(payload.status, 200);
        assert!(payload.headers.is_empty());
    }

    #[test]
    fn test_outcome_preserves_cache_timestamp() {
        let payload = CachedPayload::new(json!("v"), 200, Vec::new());
        let stored_at = payload.update_time;

        let hit = FetchOutcome::from_cache(payload.clone());
        assert!(hit.from_cache);
        assert_eq!(hit.update_time, stored_at);

        let live = FetchOutcome::from_live(payload);
        assert!(!live.from_cache);
        assert_eq!(live.update_time, stored_at);
    }
}
