//! End-to-end fetch scenarios over a real tiered store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fanout_cache::backend::CacheBackend;
use fanout_cache::{KeyPattern, MemoryBackend, TieredStore};
use fanout_client::transport::{OutboundRequest, OutboundResponse, Transport};
use fanout_client::{FetchRequest, Fetcher};
use fanout_core::{CacheError, CachedPayload, FetchError, GatewayConfig};
use serde_json::{json, Value};

/// Upstream stand-in whose body changes on every call, so a served cache
/// entry is distinguishable from a fresh fetch.
struct SequencedUpstream {
    calls: AtomicU32,
}

impl SequencedUpstream {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for SequencedUpstream {
    async fn execute(&self, _request: &OutboundRequest) -> Result<OutboundResponse, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(OutboundResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: json!({"version": call}),
        })
    }
}

/// A primary that always fails, forcing every operation onto the fallback.
struct DownBackend;

#[async_trait]
impl CacheBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<CachedPayload>, CacheError> {
        Err(CacheError::backend("down", "connection refused"))
    }

    async fn set(
        &self,
        _key: &str,
        _payload: &CachedPayload,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::backend("down", "connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::backend("down", "connection refused"))
    }

    async fn keys(&self, _pattern: &KeyPattern) -> Result<Vec<String>, CacheError> {
        Err(CacheError::backend("down", "connection refused"))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::backend("down", "connection refused"))
    }
}

fn healthy_fetcher() -> (
    Fetcher<MemoryBackend, MemoryBackend, Arc<SequencedUpstream>>,
    Arc<SequencedUpstream>,
) {
    let store = Arc::new(TieredStore::new(
        MemoryBackend::new(100),
        MemoryBackend::new(100),
    ));
    let upstream = Arc::new(SequencedUpstream::new());
    let fetcher = Fetcher::new(store, upstream.clone(), GatewayConfig::default());
    (fetcher, upstream)
}

#[tokio::test]
async fn test_get_lifecycle_miss_hit_refresh() {
    let (fetcher, upstream) = healthy_fetcher();
    let request = || FetchRequest::new("https://api.example.com/status").with_params(json!({"q": 1}));

    // First call misses and fetches version 1.
    let first = fetcher.get(request()).await.expect("get");
    assert!(!first.from_cache);
    assert_eq!(first.data, json!({"version": 1}));
    assert_eq!(first.status, 200);

    // Second call is served from cache; upstream moved on but we see v1.
    let second = fetcher.get(request()).await.expect("get");
    assert!(second.from_cache);
    assert_eq!(second.data, json!({"version": 1}));

    // no_cache refreshes: a live fetch whose result replaces the entry.
    let refreshed = fetcher
        .get(request().with_no_cache(true))
        .await
        .expect("get");
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.data, json!({"version": 2}));

    let after = fetcher.get(request()).await.expect("get");
    assert!(after.from_cache);
    assert_eq!(after.data, json!({"version": 2}));

    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_post_string_body_equivalent_to_parsed_body() {
    let (fetcher, upstream) = healthy_fetcher();
    let url = "https://api.example.com/search";

    fetcher
        .post(FetchRequest::new(url).with_body(json!({"b": 2, "a": 1})))
        .await
        .expect("post");

    // The same body arriving as a JSON string hits the same entry.
    let as_string = fetcher
        .post(FetchRequest::new(url).with_body(Value::String("{\"a\":1,\"b\":2}".to_string())))
        .await
        .expect("post");
    assert!(as_string.from_cache);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_degraded_primary_is_invisible_to_callers() {
    let store = Arc::new(TieredStore::new(DownBackend, MemoryBackend::new(100)));
    let upstream = Arc::new(SequencedUpstream::new());
    let fetcher = Fetcher::new(store, upstream.clone(), GatewayConfig::default());
    let request = || FetchRequest::new("https://api.example.com/weather");

    // The miss fetches and the write lands on the fallback tier.
    let first = fetcher.get(request()).await.expect("get");
    assert!(!first.from_cache);

    // Subsequent reads are served from the fallback.
    let second = fetcher.get(request()).await.expect("get");
    assert!(second.from_cache);
    assert_eq!(second.data, json!({"version": 1}));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_pattern_invalidation_forces_refetch() {
    let (fetcher, upstream) = healthy_fetcher();
    fetcher
        .get(FetchRequest::new("https://api.example.com/users/1"))
        .await
        .expect("get");
    fetcher
        .get(FetchRequest::new("https://api.example.com/users/2"))
        .await
        .expect("get");
    fetcher
        .get(FetchRequest::new("https://api.example.com/orders/1"))
        .await
        .expect("get");
    assert_eq!(upstream.calls(), 3);

    let removed = fetcher
        .store()
        .delete_by_pattern("GET:https://api.example.com/users/*")
        .await
        .expect("pattern delete");
    assert_eq!(removed, 2);

    // Users refetch; orders still hit.
    let user = fetcher
        .get(FetchRequest::new("https://api.example.com/users/1"))
        .await
        .expect("get");
    assert!(!user.from_cache);
    let order = fetcher
        .get(FetchRequest::new("https://api.example.com/orders/1"))
        .await
        .expect("get");
    assert!(order.from_cache);
    assert_eq!(upstream.calls(), 4);
}
