//! The fetch-with-cache chokepoint.
//!
//! Per call the sequence is strict: bypass check, cache check, outbound
//! fetch, store, return - no step starts before the prior completes. Across
//! calls there is no ordering guarantee and no in-flight de-duplication;
//! concurrent misses on one key may each fetch and overwrite, which is
//! acceptable because writes are idempotent full replacements.

use std::sync::Arc;
use std::time::Duration;

use fanout_core::{CachedPayload, FetchError, FetchOutcome, GatewayConfig, Method};
use fanout_cache::backend::CacheBackend;
use fanout_cache::{combined_size, derive_key, TieredStore};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::transport::{OutboundRequest, Transport};

/// Caller-supplied request descriptor.
///
/// Exists only for the duration of one fetch call; it is never persisted.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Query parameters (GET).
    pub params: Option<Value>,
    /// JSON body (POST/PUT/DELETE).
    pub body: Option<Value>,
    /// Invalidate before fetching instead of reading the cache.
    pub no_cache: bool,
    /// Per-call TTL override for the stored response.
    pub ttl: Option<Duration>,
    /// Return the full `{status, headers, body}` envelope as `data`.
    pub raw_envelope: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            params: None,
            body: None,
            no_cache: false,
            ttl: None,
            raw_envelope: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_raw_envelope(mut self, raw: bool) -> Self {
        self.raw_envelope = raw;
        self
    }
}

/// Cache-fronted HTTP fetcher.
///
/// The store and transport are process-wide; every route handler calls
/// through one shared instance. Callers never talk to the store or the key
/// derivation directly.
pub struct Fetcher<P, F, T> {
    store: Arc<TieredStore<P, F>>,
    transport: T,
    config: GatewayConfig,
}

impl<P, F, T> Fetcher<P, F, T>
where
    P: CacheBackend,
    F: CacheBackend,
    T: Transport,
{
    pub fn new(store: Arc<TieredStore<P, F>>, transport: T, config: GatewayConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// The shared store, for invalidation endpoints layered above.
    pub fn store(&self) -> &Arc<TieredStore<P, F>> {
        &self.store
    }

    /// GET with caching.
    pub async fn get(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        self.dispatch(Method::Get, request).await
    }

    /// POST with caching; the cache key incorporates the body so distinct
    /// request bodies never collide.
    pub async fn post(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        self.dispatch(Method::Post, request).await
    }

    /// PUT, always a live call.
    pub async fn put(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        self.dispatch(Method::Put, request).await
    }

    /// DELETE, always a live call.
    pub async fn delete(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        self.dispatch(Method::Delete, request).await
    }

    async fn dispatch(
        &self,
        method: Method,
        request: FetchRequest,
    ) -> Result<FetchOutcome, FetchError> {
        info!(%method, url = %request.url, "outbound request");

        let key_payload = match method {
            Method::Get => non_empty(request.params.as_ref()),
            // DELETE is keyed on the URL alone; its key exists only for
            // explicit invalidation.
            Method::Delete => None,
            _ => non_empty(request.body.as_ref()),
        };
        let key = derive_key(method, &request.url, key_payload, &self.config.key_limits);
        let ttl = request.ttl.unwrap_or(self.config.default_ttl);

        if method.is_cacheable() && !request.no_cache {
            if let Some(hit) = self.store.get(&key).await {
                info!(%method, url = %request.url, key = %key, "cache hit");
                return Ok(FetchOutcome::from_cache(hit));
            }
        } else if request.no_cache {
            // Bypass: invalidate whatever is under the key, skip the read.
            self.store.delete(&key).await;
        }

        let size = combined_size(request.params.as_ref(), request.body.as_ref());
        if size > self.config.max_request_size {
            let err = FetchError::RequestTooLarge {
                size,
                max: self.config.max_request_size,
            };
            error!(%method, url = %request.url, error = %err, "request rejected before send");
            return Err(err);
        }

        let outbound = OutboundRequest {
            method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            params: request.params.clone(),
            body: request.body.clone(),
        };

        let response = match self.transport.execute(&outbound).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    %method,
                    url = %request.url,
                    status = ?e.status(),
                    error = %e,
                    "request failed"
                );
                return Err(e);
            }
        };

        let data = if request.raw_envelope {
            json!({
                "status": response.status,
                "headers": response.headers,
                "body": response.body,
            })
        } else {
            response.body
        };
        let payload = CachedPayload::new(data, response.status, response.headers);

        if self.should_store(method, request.no_cache) {
            self.store.set(&key, &payload, ttl).await;
        }

        info!(status = response.status, "request was successful");
        Ok(FetchOutcome::from_live(payload))
    }

    /// Whether this call's result populates the cache.
    ///
    /// GET with `no_cache` is invalidate-and-refresh: the fresh result is
    /// stored so the next default call hits it. POST with `no_cache` is a
    /// full bypass. PUT and DELETE never populate the cache.
    fn should_store(&self, method: Method, no_cache: bool) -> bool {
        match method {
            Method::Get => true,
            Method::Post => !no_cache,
            Method::Put | Method::Delete => false,
        }
    }
}

fn non_empty(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}
