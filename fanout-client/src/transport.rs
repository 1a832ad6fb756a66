//! Outbound HTTP transport.
//!
//! The [`Transport`] trait is the seam between the fetch logic and the
//! network: production uses [`HttpTransport`] over reqwest, tests substitute
//! a mock that counts calls. The transport resolves to an error for non-2xx
//! statuses, so the fetch layer only ever caches successful responses.

use std::time::Duration;

use async_trait::async_trait;
use fanout_core::{FetchError, Method};
use serde_json::Value;

/// One outbound call, fully described.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Query parameters (GET); top-level object whose values are rendered
    /// as strings.
    pub params: Option<Value>,
    /// JSON request body (POST/PUT/DELETE).
    pub body: Option<Value>,
}

/// A successful (2xx) upstream response.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Parsed JSON body, or the raw text as a JSON string when the body is
    /// not JSON.
    pub body: Value,
}

/// Abstraction over the HTTP client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &OutboundRequest) -> Result<OutboundResponse, FetchError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn execute(&self, request: &OutboundRequest) -> Result<OutboundResponse, FetchError> {
        (**self).execute(request).await
    }
}

/// Production transport over a shared reqwest client.
///
/// Every call carries the process-wide default timeout; a timeout fails
/// exactly like any other transport error. No cancellation token is
/// propagated - a caller that stops waiting does not abort the request.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &OutboundRequest) -> Result<OutboundResponse, FetchError> {
        let method = request.method.as_str();
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        }
        .timeout(self.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(params) = &request.params {
            builder = builder.query(&flatten_params(params));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| FetchError::Transport {
            method,
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let text = response.text().await.map_err(|e| FetchError::Transport {
            method,
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(FetchError::Upstream {
                method,
                url: request.url.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(OutboundResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Render a top-level params object as query pairs.
///
/// Scalar values are stringified the way they appear in a URL; nested
/// values fall back to compact JSON.
fn flatten_params(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), scalar_string(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_params_stringifies_scalars() {
        let params = json!({"city": "110101", "extensions": "all", "page": 2, "all": true});
        let mut pairs = flatten_params(&params);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("all".to_string(), "true".to_string()),
                ("city".to_string(), "110101".to_string()),
                ("extensions".to_string(), "all".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_flatten_params_non_object_is_empty() {
        assert!(flatten_params(&json!([1, 2])).is_empty());
        assert!(flatten_params(&json!("s")).is_empty());
    }

    #[test]
    fn test_nested_param_values_fall_back_to_json() {
        let params = json!({"filter": {"a": 1}});
        let pairs = flatten_params(&params);
        assert_eq!(pairs, vec![("filter".to_string(), "{\"a\":1}".to_string())]);
    }
}
