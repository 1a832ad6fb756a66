//! Bounded canonical cache key derivation.
//!
//! A cache key is the identity of a request: method, URL, and a normalized
//! form of its parameters or body. Two logically identical requests must
//! always derive the same key regardless of parameter ordering or whether
//! the payload arrived as an object or its JSON string form.
//!
//! Oversized or abnormally nested payloads never produce a key whose length
//! scales with the payload: they degrade to a fixed-length hashed form.
//! These rejections are logged as warnings and never surfaced to callers.

use std::borrow::Cow;

use fanout_core::{KeyLimits, Method};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Hex characters kept from the payload digest in the hashed key form.
const HASH_PREFIX_LEN: usize = 16;

/// Nesting depth beyond which a payload degrades to the hashed form.
///
/// The recursive normalization and counting below must never see a payload
/// deep enough to exhaust the stack; anything real stays far under this.
const MAX_PAYLOAD_DEPTH: usize = 64;

/// Derive the canonical cache key for a request.
///
/// With no payload the key is `METHOD:URL`. Payloads that pass the size and
/// parameter-count checks append a canonical normalized form; payloads that
/// fail (or whose composed key exceeds `max_key_length`) append
/// `HASH:<first-16-hex-of-sha256>` instead.
pub fn derive_key(method: Method, url: &str, payload: Option<&Value>, limits: &KeyLimits) -> String {
    let base = format!("{}:{}", method.as_str(), url);

    // Normalize before the null check so the JSON string "null" and a
    // literal null take the same branch.
    let payload = match payload {
        Some(value) => normalized(value),
        None => return base,
    };
    if payload.is_null() {
        return base;
    }
    let payload = payload.as_ref();

    let depth = payload_depth(payload);
    if depth > MAX_PAYLOAD_DEPTH {
        let key = deep_payload_key(&base, payload);
        warn!(
            depth,
            max = MAX_PAYLOAD_DEPTH,
            key = %key,
            "cache key security: payload too deep, using hash"
        );
        return key;
    }

    let serialized = serialize_payload(payload);

    if serialized.len() > limits.max_data_length {
        let key = hashed_key(&base, &serialized);
        warn!(
            size = serialized.len(),
            max = limits.max_data_length,
            key = %key,
            "cache key security: payload too large, using hash"
        );
        return key;
    }

    let params = count_params(payload);
    if params > limits.max_params_count {
        let key = hashed_key(&base, &serialized);
        warn!(
            params,
            max = limits.max_params_count,
            key = %key,
            "cache key security: too many parameters, using hash"
        );
        return key;
    }

    let full = format!("{}:{}", base, canonicalize(payload));
    if full.len() > limits.max_key_length {
        let key = hashed_key(&base, &serialized);
        warn!(
            length = full.len(),
            max = limits.max_key_length,
            key = %key,
            "cache key security: composed key too long, using hash"
        );
        return key;
    }

    full
}

/// Serialized byte size of an optional params/body pair.
///
/// Used by the fetch layer's pre-flight request size check; independent of
/// the key hashing above.
pub fn combined_size(params: Option<&Value>, body: Option<&Value>) -> usize {
    estimate_size(params) + estimate_size(body)
}

fn estimate_size(value: Option<&Value>) -> usize {
    match value {
        Some(value) => serialize_payload(value).len(),
        None => 0,
    }
}

/// The string form a payload is measured and hashed over.
///
/// Strings are taken verbatim; everything else is compact JSON.
fn serialize_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn hashed_key(base: &str, serialized: &str) -> String {
    let digest = Sha256::digest(serialized.as_bytes());
    let hash = hex::encode(digest);
    format!("{}:HASH:{}", base, &hash[..HASH_PREFIX_LEN])
}

/// Resolve a payload's JSON-string form to its parsed value.
///
/// Applied once at the top level so every equivalence and limit check sees
/// the same shape regardless of how the payload arrived. Parsing a string
/// strictly shrinks it, so the chain terminates.
fn normalized(value: &Value) -> Cow<'_, Value> {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => Cow::Owned(normalized(&parsed).into_owned()),
            Err(_) => Cow::Borrowed(value),
        },
        _ => Cow::Borrowed(value),
    }
}

/// Deepest nesting level of a payload, computed without recursion.
fn payload_depth(value: &Value) -> usize {
    let mut max = 1;
    let mut stack = vec![(value, 1)];
    while let Some((value, depth)) = stack.pop() {
        max = max.max(depth);
        match value {
            Value::Array(items) => stack.extend(items.iter().map(|v| (v, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|v| (v, depth + 1))),
            _ => {}
        }
    }
    max
}

/// Hashed key for a payload too deep to serialize.
///
/// Feeds the digest from an explicit-stack traversal; serde serialization
/// recurses per nesting level and cannot be used here. Object iteration is
/// key-sorted, so insertion order does not affect the digest.
fn deep_payload_key(base: &str, value: &Value) -> String {
    let mut hasher = Sha256::new();
    let mut stack: Vec<(Option<&str>, &Value)> = vec![(None, value)];
    while let Some((key, value)) = stack.pop() {
        if let Some(key) = key {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
        }
        match value {
            Value::Null => hasher.update(b"null,"),
            Value::Bool(b) => {
                hasher.update(if *b { &b"true,"[..] } else { &b"false,"[..] });
            }
            Value::Number(n) => {
                hasher.update(n.to_string().as_bytes());
                hasher.update(b",");
            }
            Value::String(s) => {
                hasher.update(s.as_bytes());
                hasher.update(b",");
            }
            Value::Array(items) => {
                hasher.update(b"[");
                stack.extend(items.iter().rev().map(|v| (None, v)));
            }
            Value::Object(map) => {
                hasher.update(b"{");
                stack.extend(map.iter().rev().map(|(k, v)| (Some(k.as_str()), v)));
            }
        }
    }
    let hash = hex::encode(hasher.finalize());
    format!("{}:HASH:{}", base, &hash[..HASH_PREFIX_LEN])
}

/// Recursive parameter count: object fields and array elements at every
/// nesting level.
fn count_params(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.len() + map.values().map(count_params).sum::<usize>(),
        Value::Array(items) => items.len() + items.iter().map(count_params).sum::<usize>(),
        _ => 0,
    }
}

/// Canonical deterministic stringification.
///
/// Object keys are sorted lexicographically at every nesting level and the
/// output is deliberately not JSON (`{k=v&k2=v2}` / `[a,b]`), so whitespace
/// and key-order variations of the same payload cannot produce distinct
/// keys. String payloads that parse as JSON normalize as their parsed value,
/// making an object and its JSON string form equivalent.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // A string that parses as JSON normalizes as the parsed value; the
        // recursion terminates because parsing a string strictly shrinks it.
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => canonicalize(&parsed),
            Err(_) => s.clone(),
        },
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}={}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join("&"))
        }
    }
}
