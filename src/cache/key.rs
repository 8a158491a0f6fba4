//! # Cache Key Derivation
//!
//! A cache key is a SHA-256 digest over the operation name, a canonical
//! serialization of the parameters, and the optional endpoint identifier.
//! Canonicalization sorts object keys recursively so parameter ordering in
//! any nested structure never changes the key.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Derive the cache key for an (operation, parameters, endpoint) triple.
pub fn cache_key(operation: &str, parameters: &Value, endpoint: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(parameters).as_bytes());
    if let Some(endpoint) = endpoint {
        hasher.update([0u8]);
        hasher.update(endpoint.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Derive a key from any serializable parameter payload.
///
/// Returns `None` when the payload cannot be represented as JSON; callers
/// treat that as a forced miss rather than an error.
pub fn try_cache_key<P: Serialize>(
    operation: &str,
    parameters: &P,
    endpoint: Option<&str>,
) -> Option<String> {
    match serde_json::to_value(parameters) {
        Ok(value) => Some(cache_key(operation, &value, endpoint)),
        Err(err) => {
            tracing::warn!(
                operation = %operation,
                error = %err,
                "Unserializable cache parameters, forcing miss"
            );
            None
        }
    }
}

/// Canonical JSON text: object keys sorted recursively, no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        // serde_json string serialization cannot fail
        Value::String(s) => out.push_str(&serde_json::to_string(s).unwrap_or_default()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_order_independent() {
        let a = json!({"a": 1, "b": 2, "nested": {"x": true, "y": [1, 2]}});
        let b = json!({"nested": {"y": [1, 2], "x": true}, "b": 2, "a": 1});
        assert_eq!(cache_key("op", &a, None), cache_key("op", &b, None));
    }

    #[test]
    fn key_distinguishes_operations_and_endpoints() {
        let params = json!({"a": 1});
        let base = cache_key("op_one", &params, None);
        assert_ne!(base, cache_key("op_two", &params, None));
        assert_ne!(base, cache_key("op_one", &params, Some("agent-a")));
        assert_ne!(
            cache_key("op_one", &params, Some("agent-a")),
            cache_key("op_one", &params, Some("agent-b"))
        );
    }

    #[test]
    fn key_distinguishes_array_order() {
        // Arrays are ordered data; only object keys are sorted.
        let a = json!({"items": [1, 2, 3]});
        let b = json!({"items": [3, 2, 1]});
        assert_ne!(cache_key("op", &a, None), cache_key("op", &b, None));
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": {"d": 1, "c": 2}, "a": 3});
        assert_eq!(canonical_json(&value), r#"{"a":3,"b":{"c":2,"d":1}}"#);
    }

    #[test]
    fn serializable_params_round_trip() {
        #[derive(serde::Serialize)]
        struct Params {
            query: String,
            limit: u32,
        }
        let key = try_cache_key(
            "search",
            &Params {
                query: "menus".to_string(),
                limit: 5,
            },
            None,
        );
        assert!(key.is_some());
        assert_eq!(
            key,
            Some(cache_key(
                "search",
                &json!({"query": "menus", "limit": 5}),
                None
            ))
        );
    }
}
