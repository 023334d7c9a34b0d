//! Response envelopes
//!
//! Every API response is JSON carrying at least `success` and, on failure, a
//! human-readable `message`. Collection endpoints are inconsistent about
//! where the list lives:
//!
//! - `{"success": true, "data": [...]}`
//! - `{"success": true, "<domain>": [...]}` (e.g. `auctions`, `orders`)
//! - a bare `[...]`
//!
//! [`extract_collection`] accepts exactly these shapes and nothing else.

use serde_json::Value;

/// Generic wrapper key accepted for every collection.
pub const DATA_KEY: &str = "data";

/// Value of the `success` flag, if the body has one.
pub fn success_flag(body: &Value) -> Option<bool> {
    body.get("success").and_then(Value::as_bool)
}

/// Server-provided `message`, if present and non-empty.
pub fn message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// Pull the collection out of a response body.
///
/// `domain_keys` are the resource-specific wrapper names accepted in
/// addition to [`DATA_KEY`]. Returns `None` when no accepted shape matches,
/// including bodies that report `success: false`.
pub fn extract_collection(body: &Value, domain_keys: &[&str]) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) => {
            if success_flag(body) == Some(false) {
                return None;
            }
            std::iter::once(DATA_KEY)
                .chain(domain_keys.iter().copied())
                .find_map(|key| map.get(key).and_then(Value::as_array))
                .cloned()
        }
        _ => None,
    }
}

/// Short description of a body's shape, for mismatch diagnostics.
pub fn describe_shape(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
    }
}
