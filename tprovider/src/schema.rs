//! JSON Schema sanitization shared by adapters.

use serde_json::{Map, Value};

/// Recursively removes `default` keys from a JSON Schema.
///
/// Some vendors (Gemini among them) reject declarations carrying `default`;
/// everything else, at every nesting depth, is preserved exactly, including
/// schemas inside `properties`, `items`, and arrays of sub-schemas.
pub fn strip_default_keys(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let cleaned = map
                .iter()
                .filter(|(key, _)| key.as_str() != "default")
                .map(|(key, value)| (key.clone(), strip_default_keys(value)))
                .collect::<Map<_, _>>();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_default_keys).collect()),
        other => other.clone(),
    }
}

/// Parses tool output as JSON, wrapping non-JSON text as `{"result": ...}`.
///
/// Bedrock and Gemini both require structured tool results; plain strings
/// from an executor are wrapped rather than rejected.
pub fn json_or_wrapped(content: &str) -> Value {
    match serde_json::from_str(content) {
        Ok(value) => value,
        Err(_) => {
            let mut wrapped = Map::new();
            wrapped.insert("result".to_string(), Value::String(content.to_string()));
            Value::Object(wrapped)
        }
    }
}
