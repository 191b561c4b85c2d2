//! JSON argument parsing helpers for tool handlers.
//!
//! ```rust
//! use ttooling::{parse_json_object, required_string};
//!
//! let args = parse_json_object(r#"{"ticker":"AAPL"}"#).expect("object should parse");
//! let ticker = required_string(&args, "ticker").expect("ticker should be present");
//! assert_eq!(ticker, "AAPL");
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub fn parse_json_value(args_json: &str) -> Result<Value, ToolError> {
    serde_json::from_str(args_json)
        .map_err(|err| ToolError::invalid_arguments(format!("invalid JSON arguments: {err}")))
}

pub fn parse_json_object(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    if args_json.trim().is_empty() {
        return Ok(Map::new());
    }

    let value = parse_json_value(args_json)?;
    value
        .as_object()
        .cloned()
        .ok_or_else(|| ToolError::invalid_arguments("expected JSON object arguments"))
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required string: '{key}'")))
}

pub fn optional_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(ToString::to_string)
}
