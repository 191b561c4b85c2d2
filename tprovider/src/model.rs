//! Vendor-neutral message, tool, and completion types.
//!
//! The serialized form of [`Message`] and [`ToolSchema`] is the OpenAI
//! function-calling shape. That shape is the contract between the
//! orchestrator, the adapters, and any store that persists conversation
//! history, so the serde representations here must not drift.
//!
//! ```rust
//! use tprovider::{CompletionRequest, Message, ProviderErrorKind};
//!
//! let ok = CompletionRequest::new("gpt-4o-mini", vec![Message::user("What is AAPL at?")]);
//! assert!(ok.validate().is_ok());
//!
//! let err = CompletionRequest::new("", vec![Message::user("hi")])
//!     .validate()
//!     .expect_err("empty model should fail");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ProviderError, ProviderErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One conversation turn in canonical form.
///
/// `content` is always present on the wire (null for assistant turns that
/// only carry tool calls); `tool_calls` and `tool_call_id` are omitted when
/// empty or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn carrying tool-call requests, with optional lead text.
    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool-result turn pairing a call id with the executor's output.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A tool invocation requested by the model.
///
/// `arguments` is a JSON-encoded string, as vendors emit it. Ids are
/// vendor-issued, or synthesized by an adapter when the vendor omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ToolCallWire", into = "ToolCallWire")]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decodes the argument string into a JSON value.
    ///
    /// Accepts an encoded object, a double-encoded object (a JSON string
    /// whose contents are themselves JSON), or an empty string (treated as
    /// `{}`).
    pub fn arguments_value(&self) -> Result<Value, ProviderError> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let parsed: Value = serde_json::from_str(&self.arguments).map_err(|err| {
            ProviderError::invalid_request(format!(
                "tool call '{}' carries arguments that are not valid JSON: {err}",
                self.name
            ))
        })?;

        if let Value::String(inner) = &parsed {
            if let Ok(unwrapped) = serde_json::from_str::<Value>(inner) {
                return Ok(unwrapped);
            }
        }

        Ok(parsed)
    }
}

#[derive(Serialize, Deserialize)]
struct ToolCallWire {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: FunctionCallWire,
}

#[derive(Serialize, Deserialize)]
struct FunctionCallWire {
    name: String,
    arguments: String,
}

impl From<ToolCallWire> for ToolCallRequest {
    fn from(value: ToolCallWire) -> Self {
        Self {
            id: value.id,
            name: value.function.name,
            arguments: value.function.arguments,
        }
    }
}

impl From<ToolCallRequest> for ToolCallWire {
    fn from(value: ToolCallRequest) -> Self {
        Self {
            id: value.id,
            kind: "function".to_string(),
            function: FunctionCallWire {
                name: value.name,
                arguments: value.arguments,
            },
        }
    }
}

/// Canonical tool declaration: name, description, and a JSON Schema for the
/// parameters. Serialized in the OpenAI function-declaration shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ToolSchemaWire", into = "ToolSchemaWire")]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ToolSchemaWire {
    #[serde(rename = "type")]
    kind: String,
    function: FunctionSchemaWire,
}

#[derive(Serialize, Deserialize)]
struct FunctionSchemaWire {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object")]
    parameters: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl From<ToolSchemaWire> for ToolSchema {
    fn from(value: ToolSchemaWire) -> Self {
        Self {
            name: value.function.name,
            description: value.function.description,
            parameters: value.function.parameters,
        }
    }
}

impl From<ToolSchema> for ToolSchemaWire {
    fn from(value: ToolSchema) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSchemaWire {
                name: value.name,
                description: value.description,
                parameters: value.parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
}

impl FinishReason {
    /// Enforces the completion invariant: `ToolCalls` exactly when the
    /// decoded call list is non-empty, whatever the vendor reported.
    pub fn reconcile(self, has_tool_calls: bool) -> Self {
        match (self, has_tool_calls) {
            (_, true) => Self::ToolCalls,
            (Self::ToolCalls, false) => Self::Stop,
            (other, false) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Normalized result of one vendor completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
    /// The vendor response body, untouched.
    pub raw: Value,
}

impl CompletionResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Request passed to every adapter's `complete`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::invalid_request("model must not be empty"));
        }

        if self.messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "at least one message is required",
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ProviderError::new(
                    ProviderErrorKind::InvalidRequest,
                    "temperature must be in the inclusive range 0.0..=2.0",
                    false,
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_serializes_to_canonical_wire_shape() {
        let assistant = Message::assistant_with_calls(
            None,
            vec![ToolCallRequest::new("call_1", "quote", "{\"ticker\":\"AAPL\"}")],
        );

        let value = serde_json::to_value(&assistant).expect("message should serialize");
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "quote", "arguments": "{\"ticker\":\"AAPL\"}"}
                }]
            })
        );

        let round_tripped: Message =
            serde_json::from_value(value).expect("message should deserialize");
        assert_eq!(round_tripped, assistant);
    }

    #[test]
    fn tool_message_carries_call_id_on_the_wire() {
        let tool = Message::tool("call_1", "{\"price\": 150.0}");
        let value = serde_json::to_value(&tool).expect("message should serialize");
        assert_eq!(
            value,
            json!({
                "role": "tool",
                "content": "{\"price\": 150.0}",
                "tool_call_id": "call_1"
            })
        );
    }

    #[test]
    fn tool_schema_round_trips_through_function_wrapper() {
        let schema = ToolSchema::new(
            "get_quote",
            "Look up the latest price",
            json!({"type": "object", "properties": {"ticker": {"type": "string"}}}),
        );

        let value = serde_json::to_value(&schema).expect("schema should serialize");
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "get_quote");
        assert_eq!(
            value["function"]["parameters"]["properties"]["ticker"]["type"],
            "string"
        );

        let round_tripped: ToolSchema =
            serde_json::from_value(value).expect("schema should deserialize");
        assert_eq!(round_tripped, schema);
    }

    #[test]
    fn arguments_value_accepts_object_string_and_empty_forms() {
        let plain = ToolCallRequest::new("c1", "quote", "{\"ticker\":\"MSFT\"}");
        assert_eq!(
            plain.arguments_value().expect("object should parse"),
            json!({"ticker": "MSFT"})
        );

        let double_encoded =
            ToolCallRequest::new("c2", "quote", "\"{\\\"ticker\\\":\\\"MSFT\\\"}\"");
        assert_eq!(
            double_encoded
                .arguments_value()
                .expect("double-encoded should parse"),
            json!({"ticker": "MSFT"})
        );

        let empty = ToolCallRequest::new("c3", "quote", "");
        assert_eq!(empty.arguments_value().expect("empty should parse"), json!({}));

        let broken = ToolCallRequest::new("c4", "quote", "{not json");
        let error = broken.arguments_value().expect_err("broken should fail");
        assert_eq!(error.kind, ProviderErrorKind::InvalidRequest);
    }

    #[test]
    fn finish_reason_reconciles_with_tool_call_presence() {
        assert_eq!(
            FinishReason::Stop.reconcile(true),
            FinishReason::ToolCalls
        );
        assert_eq!(
            FinishReason::ToolCalls.reconcile(false),
            FinishReason::Stop
        );
        assert_eq!(FinishReason::Length.reconcile(false), FinishReason::Length);
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")])
            .with_temperature(3.5);
        let error = request.validate().expect_err("temperature should fail");
        assert_eq!(error.kind, ProviderErrorKind::InvalidRequest);
    }
}
