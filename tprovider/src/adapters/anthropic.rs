//! Anthropic Messages API adapter.
//!
//! Translation differences from the canonical shape:
//! - system turns are hoisted out of the message list into the top-level
//!   `system` field
//! - assistant tool calls become `tool_use` content blocks and tool results
//!   become `tool_result` blocks inside a user turn
//! - consecutive tool results must land in one user turn, since the API
//!   rejects adjacent same-role messages

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::http::{endpoint, post_json};
use crate::config::{SecretString, env_secret, env_string};
use crate::{
    ChatProvider, CompletionRequest, CompletionResult, FinishReason, ProviderError,
    ProviderFuture, Role, TokenUsage, ToolCallRequest,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    api_key: Option<SecretString>,
    base_url: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn from_env() -> Self {
        Self {
            api_key: env_secret("ANTHROPIC_API_KEY"),
            base_url: env_string("ANTHROPIC_API_BASE")
                .unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            client: Client::new(),
        }
    }
}

impl ChatProvider for AnthropicProvider {
    fn vendor(&self) -> &str {
        "anthropic"
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>> {
        Box::pin(async move {
            request.validate().map_err(|err| err.with_vendor("anthropic"))?;

            let api_key = self.api_key.as_ref().ok_or_else(|| {
                ProviderError::authentication(
                    "no API key configured for 'anthropic' (set ANTHROPIC_API_KEY)",
                )
                .with_vendor("anthropic")
            })?;

            let url = endpoint(&self.base_url, "messages");
            let headers = [
                ("x-api-key", api_key.expose().to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ];

            let api_request = encode_request(request)?;
            let raw = post_json(&self.client, &url, &headers, &api_request, "anthropic").await?;
            decode_response(raw)
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Vec<ApiBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block kinds this adapter does not consume (thinking, citations).
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

pub(crate) fn encode_request(request: CompletionRequest) -> Result<impl Serialize, ProviderError> {
    let mut system_parts = Vec::new();
    let mut messages: Vec<ApiMessage> = Vec::new();

    for message in request.messages {
        match message.role {
            Role::System => {
                system_parts.push(message.content.unwrap_or_default());
            }
            Role::User => {
                messages.push(ApiMessage {
                    role: "user".to_string(),
                    content: vec![ApiBlock::Text {
                        text: message.content.unwrap_or_default(),
                    }],
                });
            }
            Role::Assistant => {
                let mut blocks = Vec::new();
                if let Some(text) = message.content.filter(|text| !text.is_empty()) {
                    blocks.push(ApiBlock::Text { text });
                }
                for call in &message.tool_calls {
                    blocks.push(ApiBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments_value()?,
                    });
                }
                messages.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: blocks,
                });
            }
            Role::Tool => {
                let block = ApiBlock::ToolResult {
                    tool_use_id: message.tool_call_id.unwrap_or_default(),
                    content: message.content.unwrap_or_default(),
                };
                // Adjacent results join the previous user turn.
                match messages.last_mut() {
                    Some(previous)
                        if previous.role == "user"
                            && matches!(
                                previous.content.last(),
                                Some(ApiBlock::ToolResult { .. })
                            ) =>
                    {
                        previous.content.push(block);
                    }
                    _ => messages.push(ApiMessage {
                        role: "user".to_string(),
                        content: vec![block],
                    }),
                }
            }
        }
    }

    let tools = request
        .tools
        .into_iter()
        .map(|tool| ApiTool {
            name: tool.name,
            description: tool.description,
            input_schema: tool.parameters,
        })
        .collect();

    Ok(ApiRequest {
        model: request.model,
        max_tokens: DEFAULT_MAX_TOKENS,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        },
        messages,
        tools,
        temperature: request.temperature,
    })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn parse_stop_reason(value: Option<&str>) -> FinishReason {
    match value {
        Some("tool_use") => FinishReason::ToolCalls,
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

pub(crate) fn decode_response(raw: Value) -> Result<CompletionResult, ProviderError> {
    let parsed: ApiResponse = serde_json::from_value(raw.clone()).map_err(|err| {
        ProviderError::transport(format!("unexpected response body: {err}")).with_vendor("anthropic")
    })?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in parsed.content {
        match block {
            ApiBlock::Text { text } => text_parts.push(text),
            ApiBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input).map_err(|err| {
                    ProviderError::transport(format!("tool_use input failed to re-encode: {err}"))
                        .with_vendor("anthropic")
                })?;
                tool_calls.push(ToolCallRequest::new(id, name, arguments));
            }
            ApiBlock::ToolResult { .. } | ApiBlock::Other => {}
        }
    }

    let finish_reason =
        parse_stop_reason(parsed.stop_reason.as_deref()).reconcile(!tool_calls.is_empty());

    Ok(CompletionResult {
        text: text_parts.join("\n"),
        tool_calls,
        finish_reason,
        usage: TokenUsage {
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
            total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
        },
        raw,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Message, ToolSchema};

    #[test]
    fn encode_hoists_system_turns_and_translates_tools() {
        let request = CompletionRequest::new(
            "claude-sonnet-4",
            vec![
                Message::system("You are a market analyst."),
                Message::system("Answer tersely."),
                Message::user("Price of AAPL?"),
            ],
        )
        .with_tools(vec![ToolSchema::new(
            "get_quote",
            "Latest price",
            json!({"type": "object"}),
        )]);

        let encoded =
            serde_json::to_value(encode_request(request).expect("request should encode"))
                .expect("request should serialize");

        assert_eq!(
            encoded["system"],
            "You are a market analyst.\n\nAnswer tersely."
        );
        assert_eq!(encoded["max_tokens"], 4096);
        assert_eq!(encoded["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(encoded["tools"][0]["name"], "get_quote");
        assert_eq!(encoded["tools"][0]["input_schema"]["type"], "object");
        assert!(encoded["tools"][0].get("parameters").is_none());
    }

    #[test]
    fn encode_coalesces_consecutive_tool_results_into_one_user_turn() {
        let request = CompletionRequest::new(
            "claude-sonnet-4",
            vec![
                Message::user("Compare AAPL and MSFT"),
                Message::assistant_with_calls(
                    None,
                    vec![
                        ToolCallRequest::new("c1", "get_quote", "{\"ticker\":\"AAPL\"}"),
                        ToolCallRequest::new("c2", "get_quote", "{\"ticker\":\"MSFT\"}"),
                    ],
                ),
                Message::tool("c1", "{\"price\": 150}"),
                Message::tool("c2", "{\"price\": 300}"),
            ],
        );

        let encoded =
            serde_json::to_value(encode_request(request).expect("request should encode"))
                .expect("request should serialize");
        let messages = encoded["messages"].as_array().expect("messages array");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[1]["content"][0]["input"], json!({"ticker": "AAPL"}));
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"].as_array().map(Vec::len), Some(2));
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "c1");
        assert_eq!(messages[2]["content"][1]["tool_use_id"], "c2");
    }

    #[test]
    fn decode_collects_text_and_tool_use_blocks() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "Looking that up."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_quote",
                 "input": {"ticker": "AAPL"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 8}
        });

        let result = decode_response(raw).expect("response should decode");
        assert_eq!(result.text, "Looking that up.");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].id, "toolu_1");
        assert_eq!(
            result.tool_calls[0].arguments_value().expect("valid args"),
            json!({"ticker": "AAPL"})
        );
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
        assert_eq!(result.usage.total_tokens, 28);
    }

    #[test]
    fn decode_maps_max_tokens_and_ignores_unknown_blocks() {
        let raw = json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Partial answer"}
            ],
            "stop_reason": "max_tokens"
        });

        let result = decode_response(raw).expect("response should decode");
        assert_eq!(result.text, "Partial answer");
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.finish_reason, FinishReason::Length);
    }
}
