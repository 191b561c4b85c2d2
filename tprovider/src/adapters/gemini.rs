//! Google Gemini `generateContent` adapter.
//!
//! Gemini departs from the canonical shape in three ways this adapter has
//! to bridge: tool calls carry no ids (they are correlated by function
//! name), tool declarations reject `default` keys in their schemas, and
//! tool results must be JSON objects rather than strings. Ids for decoded
//! calls are synthesized per response so the orchestrator can keep its
//! id-paired bookkeeping.

use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::http::post_json;
use crate::config::{SecretString, env_secret, env_string};
use crate::schema::{json_or_wrapped, strip_default_keys};
use crate::{
    ChatProvider, CompletionRequest, CompletionResult, FinishReason, ProviderError,
    ProviderFuture, Role, TokenUsage, ToolCallRequest,
};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    api_key: Option<SecretString>,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    pub fn from_env() -> Self {
        Self {
            api_key: env_secret("GEMINI_API_KEY").or_else(|| env_secret("GOOGLE_API_KEY")),
            base_url: env_string("GEMINI_API_BASE").unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            client: Client::new(),
        }
    }
}

impl ChatProvider for GeminiProvider {
    fn vendor(&self) -> &str {
        "gemini"
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>> {
        Box::pin(async move {
            request.validate().map_err(|err| err.with_vendor("gemini"))?;

            let api_key = self.api_key.as_ref().ok_or_else(|| {
                ProviderError::authentication(
                    "no API key configured for 'gemini' (set GEMINI_API_KEY or GOOGLE_API_KEY)",
                )
                .with_vendor("gemini")
            })?;

            let url = format!(
                "{}/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                request.model
            );
            let headers = [("x-goog-api-key", api_key.expose().to_string())];

            let api_request = encode_request(request)?;
            let raw = post_json(&self.client, &url, &headers, &api_request, "gemini").await?;
            decode_response(raw)
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: ApiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: ApiFunctionResponse,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolGroup {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiGenerationConfig {
    temperature: f32,
}

pub(crate) fn encode_request(request: CompletionRequest) -> Result<impl Serialize, ProviderError> {
    let mut system_parts = Vec::new();
    let mut contents: Vec<ApiContent> = Vec::new();
    // Gemini correlates tool results by function name, not id; remember the
    // names this conversation's calls were issued under.
    let mut call_names: HashMap<String, String> = HashMap::new();

    for message in request.messages {
        match message.role {
            Role::System => {
                system_parts.push(message.content.unwrap_or_default());
            }
            Role::User => {
                contents.push(ApiContent {
                    role: Some("user".to_string()),
                    parts: vec![ApiPart::Text {
                        text: message.content.unwrap_or_default(),
                    }],
                });
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                if let Some(text) = message.content.filter(|text| !text.is_empty()) {
                    parts.push(ApiPart::Text { text });
                }
                for call in &message.tool_calls {
                    call_names.insert(call.id.clone(), call.name.clone());
                    parts.push(ApiPart::FunctionCall {
                        function_call: ApiFunctionCall {
                            name: call.name.clone(),
                            args: call.arguments_value()?,
                        },
                    });
                }
                contents.push(ApiContent {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            Role::Tool => {
                let name = message
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| call_names.get(id))
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                let part = ApiPart::FunctionResponse {
                    function_response: ApiFunctionResponse {
                        name,
                        response: json_or_wrapped(message.content_str()),
                    },
                };
                match contents.last_mut() {
                    Some(previous)
                        if previous.role.as_deref() == Some("user")
                            && matches!(
                                previous.parts.last(),
                                Some(ApiPart::FunctionResponse { .. })
                            ) =>
                    {
                        previous.parts.push(part);
                    }
                    _ => contents.push(ApiContent {
                        role: Some("user".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    let declarations = request
        .tools
        .into_iter()
        .map(|tool| ApiFunctionDeclaration {
            name: tool.name,
            description: tool.description,
            parameters: strip_default_keys(&tool.parameters),
        })
        .collect::<Vec<_>>();

    Ok(ApiRequest {
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(ApiContent {
                role: None,
                parts: vec![ApiPart::Text {
                    text: system_parts.join("\n\n"),
                }],
            })
        },
        contents,
        tools: if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ApiToolGroup {
                function_declarations: declarations,
            }]
        },
        generation_config: request
            .temperature
            .map(|temperature| ApiGenerationConfig { temperature }),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: ApiUsageMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

pub(crate) fn decode_response(raw: Value) -> Result<CompletionResult, ProviderError> {
    let parsed: ApiResponse = serde_json::from_value(raw.clone()).map_err(|err| {
        ProviderError::transport(format!("unexpected response body: {err}")).with_vendor("gemini")
    })?;

    let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
        ProviderError::transport("response did not include candidates").with_vendor("gemini")
    })?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    let parts = candidate.content.map(|content| content.parts).unwrap_or_default();
    for part in parts {
        match part {
            ApiPart::Text { text } => text_parts.push(text),
            ApiPart::FunctionCall { function_call } => {
                // Zero-parameter tools arrive with no args at all; the
                // orchestrator expects an encoded object either way.
                let arguments = if function_call.args.is_null() {
                    "{}".to_string()
                } else {
                    serde_json::to_string(&function_call.args).map_err(|err| {
                        ProviderError::transport(format!(
                            "functionCall args failed to re-encode: {err}"
                        ))
                        .with_vendor("gemini")
                    })?
                };
                let id = format!("gemini_call_{}", tool_calls.len());
                tool_calls.push(ToolCallRequest::new(id, function_call.name, arguments));
            }
            ApiPart::FunctionResponse { .. } => {}
        }
    }

    let finish_reason = if !tool_calls.is_empty() {
        FinishReason::ToolCalls
    } else if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        FinishReason::Length
    } else {
        FinishReason::Stop
    };

    Ok(CompletionResult {
        text: text_parts.join("\n"),
        tool_calls,
        finish_reason,
        usage: TokenUsage {
            prompt_tokens: parsed.usage_metadata.prompt_token_count,
            completion_tokens: parsed.usage_metadata.candidates_token_count,
            total_tokens: parsed.usage_metadata.total_token_count,
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
    fn encode_builds_system_instruction_and_sanitized_declarations() {
        let request = CompletionRequest::new(
            "gemini-2.0-flash",
            vec![
                Message::system("You are a market analyst."),
                Message::user("Price of AAPL?"),
            ],
        )
        .with_tools(vec![ToolSchema::new(
            "get_quote",
            "Latest price",
            json!({
                "type": "object",
                "properties": {"ticker": {"type": "string", "default": "AAPL"}}
            }),
        )])
        .with_temperature(0.2);

        let encoded =
            serde_json::to_value(encode_request(request).expect("request should encode"))
                .expect("request should serialize");

        assert_eq!(
            encoded["systemInstruction"]["parts"][0]["text"],
            "You are a market analyst."
        );
        assert_eq!(encoded["contents"][0]["role"], "user");
        let declaration = &encoded["tools"][0]["functionDeclarations"][0];
        assert_eq!(declaration["name"], "get_quote");
        assert!(declaration["parameters"]["properties"]["ticker"]
            .get("default")
            .is_none());
        assert_eq!(encoded["generationConfig"]["temperature"], json!(0.2_f32));
    }

    #[test]
    fn encode_correlates_tool_results_by_remembered_name() {
        let request = CompletionRequest::new(
            "gemini-2.0-flash",
            vec![
                Message::user("Compare AAPL and MSFT"),
                Message::assistant_with_calls(
                    None,
                    vec![
                        ToolCallRequest::new("gemini_call_0", "get_quote", "{\"ticker\":\"AAPL\"}"),
                        ToolCallRequest::new("gemini_call_1", "get_news", "{\"ticker\":\"MSFT\"}"),
                    ],
                ),
                Message::tool("gemini_call_0", "{\"price\": 150}"),
                Message::tool("gemini_call_1", "plain headline text"),
            ],
        );

        let encoded =
            serde_json::to_value(encode_request(request).expect("request should encode"))
                .expect("request should serialize");
        let contents = encoded["contents"].as_array().expect("contents array");

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["args"],
            json!({"ticker": "AAPL"})
        );
        let responses = contents[2]["parts"].as_array().expect("parts array");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["functionResponse"]["name"], "get_quote");
        assert_eq!(
            responses[0]["functionResponse"]["response"],
            json!({"price": 150})
        );
        assert_eq!(responses[1]["functionResponse"]["name"], "get_news");
        assert_eq!(
            responses[1]["functionResponse"]["response"],
            json!({"result": "plain headline text"})
        );
    }

    #[test]
    fn encode_falls_back_to_unknown_for_unrecognized_result_ids() {
        let request = CompletionRequest::new(
            "gemini-2.0-flash",
            vec![
                Message::user("hi"),
                Message::tool("missing_id", "{\"ok\": true}"),
            ],
        );

        let encoded =
            serde_json::to_value(encode_request(request).expect("request should encode"))
                .expect("request should serialize");
        assert_eq!(
            encoded["contents"][1]["parts"][0]["functionResponse"]["name"],
            "unknown"
        );
    }

    #[test]
    fn decode_synthesizes_sequential_call_ids() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Checking."},
                        {"functionCall": {"name": "get_quote", "args": {"ticker": "AAPL"}}},
                        {"functionCall": {"name": "get_news", "args": {"ticker": "AAPL"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 4,
                              "totalTokenCount": 13}
        });

        let result = decode_response(raw).expect("response should decode");
        assert_eq!(result.text, "Checking.");
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].id, "gemini_call_0");
        assert_eq!(result.tool_calls[1].id, "gemini_call_1");
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
        assert_eq!(result.usage.total_tokens, 13);
    }

    #[test]
    fn decode_maps_max_tokens_and_joins_text_parts() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "AAPL is $150"}, {"text": "Volume is heavy."}]
                },
                "finishReason": "MAX_TOKENS"
            }]
        });

        let result = decode_response(raw).expect("response should decode");
        assert_eq!(result.text, "AAPL is $150\nVolume is heavy.");
        assert_eq!(result.finish_reason, FinishReason::Length);
    }

    #[test]
    fn decode_treats_absent_call_args_as_an_empty_object() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "get_market_status"}}]
                },
                "finishReason": "STOP"
            }]
        });

        let result = decode_response(raw).expect("response should decode");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].arguments, "{}");
        assert_eq!(
            result.tool_calls[0].arguments_value().expect("valid args"),
            json!({})
        );
    }

    #[test]
    fn decode_without_candidates_is_a_transport_error() {
        let error = decode_response(json!({"candidates": []}))
            .expect_err("decode should fail");
        assert_eq!(error.vendor, "gemini");
    }
}
