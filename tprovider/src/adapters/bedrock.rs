//! AWS Bedrock Converse API adapter.
//!
//! Talks to the `bedrock-runtime` Converse endpoint over plain HTTPS with a
//! bearer API key, so no AWS SDK or SigV4 signing is involved. The Converse
//! wire shape is close to Anthropic's: system text rides in a top-level
//! list, tool calls are `toolUse` content blocks, and tool results are
//! `toolResult` blocks inside a user turn.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::http::post_json;
use crate::config::{SecretString, env_secret, env_string};
use crate::schema::json_or_wrapped;
use crate::{
    ChatProvider, CompletionRequest, CompletionResult, FinishReason, ProviderError,
    ProviderFuture, Role, TokenUsage, ToolCallRequest,
};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct BedrockProvider {
    api_key: Option<SecretString>,
    base_url: String,
    client: Client,
}

impl BedrockProvider {
    pub fn from_env() -> Self {
        let region = env_string("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self {
            api_key: env_secret("AWS_BEARER_TOKEN_BEDROCK"),
            base_url: env_string("BEDROCK_API_BASE")
                .unwrap_or_else(|| format!("https://bedrock-runtime.{region}.amazonaws.com")),
            client: Client::new(),
        }
    }
}

impl ChatProvider for BedrockProvider {
    fn vendor(&self) -> &str {
        "bedrock"
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>> {
        Box::pin(async move {
            request.validate().map_err(|err| err.with_vendor("bedrock"))?;

            let api_key = self.api_key.as_ref().ok_or_else(|| {
                ProviderError::authentication(
                    "no API key configured for 'bedrock' (set AWS_BEARER_TOKEN_BEDROCK)",
                )
                .with_vendor("bedrock")
            })?;

            let url = format!(
                "{}/model/{}/converse",
                self.base_url.trim_end_matches('/'),
                request.model
            );
            let headers = [(
                "Authorization",
                format!("Bearer {}", api_key.expose()),
            )];

            let api_request = encode_request(request)?;
            let raw = post_json(&self.client, &url, &headers, &api_request, "bedrock").await?;
            decode_response(raw)
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<ApiSystemBlock>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ApiToolConfig>,
    inference_config: ApiInferenceConfig,
}

#[derive(Debug, Serialize)]
struct ApiSystemBlock {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Vec<ApiBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ApiBlock {
    Text(String),
    ToolUse(ApiToolUse),
    ToolResult(ApiToolResult),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolUse {
    tool_use_id: String,
    name: String,
    input: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolResult {
    tool_use_id: String,
    content: Vec<ApiToolResultBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolResultBlock {
    json: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolConfig {
    tools: Vec<ApiToolEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolEntry {
    tool_spec: ApiToolSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolSpec {
    name: String,
    description: String,
    input_schema: ApiInputSchema,
}

#[derive(Debug, Serialize)]
struct ApiInputSchema {
    json: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiInferenceConfig {
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

pub(crate) fn encode_request(request: CompletionRequest) -> Result<impl Serialize, ProviderError> {
    let mut system = Vec::new();
    let mut messages: Vec<ApiMessage> = Vec::new();

    for message in request.messages {
        match message.role {
            Role::System => {
                system.push(ApiSystemBlock {
                    text: message.content.unwrap_or_default(),
                });
            }
            Role::User => {
                messages.push(ApiMessage {
                    role: "user".to_string(),
                    content: vec![ApiBlock::Text(message.content.unwrap_or_default())],
                });
            }
            Role::Assistant => {
                let mut blocks = Vec::new();
                if let Some(text) = message.content.filter(|text| !text.is_empty()) {
                    blocks.push(ApiBlock::Text(text));
                }
                for call in &message.tool_calls {
                    blocks.push(ApiBlock::ToolUse(ApiToolUse {
                        tool_use_id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments_value()?,
                    }));
                }
                messages.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: blocks,
                });
            }
            Role::Tool => {
                let content = message.content.unwrap_or_default();
                let block = ApiBlock::ToolResult(ApiToolResult {
                    tool_use_id: message.tool_call_id.unwrap_or_default(),
                    content: vec![ApiToolResultBlock {
                        json: json_or_wrapped(&content),
                    }],
                });
                match messages.last_mut() {
                    Some(previous)
                        if previous.role == "user"
                            && matches!(
                                previous.content.last(),
                                Some(ApiBlock::ToolResult(_))
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
        .map(|tool| ApiToolEntry {
            tool_spec: ApiToolSpec {
                name: tool.name,
                description: tool.description,
                input_schema: ApiInputSchema {
                    json: tool.parameters,
                },
            },
        })
        .collect::<Vec<_>>();

    Ok(ApiRequest {
        system,
        messages,
        tool_config: if tools.is_empty() {
            None
        } else {
            Some(ApiToolConfig { tools })
        },
        inference_config: ApiInferenceConfig {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: request.temperature,
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    output: ApiOutput,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiOutput {
    message: ApiMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
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
        ProviderError::transport(format!("unexpected response body: {err}")).with_vendor("bedrock")
    })?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in parsed.output.message.content {
        match block {
            ApiBlock::Text(text) => text_parts.push(text),
            ApiBlock::ToolUse(tool_use) => {
                let arguments = serde_json::to_string(&tool_use.input).map_err(|err| {
                    ProviderError::transport(format!("toolUse input failed to re-encode: {err}"))
                        .with_vendor("bedrock")
                })?;
                tool_calls.push(ToolCallRequest::new(
                    tool_use.tool_use_id,
                    tool_use.name,
                    arguments,
                ));
            }
            ApiBlock::ToolResult(_) => {}
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
            total_tokens: parsed.usage.total_tokens,
        },
        raw,
    })
}
