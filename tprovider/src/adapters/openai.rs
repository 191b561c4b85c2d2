//! OpenAI-compatible chat completions adapter.
//!
//! One implementation covers every vendor speaking the OpenAI wire format:
//! OpenAI itself, Azure, Groq, Together, Mistral, and local Ollama/vLLM
//! servers. The canonical message and tool shapes *are* this vendor family's
//! shapes, so encoding is a pass-through and only configuration differs per
//! prefix.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::http::{endpoint, post_json};
use crate::config::{SecretString, env_secret, env_string};
use crate::{
    ChatProvider, CompletionRequest, CompletionResult, FinishReason, Message, ProviderError,
    ProviderFuture, TokenUsage, ToolCallRequest, ToolSchema,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

struct SubVendor {
    prefix: &'static str,
    key_var: Option<&'static str>,
    base_var: &'static str,
    default_base: Option<&'static str>,
}

/// Prefix-specific credentials and endpoints. Local servers need no key.
const SUB_VENDORS: &[SubVendor] = &[
    SubVendor {
        prefix: "openai",
        key_var: Some("OPENAI_API_KEY"),
        base_var: "OPENAI_API_BASE",
        default_base: Some(OPENAI_BASE_URL),
    },
    SubVendor {
        prefix: "azure",
        key_var: Some("AZURE_API_KEY"),
        base_var: "AZURE_API_BASE",
        default_base: None,
    },
    SubVendor {
        prefix: "groq",
        key_var: Some("GROQ_API_KEY"),
        base_var: "GROQ_API_BASE",
        default_base: Some("https://api.groq.com/openai/v1"),
    },
    SubVendor {
        prefix: "together",
        key_var: Some("TOGETHER_API_KEY"),
        base_var: "TOGETHER_API_BASE",
        default_base: Some("https://api.together.xyz/v1"),
    },
    SubVendor {
        prefix: "mistral",
        key_var: Some("MISTRAL_API_KEY"),
        base_var: "MISTRAL_API_BASE",
        default_base: Some("https://api.mistral.ai/v1"),
    },
    SubVendor {
        prefix: "ollama",
        key_var: None,
        base_var: "OLLAMA_API_BASE",
        default_base: Some("http://localhost:11434/v1"),
    },
    SubVendor {
        prefix: "vllm",
        key_var: None,
        base_var: "VLLM_API_BASE",
        default_base: Some("http://localhost:8000/v1"),
    },
];

pub fn is_openai_compatible(prefix: &str) -> bool {
    SUB_VENDORS.iter().any(|entry| entry.prefix == prefix)
}

pub struct OpenAiCompatProvider {
    vendor: String,
    api_key: Option<SecretString>,
    key_var: Option<&'static str>,
    base_url: Option<String>,
    base_var: &'static str,
    client: Client,
}

impl OpenAiCompatProvider {
    /// Builds the adapter for one family prefix, reading credentials and
    /// base-URL overrides from the environment once. A missing key is kept
    /// absent here and reported on the first call.
    pub fn for_prefix(prefix: &str) -> Self {
        let entry = SUB_VENDORS
            .iter()
            .find(|entry| entry.prefix == prefix)
            .unwrap_or(&SUB_VENDORS[0]);

        let api_key = entry.key_var.and_then(env_secret);
        let base_url = env_string(entry.base_var).or_else(|| {
            entry.default_base.map(ToString::to_string)
        });

        Self {
            vendor: prefix.to_string(),
            api_key,
            key_var: entry.key_var,
            base_url,
            base_var: entry.base_var,
            client: Client::new(),
        }
    }

    /// Direct constructor for gateways and tests that manage their own
    /// credentials.
    pub fn with_credentials(
        vendor: impl Into<String>,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            api_key: api_key.map(SecretString::new),
            key_var: None,
            base_url: Some(base_url.into()),
            base_var: "LLM_API_BASE",
            client: Client::new(),
        }
    }

    fn auth_header(&self) -> Result<Option<(&'static str, String)>, ProviderError> {
        match (&self.api_key, self.key_var) {
            (Some(key), _) => Ok(Some(("Authorization", format!("Bearer {}", key.expose())))),
            (None, Some(var)) => Err(ProviderError::authentication(format!(
                "no API key configured for '{}' (set {var})",
                self.vendor
            ))
            .with_vendor(&self.vendor)),
            (None, None) => Ok(None),
        }
    }

    fn resolve_base_url(&self) -> Result<&str, ProviderError> {
        self.base_url.as_deref().ok_or_else(|| {
            ProviderError::configuration(format!(
                "no base URL configured for '{}' (set {})",
                self.vendor, self.base_var
            ))
            .with_vendor(&self.vendor)
        })
    }
}

impl ChatProvider for OpenAiCompatProvider {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>> {
        Box::pin(async move {
            request.validate().map_err(|err| err.with_vendor(&self.vendor))?;

            let base_url = self.resolve_base_url()?;
            let url = endpoint(base_url, "chat/completions");
            let mut headers = Vec::new();
            if let Some(header) = self.auth_header()? {
                headers.push(header);
            }

            let api_request = encode_request(request);
            let raw = post_json(&self.client, &url, &headers, &api_request, &self.vendor).await?;
            decode_response(raw, &self.vendor)
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Canonical messages and tool schemas pass through unchanged.
pub(crate) fn encode_request(request: CompletionRequest) -> impl Serialize {
    ApiRequest {
        model: request.model,
        messages: request.messages,
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(request.tools)
        },
        temperature: request.temperature,
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiAssistantMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

fn parse_finish_reason(value: Option<&str>) -> FinishReason {
    match value {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

pub(crate) fn decode_response(raw: Value, vendor: &str) -> Result<CompletionResult, ProviderError> {
    let parsed: ApiResponse = serde_json::from_value(raw.clone())
        .map_err(|err| ProviderError::transport(format!("unexpected response body: {err}")).with_vendor(vendor))?;

    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        ProviderError::transport("response did not include choices").with_vendor(vendor)
    })?;

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    let finish_reason =
        parse_finish_reason(choice.finish_reason.as_deref()).reconcile(!tool_calls.is_empty());
    let usage = parsed.usage.unwrap_or_default();

    Ok(CompletionResult {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason,
        usage: TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        },
        raw,
    })
}
