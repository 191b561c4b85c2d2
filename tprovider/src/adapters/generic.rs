//! Catch-all gateway adapter for unrecognized model prefixes.
//!
//! Routes anything the registry cannot match to an OpenAI-compatible
//! gateway (LiteLLM proxies, OpenRouter, and similar) configured through
//! `LLM_API_KEY` and `LLM_API_BASE`. The full model string, prefix
//! included, is forwarded untouched so the gateway can do its own routing.

use crate::adapters::openai::OpenAiCompatProvider;
use crate::config::env_string;
use crate::{ChatProvider, CompletionRequest, CompletionResult, ProviderError, ProviderFuture};

pub const GENERIC_BASE_URL: &str = "http://localhost:4000";

pub struct GenericProvider {
    inner: OpenAiCompatProvider,
}

impl GenericProvider {
    pub fn from_env() -> Self {
        Self {
            inner: OpenAiCompatProvider::with_credentials(
                "generic",
                env_string("LLM_API_KEY"),
                env_string("LLM_API_BASE").unwrap_or_else(|| GENERIC_BASE_URL.to_string()),
            ),
        }
    }
}

impl ChatProvider for GenericProvider {
    fn vendor(&self) -> &str {
        "generic"
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>> {
        self.inner.complete(request)
    }
}
