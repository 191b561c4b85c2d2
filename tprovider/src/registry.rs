//! Model-string routing and the lazy provider cache.
//!
//! Model strings are `prefix/model` (`groq/llama-3.3-70b`,
//! `together/meta-llama/Llama-3-70b`); only the first slash splits, so
//! vendor-side model paths keep their own slashes. A string with no known
//! prefix, or no slash at all, routes to the catch-all gateway with the
//! full original string.
//!
//! Adapters are constructed on first use and cached per prefix, so an
//! unconfigured vendor costs nothing until a request actually names it.

use std::sync::{Arc, RwLock};

use tcommon::Registry;
use tracing::debug;

use crate::adapters::anthropic::AnthropicProvider;
use crate::adapters::bedrock::BedrockProvider;
use crate::adapters::gemini::GeminiProvider;
use crate::adapters::generic::GenericProvider;
use crate::adapters::openai::{OpenAiCompatProvider, is_openai_compatible};
use crate::{ChatProvider, ProviderError};

const FALLBACK_KEY: &str = "_fallback";

/// The routing decision for one model string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    /// Cache key: a known vendor prefix, or `_fallback`.
    pub key: String,
    /// Model id to hand the adapter. The prefix is stripped for known
    /// vendors and kept for the fallback.
    pub model: String,
}

/// Splits a model string into its route.
pub fn parse_model_string(model_string: &str) -> ModelRoute {
    if let Some((prefix, rest)) = model_string.split_once('/') {
        let prefix = prefix.to_ascii_lowercase();
        if !rest.is_empty() && is_known_prefix(&prefix) {
            return ModelRoute {
                key: prefix,
                model: rest.to_string(),
            };
        }
    }

    ModelRoute {
        key: FALLBACK_KEY.to_string(),
        model: model_string.to_string(),
    }
}

fn is_known_prefix(prefix: &str) -> bool {
    is_openai_compatible(prefix) || matches!(prefix, "anthropic" | "gemini" | "google" | "bedrock")
}

/// Lazily constructed, cached vendor adapters keyed by prefix.
pub struct ProviderRouter {
    providers: RwLock<Registry<String, Arc<dyn ChatProvider>>>,
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Registry::new()),
        }
    }

    /// Resolves a model string to an adapter and the model id to send it.
    ///
    /// Repeated calls for the same prefix return the same adapter instance.
    pub fn resolve(
        &self,
        model_string: &str,
    ) -> Result<(Arc<dyn ChatProvider>, String), ProviderError> {
        let route = parse_model_string(model_string);

        {
            let providers = self.providers.read().map_err(|_| lock_poisoned())?;
            if let Some(provider) = providers.get(route.key.as_str()) {
                return Ok((Arc::clone(provider), route.model));
            }
        }

        let mut providers = self.providers.write().map_err(|_| lock_poisoned())?;
        // Another caller may have constructed it between the two locks.
        if let Some(provider) = providers.get(route.key.as_str()) {
            return Ok((Arc::clone(provider), route.model));
        }

        let provider = construct(&route.key);
        debug!(key = %route.key, vendor = provider.vendor(), "constructed provider adapter");
        providers.insert(route.key.clone(), Arc::clone(&provider));
        Ok((provider, route.model))
    }

    /// Pre-seeds the cache under an arbitrary key. Tests use this to stand
    /// in fake providers without touching the environment.
    pub fn register(&self, key: impl Into<String>, provider: Arc<dyn ChatProvider>) {
        if let Ok(mut providers) = self.providers.write() {
            providers.insert(key.into(), provider);
        }
    }

    /// Drops every cached adapter; the next resolve reconstructs from the
    /// current environment.
    pub fn clear(&self) {
        if let Ok(mut providers) = self.providers.write() {
            *providers = Registry::new();
        }
    }
}

fn construct(key: &str) -> Arc<dyn ChatProvider> {
    match key {
        "anthropic" => Arc::new(AnthropicProvider::from_env()),
        // Both aliases route to the same implementation, each under its own
        // cache key like the rest of the prefix table.
        "gemini" | "google" => Arc::new(GeminiProvider::from_env()),
        "bedrock" => Arc::new(BedrockProvider::from_env()),
        FALLBACK_KEY => Arc::new(GenericProvider::from_env()),
        prefix => Arc::new(OpenAiCompatProvider::for_prefix(prefix)),
    }
}

fn lock_poisoned() -> ProviderError {
    ProviderError::other("provider registry lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_slash_only() {
        let route = parse_model_string("together/meta-llama/Llama-3-70b");
        assert_eq!(route.key, "together");
        assert_eq!(route.model, "meta-llama/Llama-3-70b");
    }

    #[test]
    fn parse_routes_known_prefixes() {
        assert_eq!(parse_model_string("openai/gpt-4o").key, "openai");
        assert_eq!(parse_model_string("OpenAI/gpt-4o").key, "openai");
        assert_eq!(parse_model_string("anthropic/claude-sonnet-4").key, "anthropic");
        assert_eq!(parse_model_string("gemini/gemini-2.0-flash").key, "gemini");
        assert_eq!(parse_model_string("google/gemini-2.0-flash").key, "google");
        assert_eq!(
            parse_model_string("bedrock/amazon.nova-pro-v1:0").model,
            "amazon.nova-pro-v1:0"
        );
        assert_eq!(parse_model_string("ollama/llama3").key, "ollama");
    }

    #[test]
    fn parse_sends_unknown_and_bare_strings_to_the_fallback_intact() {
        let unknown = parse_model_string("openrouter/qwen/qwen3-32b");
        assert_eq!(unknown.key, FALLBACK_KEY);
        assert_eq!(unknown.model, "openrouter/qwen/qwen3-32b");

        let bare = parse_model_string("gpt-4o-mini");
        assert_eq!(bare.key, FALLBACK_KEY);
        assert_eq!(bare.model, "gpt-4o-mini");

        let trailing = parse_model_string("groq/");
        assert_eq!(trailing.key, FALLBACK_KEY);
        assert_eq!(trailing.model, "groq/");
    }
}
