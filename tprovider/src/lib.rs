//! Vendor-neutral chat completion layer.
//!
//! One canonical request/response model, a [`ChatProvider`] trait, one
//! adapter per vendor wire format, and a [`ProviderRouter`] that maps
//! `prefix/model` strings to lazily constructed adapters.
//!
//! ```rust
//! use tprovider::{parse_model_string, ProviderRouter};
//!
//! let route = parse_model_string("groq/llama-3.3-70b-versatile");
//! assert_eq!(route.key, "groq");
//! assert_eq!(route.model, "llama-3.3-70b-versatile");
//!
//! let router = ProviderRouter::new();
//! let (provider, model) = router.resolve("anthropic/claude-sonnet-4").expect("resolvable");
//! assert_eq!(provider.vendor(), "anthropic");
//! assert_eq!(model, "claude-sonnet-4");
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod registry;
pub mod schema;

pub use config::SecretString;
pub use error::{ProviderError, ProviderErrorKind, retryable_message};
pub use model::{
    CompletionRequest, CompletionResult, FinishReason, Message, Role, TokenUsage, ToolCallRequest,
    ToolSchema,
};
pub use provider::{ChatProvider, ProviderFuture};
pub use registry::{ModelRoute, ProviderRouter, parse_model_string};
