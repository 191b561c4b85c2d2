use tcommon::BoxFuture;

use crate::{CompletionRequest, CompletionResult, ProviderError};

pub type ProviderFuture<'a, T> = BoxFuture<'a, T>;

/// One vendor adapter: translates the canonical request into the vendor's
/// wire format, issues the call, and translates the response back.
///
/// Implementations never let a transport or serde error type escape; every
/// failure surfaces as a [`ProviderError`] tagged with the vendor name.
pub trait ChatProvider: Send + Sync {
    fn vendor(&self) -> &str;

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>>;
}
