//! Provider error kinds, retryability classification, and helpers.
//!
//! ```rust
//! use tprovider::ProviderError;
//!
//! let auth = ProviderError::authentication("bad key").with_vendor("openai");
//! assert!(!auth.retryable);
//!
//! let timeout = ProviderError::timeout("deadline exceeded");
//! assert!(timeout.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    Configuration,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub vendor: String,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            vendor: "unknown".to_string(),
            message: message.into(),
            retryable,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message, true)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Configuration, message, false)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }

    /// Catch-all for vendor-side failures with no status signal; retryability
    /// falls back to the text heuristic.
    pub fn upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = retryable_message(&message);
        Self::new(ProviderErrorKind::Other, message, retryable)
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}: {}", self.vendor, self.kind, self.message)
    }
}

impl Error for ProviderError {}

/// Best-effort retryability guess from error text.
///
/// Vendors word rate-limit and overload failures inconsistently, and some
/// transports drop the status code entirely, so this is a heuristic hint,
/// not a contract.
pub fn retryable_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    const TRANSIENT_MARKERS: &[&str] = &[
        "rate",
        "throttl",
        "overload",
        "quota",
        "too many requests",
        "timeout",
        "timed out",
        "temporar",
    ];

    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
