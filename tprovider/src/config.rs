//! Environment-backed vendor configuration and in-memory secrets.

use std::env;

/// API key holder with a redacted `Debug` and zeroized drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// Reads an environment variable, treating blank values as absent.
pub fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads a credential variable at adapter construction time.
///
/// Absence is not an error here; adapters defer the failure to the first
/// call so a missing key never crashes process start.
pub fn env_secret(name: &str) -> Option<SecretString> {
    env_string(name).map(SecretString::new)
}
