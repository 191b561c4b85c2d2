//! Shared HTTP plumbing for the vendor adapters.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::{ProviderError, error::retryable_message};

/// Per-call deadline applied to every vendor request.
pub(crate) const CALL_TIMEOUT: Duration = Duration::from_secs(120);

const ERROR_BODY_LIMIT: usize = 4096;

/// POSTs a JSON body and returns the parsed response body.
///
/// All transport and vendor-side failures are mapped to `ProviderError`
/// here so individual adapters only deal with their wire codecs.
pub(crate) async fn post_json<T: Serialize>(
    client: &Client,
    url: &str,
    headers: &[(&'static str, String)],
    body: &T,
    vendor: &str,
) -> Result<Value, ProviderError> {
    let mut builder = client.post(url).timeout(CALL_TIMEOUT).json(body);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }

    let response = builder.send().await.map_err(|err| {
        let mapped = if err.is_timeout() {
            ProviderError::timeout(err.to_string())
        } else {
            ProviderError::transport(err.to_string())
        };
        mapped.with_vendor(vendor)
    })?;

    if !response.status().is_success() {
        return Err(parse_error(response, vendor).await);
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| ProviderError::transport(err.to_string()).with_vendor(vendor))
}

async fn parse_error(response: Response, vendor: &str) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| format!("request failed with status {status}: {}", truncate(&body)));

    let mapped = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::timeout(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::invalid_request(message)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            ProviderError::unavailable(message)
        }
        _ => {
            // No status signal worth trusting; fall back to the text guess.
            let retryable = retryable_message(&message);
            ProviderError::new(crate::ProviderErrorKind::Transport, message, retryable)
        }
    };

    mapped.with_vendor(vendor)
}

/// Pulls a human-readable message out of the common vendor error envelopes:
/// `{"error": {"message": ...}}`, `{"error": "..."}`, or `{"message": ...}`.
fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;

    if let Some(error) = parsed.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        if let Some(message) = error.as_str() {
            return Some(message.to_string());
        }
    }

    parsed
        .get("message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn truncate(input: &str) -> String {
    if input.len() <= ERROR_BODY_LIMIT {
        return input.to_string();
    }
    let mut output = input
        .char_indices()
        .take_while(|(index, _)| *index < ERROR_BODY_LIMIT)
        .map(|(_, ch)| ch)
        .collect::<String>();
    output.push_str("...");
    output
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}
