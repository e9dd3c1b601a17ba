//! Error type for the Anthropic API client.

use thiserror::Error;

/// Errors raised while talking to the Anthropic API.
///
/// - [`RateLimited`](AnthropicError::RateLimited): the server answered HTTP 429
/// - [`ApiError`](AnthropicError::ApiError): any other 4xx/5xx
/// - [`NetworkError`](AnthropicError::NetworkError): transport failure
/// - [`InvalidResponse`](AnthropicError::InvalidResponse): the reply was not the structured object asked for
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// `retry_after_ms` is how long the server asked us to wait.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}
