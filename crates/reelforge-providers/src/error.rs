//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// How a failed provider call should be treated by the retry policy.
///
/// Call sites derive this structurally whenever the provider gives enough
/// information to do so; `classify()` only falls back to matching on the
/// error text when the provider returned an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transient network failure or timeout; safe to retry with backoff.
    Transient,
    /// Provider returned an explicit rate-limit response (e.g. HTTP 429).
    RateLimited,
    /// Provider-side failure (5xx-equivalent); safe to retry with backoff.
    ProviderUnavailable,
    /// Request was malformed or rejected for reasons a retry won't fix.
    Permanent,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("provider returned {status}: {body}")]
    BadResponse { status: u16, body: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("failed to parse provider response: {0}")]
    ParseFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn bad_response(status: u16, body: impl Into<String>) -> Self {
        Self::BadResponse { status, body: body.into() }
    }

    /// Structural classification where the error variant already carries
    /// enough information, falling back to substring matching only for
    /// opaque text (an HTTP client error with no status, or a parse
    /// failure whose body happened to mention "timeout").
    pub fn classify(&self) -> Classification {
        match self {
            ProviderError::RateLimited(_) => Classification::RateLimited,
            ProviderError::BadResponse { status, .. } if *status == 429 => Classification::RateLimited,
            ProviderError::BadResponse { status, .. } if *status >= 500 => Classification::ProviderUnavailable,
            ProviderError::BadResponse { .. } => Classification::Permanent,
            ProviderError::Config(_) | ProviderError::JobNotFound(_) => Classification::Permanent,
            ProviderError::Http(e) if e.is_timeout() || e.is_connect() => Classification::Transient,
            ProviderError::Http(_) => Classification::ProviderUnavailable,
            ProviderError::RequestFailed(msg) | ProviderError::ParseFailed(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("timeout") || lower.contains("connection") {
                    Classification::Transient
                } else if lower.contains("rate limit") || lower.contains("429") {
                    Classification::RateLimited
                } else {
                    Classification::Permanent
                }
            }
            ProviderError::Json(_) => Classification::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classify(),
            Classification::Transient | Classification::RateLimited | Classification::ProviderUnavailable
        )
    }
}
