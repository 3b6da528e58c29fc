//! OpenAI-specific error classification.

use std::time::Duration;

use forma_core::Error;

/// OpenAI error classes relevant to routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Per-minute/-day request rate exceeded.
    RateLimitExceeded,
    /// Account-level quota or billing hard limit.
    InsufficientQuota,
    /// Model not found or not available.
    ModelNotFound,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAiErrorCode {
    /// Classify from HTTP status plus the error body's `code`/`type`.
    ///
    /// OpenAI reports account exhaustion as a 429 with code
    /// `insufficient_quota`, distinct from a transient rate limit.
    pub fn from_response(status: u16, code: &str) -> Self {
        match (status, code) {
            (401, _) => Self::AuthenticationError,
            (429, "insufficient_quota") | (_, "billing_hard_limit_reached") => {
                Self::InsufficientQuota
            }
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Map a classified failure to the pipeline error type.
pub fn to_pipeline_error(
    code: OpenAiErrorCode,
    message: &str,
    retry_after: Option<Duration>,
) -> Error {
    let provider = "openai".to_string();
    match code {
        OpenAiErrorCode::AuthenticationError => {
            Error::Config(format!("OpenAI authentication failed: {}", message))
        }
        OpenAiErrorCode::RateLimitExceeded => Error::RateLimited {
            provider,
            message: message.to_string(),
            retry_after,
        },
        OpenAiErrorCode::InsufficientQuota => Error::ProviderQuota {
            provider,
            message: message.to_string(),
        },
        OpenAiErrorCode::ModelNotFound => {
            Error::Config(format!("OpenAI model not found: {}", message))
        }
        OpenAiErrorCode::ServerError | OpenAiErrorCode::Unknown => Error::Provider {
            provider,
            message: message.to_string(),
        },
    }
}
