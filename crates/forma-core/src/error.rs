//! Error types for the forma generation pipeline.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using forma's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient provider failure (network blip, generic 5xx).
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// Provider rejected the request with a too-many-requests signal.
    #[error("Rate limited by {provider}: {message}")]
    RateLimited {
        provider: String,
        message: String,
        /// Provider-advised wait before the next attempt, when present.
        retry_after: Option<Duration>,
    },

    /// Provider-side quota or billing exhaustion (account-level, not ours).
    #[error("Provider quota exhausted ({provider}): {message}")]
    ProviderQuota { provider: String, message: String },

    /// Response failed structural validation against the category schema.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// User has no remaining quota for this category.
    #[error("Generation quota exceeded for category '{category}'")]
    QuotaExceeded { category: String },

    /// Job not found in the queue.
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// User record not found.
    #[error("User not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// Job queue error.
    #[error("Job error: {0}")]
    Job(String),

    /// Notification delivery failed.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed.
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error carries a recognized too-many-requests signal.
    ///
    /// Recognized signals: the typed [`Error::RateLimited`] variant, a 429
    /// status embedded in a provider/request message, or an equivalent
    /// transport-layer marker.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Provider { message, .. } | Error::Request(message) => {
                let lower = message.to_lowercase();
                lower.contains("429")
                    || lower.contains("too many requests")
                    || lower.contains("rate limit")
            }
            _ => false,
        }
    }

    /// True when the error indicates account-level quota/billing exhaustion
    /// at the provider, which triggers the one-shot alternate-provider
    /// fallback at the orchestrator level.
    pub fn is_provider_quota(&self) -> bool {
        match self {
            Error::ProviderQuota { .. } => true,
            Error::Provider { message, .. } | Error::Request(message) => {
                let lower = message.to_lowercase();
                lower.contains("quota exceeded")
                    || lower.contains("insufficient_quota")
                    || lower.contains("billing")
            }
            _ => false,
        }
    }

    /// Provider-advised wait extracted from error metadata, when present.
    pub fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// True for failure classes the Backoff Policy may retry at all.
    ///
    /// Fatal classes (config, validation, not-found, user quota) are never
    /// retried regardless of remaining attempts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Provider { .. } | Error::RateLimited { .. } | Error::Request(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
