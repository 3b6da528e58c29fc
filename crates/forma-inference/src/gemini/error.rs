//! Gemini-specific error classification.

use std::time::Duration;

use forma_core::Error;

use super::types::ApiError;

/// Gemini error classes relevant to routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiErrorCode {
    /// Invalid or missing API key.
    AuthenticationError,
    /// Per-minute request rate exceeded.
    RateLimitExceeded,
    /// Daily/project quota or billing exhaustion.
    QuotaExhausted,
    /// Model or resource not found.
    NotFound,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl GeminiErrorCode {
    /// Classify from HTTP status plus the body's `status` and message.
    ///
    /// Gemini reports both transient rate limits and account quota
    /// exhaustion as 429 `RESOURCE_EXHAUSTED`; the message text
    /// distinguishes them ("quota"/"billing" mentions mean exhaustion).
    pub fn from_response(status: u16, api_status: &str, message: &str) -> Self {
        let lower = message.to_lowercase();
        match (status, api_status) {
            (401 | 403, _) | (_, "UNAUTHENTICATED") | (_, "PERMISSION_DENIED") => {
                Self::AuthenticationError
            }
            (429, _) | (_, "RESOURCE_EXHAUSTED") => {
                if lower.contains("quota") || lower.contains("billing") {
                    Self::QuotaExhausted
                } else {
                    Self::RateLimitExceeded
                }
            }
            (404, _) | (_, "NOT_FOUND") => Self::NotFound,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Extract a `RetryInfo` delay like `"14s"` or `"0.5s"` from error details.
pub fn retry_delay_from_details(error: &ApiError) -> Option<Duration> {
    for detail in &error.details {
        let is_retry_info = detail["@type"]
            .as_str()
            .is_some_and(|t| t.ends_with("RetryInfo"));
        if !is_retry_info {
            continue;
        }
        if let Some(delay) = detail["retryDelay"].as_str() {
            if let Ok(secs) = delay.trim_end_matches('s').parse::<f64>() {
                return Some(Duration::from_secs_f64(secs.max(0.0)));
            }
        }
    }
    None
}

/// Map a classified failure to the pipeline error type.
pub fn to_pipeline_error(
    code: GeminiErrorCode,
    message: &str,
    retry_after: Option<Duration>,
) -> Error {
    let provider = "gemini".to_string();
    match code {
        GeminiErrorCode::AuthenticationError => {
            Error::Config(format!("Gemini authentication failed: {}", message))
        }
        GeminiErrorCode::RateLimitExceeded => Error::RateLimited {
            provider,
            message: message.to_string(),
            retry_after,
        },
        GeminiErrorCode::QuotaExhausted => Error::ProviderQuota {
            provider,
            message: message.to_string(),
        },
        GeminiErrorCode::NotFound => Error::Config(format!("Gemini model not found: {}", message)),
        GeminiErrorCode::ServerError | GeminiErrorCode::Unknown => Error::Provider {
            provider,
            message: message.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_exhausted_without_quota_is_rate_limit() {
        let code = GeminiErrorCode::from_response(
            429,
            "RESOURCE_EXHAUSTED",
            "Requests per minute exceeded",
        );
        assert_eq!(code, GeminiErrorCode::RateLimitExceeded);
    }

    #[test]
    fn resource_exhausted_with_quota_is_exhaustion() {
        let code = GeminiErrorCode::from_response(
            429,
            "RESOURCE_EXHAUSTED",
            "Quota exceeded for quota metric 'Generate Content API requests'",
        );
        assert_eq!(code, GeminiErrorCode::QuotaExhausted);

        let err = to_pipeline_error(code, "Quota exceeded", None);
        assert!(err.is_provider_quota());
    }

    #[test]
    fn classifies_permission_denied_as_auth() {
        let code = GeminiErrorCode::from_response(403, "PERMISSION_DENIED", "API key invalid");
        assert_eq!(code, GeminiErrorCode::AuthenticationError);
    }

    #[test]
    fn classifies_5xx_as_server_error() {
        let code = GeminiErrorCode::from_response(500, "INTERNAL", "internal error");
        assert_eq!(code, GeminiErrorCode::ServerError);
    }

    #[test]
    fn retry_delay_parsed_from_retry_info() {
        let error: ApiError = serde_json::from_value(serde_json::json!({
            "code": 429,
            "message": "slow down",
            "status": "RESOURCE_EXHAUSTED",
            "details": [
                {"@type": "type.googleapis.com/google.rpc.Help"},
                {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "14s"}
            ]
        }))
        .unwrap();
        assert_eq!(
            retry_delay_from_details(&error),
            Some(Duration::from_secs(14))
        );
    }

    #[test]
    fn retry_delay_handles_fractional_seconds() {
        let error: ApiError = serde_json::from_value(serde_json::json!({
            "code": 429,
            "message": "slow down",
            "status": "RESOURCE_EXHAUSTED",
            "details": [
                {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "0.5s"}
            ]
        }))
        .unwrap();
        assert_eq!(
            retry_delay_from_details(&error),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn retry_delay_absent_when_no_retry_info() {
        let error: ApiError = serde_json::from_value(serde_json::json!({
            "code": 500,
            "message": "oops",
            "status": "INTERNAL"
        }))
        .unwrap();
        assert_eq!(retry_delay_from_details(&error), None);
    }
}
