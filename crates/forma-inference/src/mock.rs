//! Scriptable mock provider for deterministic tests.
//!
//! A script of per-call outcomes is consumed front-to-back; when the script
//! is empty the provider falls back to a repeated failure or a default
//! response. Every call is logged for assertion.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use forma_core::{Error, ImageRef, Result};

use crate::providers::{GenerationProvider, GenerationRequest};

/// Failure classes the mock can produce.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Too-many-requests signal, optionally with a provider-advised wait.
    RateLimited { retry_after_ms: Option<u64> },
    /// Transient failure (network blip, 5xx).
    Transient(String),
    /// Account-level quota/billing exhaustion.
    ProviderQuota(String),
    /// Provider-reported malformed output.
    Malformed(String),
}

impl MockFailure {
    fn to_error(&self, provider: &str) -> Error {
        match self {
            MockFailure::RateLimited { retry_after_ms } => Error::RateLimited {
                provider: provider.to_string(),
                message: "429 Too Many Requests".to_string(),
                retry_after: retry_after_ms.map(Duration::from_millis),
            },
            MockFailure::Transient(message) => Error::Provider {
                provider: provider.to_string(),
                message: message.clone(),
            },
            MockFailure::ProviderQuota(message) => Error::ProviderQuota {
                provider: provider.to_string(),
                message: message.clone(),
            },
            MockFailure::Malformed(message) => Error::InvalidResponse(message.clone()),
        }
    }
}

/// One logged provider call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub category: String,
}

/// Deterministic scripted provider.
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<std::result::Result<JsonValue, MockFailure>>>,
    repeat_failure: Option<MockFailure>,
    default_response: Option<JsonValue>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            repeat_failure: None,
            default_response: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Default response returned when the script is exhausted.
    pub fn with_response(mut self, response: JsonValue) -> Self {
        self.default_response = Some(response);
        self
    }

    /// Fail every unscripted call with this failure.
    pub fn always_fail(mut self, failure: MockFailure) -> Self {
        self.repeat_failure = Some(failure);
        self
    }

    /// Append a scripted success.
    pub fn push_success(self, response: JsonValue) -> Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Append a scripted failure.
    pub fn push_failure(self, failure: MockFailure) -> Self {
        self.script.lock().unwrap().push_back(Err(failure));
        self
    }

    /// Total calls received (text + vision).
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls received for one operation kind.
    pub fn calls_for(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn next_outcome(&self, operation: &str, request: &GenerationRequest) -> Result<JsonValue> {
        self.calls.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            category: request.category.as_str().to_string(),
        });

        if let Some(step) = self.script.lock().unwrap().pop_front() {
            return step.map_err(|f| f.to_error(&self.name));
        }
        if let Some(failure) = &self.repeat_failure {
            return Err(failure.to_error(&self.name));
        }
        if let Some(response) = &self.default_response {
            return Ok(response.clone());
        }
        Err(Error::Internal(format!(
            "MockProvider '{}' has no scripted outcome",
            self.name
        )))
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<JsonValue> {
        self.next_outcome("generate_text", request)
    }

    async fn generate_vision(
        &self,
        request: &GenerationRequest,
        _image: &ImageRef,
    ) -> Result<JsonValue> {
        self.next_outcome("generate_vision", request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forma_core::Category;
    use serde_json::json;

    fn request() -> GenerationRequest {
        GenerationRequest::new(Category::Workout, "plan please")
    }

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let provider = MockProvider::new("mock")
            .push_failure(MockFailure::Transient("boom".to_string()))
            .push_success(json!({"ok": true}));

        assert!(provider.generate_text(&request()).await.is_err());
        let value = provider.generate_text(&request()).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn default_response_after_script() {
        let provider = MockProvider::new("mock")
            .with_response(json!({"default": true}))
            .push_success(json!({"scripted": true}));

        assert_eq!(
            provider.generate_text(&request()).await.unwrap(),
            json!({"scripted": true})
        );
        assert_eq!(
            provider.generate_text(&request()).await.unwrap(),
            json!({"default": true})
        );
    }

    #[tokio::test]
    async fn repeat_failure_maps_to_typed_error() {
        let provider = MockProvider::new("mock")
            .always_fail(MockFailure::ProviderQuota("billing hard limit".to_string()));

        let err = provider.generate_text(&request()).await.unwrap_err();
        assert!(err.is_provider_quota());
    }

    #[tokio::test]
    async fn unscripted_call_is_an_internal_error() {
        let provider = MockProvider::new("mock");
        let err = provider.generate_text(&request()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn vision_calls_are_logged_separately() {
        let provider = MockProvider::new("mock").with_response(json!({}));
        let image = ImageRef::from_bytes("image/png", b"img");

        let _ = provider.generate_text(&request()).await;
        let _ = provider.generate_vision(&request(), &image).await;

        assert_eq!(provider.calls_for("generate_text"), 1);
        assert_eq!(provider.calls_for("generate_vision"), 1);
    }
}
