//! OpenAI-compatible provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use forma_core::{defaults, Error, ImageRef, Result};

use super::error::{to_pipeline_error, OpenAiErrorCode};
use super::types::*;
use crate::providers::{GenerationProvider, GenerationRequest};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local-compatible endpoints).
    pub api_key: Option<String>,
    /// Model used for text generation.
    pub gen_model: String,
    /// Model used for vision requests.
    pub vision_model: String,
    /// Request timeout in seconds (hard upper bound per provider call).
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            gen_model: defaults::OPENAI_GEN_MODEL.to_string(),
            vision_model: defaults::OPENAI_VISION_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl OpenAiConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| defaults::OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            gen_model: std::env::var("OPENAI_GEN_MODEL")
                .unwrap_or_else(|_| defaults::OPENAI_GEN_MODEL.to_string()),
            vision_model: std::env::var("OPENAI_VISION_MODEL")
                .unwrap_or_else(|_| defaults::OPENAI_VISION_MODEL.to_string()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
        }
    }
}

/// OpenAI-compatible backend speaking the chat completions API.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            gen_model = %config.gen_model,
            vision_model = %config.vision_model,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Build an authenticated POST request.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<JsonValue> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: None,
            max_tokens: None,
            response_format: Some(ResponseFormat::json_object()),
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider {
                provider: "openai".to_string(),
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body: ApiErrorResponse = response.json().await.unwrap_or(ApiErrorResponse {
                error: ApiError {
                    message: format!("HTTP {}", status),
                    error_type: "unknown".to_string(),
                    code: None,
                },
            });
            let code = OpenAiErrorCode::from_response(
                status.as_u16(),
                body.error.code.as_deref().unwrap_or(&body.error.error_type),
            );
            return Err(to_pipeline_error(code, &body.error.message, retry_after));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| Error::Provider {
            provider: "openai".to_string(),
            message: format!("Failed to parse response: {}", e),
        })?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("openai: empty choices".to_string()))?;

        // The provider itself reporting a truncated or filtered completion
        // means the body cannot be trusted as a complete document.
        if let Some(reason) = choice.finish_reason.as_deref() {
            if reason == "length" || reason == "content_filter" {
                return Err(Error::InvalidResponse(format!(
                    "openai: completion ended with finish_reason={}",
                    reason
                )));
            }
        }

        let content = choice
            .message
            .content
            .ok_or_else(|| Error::InvalidResponse("openai: missing message content".to_string()))?;

        debug!(response_len = content.len(), "OpenAI completion received");

        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidResponse(format!("openai: content is not JSON: {}", e)))
    }
}

/// Read a `Retry-After` header (seconds) or `retry-after-ms` (milliseconds).
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    if let Some(ms) = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Some(Duration::from_millis(ms));
    }
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl GenerationProvider for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<JsonValue> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));

        self.chat(&self.config.gen_model, messages).await
    }

    async fn generate_vision(
        &self,
        request: &GenerationRequest,
        image: &ImageRef,
    ) -> Result<JsonValue> {
        let url = match image {
            ImageRef::Url { url } => url.clone(),
            ImageRef::Inline { media_type, data } => {
                format!("data:{};base64,{}", media_type, data)
            }
        };

        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user_with_image(request.prompt.clone(), url));

        self.chat(&self.config.vision_model, messages).await
    }
}
