//! Gemini provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use forma_core::{defaults, Error, ImageRef, Result};

use super::error::{retry_delay_from_details, to_pipeline_error, GeminiErrorCode};
use super::types::*;
use crate::providers::{GenerationProvider, GenerationRequest};

/// Configuration for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key, passed as the `key` query parameter.
    pub api_key: Option<String>,
    /// Model used for both text and vision requests.
    pub model: String,
    /// Request timeout in seconds (hard upper bound per provider call).
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GEMINI_URL.to_string(),
            api_key: None,
            model: defaults::GEMINI_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| defaults::GEMINI_URL.to_string()),
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| defaults::GEMINI_MODEL.to_string()),
            timeout_seconds: std::env::var("GEMINI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
        }
    }
}

/// Gemini backend speaking the generateContent API.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Initializing Gemini backend"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn generate_content(&self, parts: Vec<Part>, system: Option<&str>) -> Result<JsonValue> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: system.map(Content::system),
            generation_config: GenerationConfig::json(),
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.query(&[("key", api_key)]);
        }

        let response = builder.send().await.map_err(|e| Error::Provider {
            provider: "gemini".to_string(),
            message: format!("Request failed: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorResponse = response.json().await.unwrap_or(ApiErrorResponse {
                error: ApiError {
                    code: status.as_u16(),
                    message: format!("HTTP {}", status),
                    status: String::new(),
                    details: Vec::new(),
                },
            });
            let code = GeminiErrorCode::from_response(
                status.as_u16(),
                &body.error.status,
                &body.error.message,
            );
            let retry_after = retry_delay_from_details(&body.error);
            return Err(to_pipeline_error(code, &body.error.message, retry_after));
        }

        let result: GenerateContentResponse =
            response.json().await.map_err(|e| Error::Provider {
                provider: "gemini".to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        let candidate = result
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("gemini: no candidates".to_string()))?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" {
                return Err(Error::InvalidResponse(format!(
                    "gemini: candidate ended with finishReason={}",
                    reason
                )));
            }
        }

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| Error::InvalidResponse("gemini: no text part".to_string()))?;

        debug!(response_len = text.len(), "Gemini completion received");

        serde_json::from_str(&text)
            .map_err(|e| Error::InvalidResponse(format!("gemini: content is not JSON: {}", e)))
    }
}

#[async_trait]
impl GenerationProvider for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<JsonValue> {
        self.generate_content(
            vec![Part::text(request.prompt.clone())],
            request.system.as_deref(),
        )
        .await
    }

    async fn generate_vision(
        &self,
        request: &GenerationRequest,
        image: &ImageRef,
    ) -> Result<JsonValue> {
        let image_part = match image {
            ImageRef::Inline { media_type, data } => {
                Part::inline_image(media_type.clone(), data.clone())
            }
            ImageRef::Url { url } => Part::image_uri(url.clone()),
        };

        self.generate_content(
            vec![Part::text(request.prompt.clone()), image_part],
            request.system.as_deref(),
        )
        .await
    }
}
