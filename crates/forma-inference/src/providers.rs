//! Provider capability interface and the closed provider set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use forma_core::{Category, ImageRef, Result};

/// Closed set of configured AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Gemini,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Gemini => "gemini",
        }
    }

    /// The other configured provider, selected deterministically for the
    /// one-shot fallback pass.
    pub fn alternate(&self) -> ProviderId {
        match self {
            ProviderId::OpenAi => ProviderId::Gemini,
            ProviderId::Gemini => ProviderId::OpenAi,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = forma_core::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "gemini" => Ok(ProviderId::Gemini),
            other => Err(forma_core::Error::Config(format!(
                "Unknown provider: {}",
                other
            ))),
        }
    }
}

/// One logical generation operation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub category: Category,
    /// Fully rendered user prompt.
    pub prompt: String,
    /// Optional system/instruction preamble.
    pub system: Option<String>,
}

impl GenerationRequest {
    pub fn new(category: Category, prompt: impl Into<String>) -> Self {
        Self {
            category,
            prompt: prompt.into(),
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Uniform capability set implemented by each concrete AI backend.
///
/// Implementations return the provider's raw JSON payload; structural
/// validation against the category schema happens in the gateway, not here.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider identifier for logging and attempt records.
    fn name(&self) -> &str;

    /// Text generation returning a JSON document.
    async fn generate_text(&self, request: &GenerationRequest) -> Result<JsonValue>;

    /// Vision generation over an image, returning a JSON document.
    async fn generate_vision(
        &self,
        request: &GenerationRequest,
        image: &ImageRef,
    ) -> Result<JsonValue>;
}
