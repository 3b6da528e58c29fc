//! Environment-sourced configuration for providers and retry tuning.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use forma_core::{defaults, EventBus, Result};

use crate::gateway::ProviderGateway;
use crate::gemini::{GeminiBackend, GeminiConfig};
use crate::openai::{OpenAiBackend, OpenAiConfig};
use crate::orchestrator::Orchestrator;
use crate::providers::ProviderId;
use crate::retry::RetryPolicy;

/// Tuning knobs for the gateway retry policy.
#[derive(Debug, Clone)]
pub struct RetryTuning {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryTuning {
    fn default() -> Self {
        Self {
            max_attempts: defaults::GATEWAY_MAX_ATTEMPTS,
            base_delay: defaults::GATEWAY_BASE_DELAY,
            max_delay: defaults::GATEWAY_MAX_DELAY,
            multiplier: defaults::GATEWAY_MULTIPLIER,
        }
    }
}

impl RetryTuning {
    /// Load tuning from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `GATEWAY_MAX_ATTEMPTS` | `5` | Attempts per gateway operation |
    /// | `GATEWAY_BASE_DELAY_SECS` | `20` | First retry delay |
    /// | `GATEWAY_MAX_DELAY_SECS` | `120` | Delay ceiling |
    /// | `GATEWAY_MULTIPLIER` | `2.0` | Exponential multiplier |
    pub fn from_env() -> Self {
        let mut tuning = Self::default();

        if let Ok(val) = std::env::var("GATEWAY_MAX_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if n >= 1 => tuning.max_attempts = n,
                _ => warn!(value = %val, "Invalid GATEWAY_MAX_ATTEMPTS, using default"),
            }
        }
        if let Ok(val) = std::env::var("GATEWAY_BASE_DELAY_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                tuning.base_delay = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("GATEWAY_MAX_DELAY_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                tuning.max_delay = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("GATEWAY_MULTIPLIER") {
            match val.parse::<f64>() {
                Ok(m) if m >= 1.0 => tuning.multiplier = m,
                _ => warn!(value = %val, "Invalid GATEWAY_MULTIPLIER, using default"),
            }
        }

        tuning
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::rate_limit_aware(
            self.max_attempts,
            self.base_delay,
            self.max_delay,
            self.multiplier,
        )
    }
}

/// Full inference configuration: default provider selection, per-provider
/// credentials, retry tuning.
#[derive(Debug, Clone, Default)]
pub struct InferenceConfig {
    pub default_provider: DefaultProvider,
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub retry: RetryTuning,
}

/// Wrapper so `InferenceConfig` can derive `Default` with OpenAI active.
#[derive(Debug, Clone, Copy)]
pub struct DefaultProvider(pub ProviderId);

impl Default for DefaultProvider {
    fn default() -> Self {
        Self(ProviderId::OpenAi)
    }
}

impl InferenceConfig {
    /// Load the full configuration from environment variables.
    ///
    /// `FORMA_DEFAULT_PROVIDER` selects the active default (`openai` or
    /// `gemini`); provider credentials come from `OPENAI_*`/`GEMINI_*`.
    pub fn from_env() -> Self {
        let default_provider = std::env::var("FORMA_DEFAULT_PROVIDER")
            .ok()
            .and_then(|v| match v.parse::<ProviderId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(value = %v, "Invalid FORMA_DEFAULT_PROVIDER, using openai");
                    None
                }
            })
            .unwrap_or(ProviderId::OpenAi);

        Self {
            default_provider: DefaultProvider(default_provider),
            openai: OpenAiConfig::from_env(),
            gemini: GeminiConfig::from_env(),
            retry: RetryTuning::from_env(),
        }
    }

    /// Build the orchestrator: both backends wrapped in gateways sharing the
    /// configured retry tuning.
    pub fn build_orchestrator(&self, events: EventBus) -> Result<Orchestrator> {
        let openai = Arc::new(OpenAiBackend::new(self.openai.clone())?);
        let gemini = Arc::new(GeminiBackend::new(self.gemini.clone())?);

        info!(
            default_provider = %self.default_provider.0,
            max_attempts = self.retry.max_attempts,
            "Building generation orchestrator"
        );

        Ok(Orchestrator::new(
            self.default_provider.0,
            ProviderGateway::new(openai, self.retry.policy()),
            ProviderGateway::new(gemini, self.retry.policy()),
            events,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_tuning_defaults_match_gateway_contract() {
        let tuning = RetryTuning::default();
        assert_eq!(tuning.max_attempts, 5);
        assert_eq!(tuning.base_delay, Duration::from_secs(20));
        assert_eq!(tuning.max_delay, Duration::from_secs(120));
        assert_eq!(tuning.multiplier, 2.0);
    }

    #[test]
    fn default_provider_is_openai() {
        let config = InferenceConfig::default();
        assert_eq!(config.default_provider.0, ProviderId::OpenAi);
    }

    #[test]
    fn build_orchestrator_uses_configured_default() {
        let config = InferenceConfig {
            default_provider: DefaultProvider(ProviderId::Gemini),
            ..Default::default()
        };
        let orch = config.build_orchestrator(EventBus::new(32)).unwrap();
        assert_eq!(orch.current_provider(), ProviderId::Gemini);
    }
}
