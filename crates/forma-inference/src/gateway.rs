//! Provider gateway: one provider wrapped with the rate-limit-aware backoff
//! policy and per-category schema validation.
//!
//! Error disposition at this boundary:
//! - too-many-requests failures are retried here, with the provider-advised
//!   wait when present;
//! - other failures (transient 5xx, provider quota/billing, config) pass
//!   through to the orchestrator and queue, which own those classes;
//! - on retry exhaustion or a structurally invalid response, plan categories
//!   degrade to the deterministic template artifact; vision categories
//!   propagate, since no safe fallback exists for extracted measurements.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use forma_core::{Artifact, Error, ImageRef, Result};

use crate::fallback::fallback_artifact;
use crate::providers::{GenerationProvider, GenerationRequest};
use crate::retry::{run_with_retry, Attempt, RetryPolicy};
use crate::schema::validate_artifact;

/// Result of one gateway operation.
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    pub artifact: Artifact,
    /// True when the artifact is the template fallback rather than a
    /// provider response.
    pub degraded: bool,
}

/// A concrete AI backend wrapped with retry and validation.
pub struct ProviderGateway {
    provider: Arc<dyn GenerationProvider>,
    policy: RetryPolicy,
}

impl ProviderGateway {
    pub fn new(provider: Arc<dyn GenerationProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Wrap a provider with the default rate-limit-aware policy
    /// (5 attempts, 20 s base, 120 s cap, multiplier 2).
    pub fn with_defaults(provider: Arc<dyn GenerationProvider>) -> Self {
        Self::new(provider, RetryPolicy::gateway_default())
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one generation operation: provider call under retry, schema
    /// validation, and fallback degrade where the category allows it.
    #[instrument(skip(self, request, image), fields(provider = self.provider.name(), category = %request.category))]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        image: Option<&ImageRef>,
    ) -> Result<GatewayOutcome> {
        let category = request.category;
        if category.is_vision() && image.is_none() {
            return Err(Error::InvalidInput(format!(
                "category '{}' requires an image",
                category
            )));
        }

        let attempt_result = run_with_retry(&self.policy, "provider_generate", |_attempt| {
            let provider = self.provider.clone();
            async move {
                let call = match image {
                    Some(image) => provider.generate_vision(request, image).await,
                    None => provider.generate_text(request).await,
                };
                match call {
                    Ok(value) => match validate_artifact(category, value) {
                        Ok(artifact) => Attempt::Success(artifact),
                        // Not retried here: a malformed body will not improve
                        // on an immediate identical request.
                        Err(e) => Attempt::Fatal(e),
                    },
                    Err(e) if e.is_rate_limit() => Attempt::Retryable(e),
                    Err(e) => Attempt::Fatal(e),
                }
            }
        })
        .await;

        match attempt_result {
            Ok(artifact) => {
                debug!("Provider response validated");
                Ok(GatewayOutcome {
                    artifact,
                    degraded: false,
                })
            }
            Err(e) if degradable(&e) => match fallback_artifact(category) {
                Some(artifact) => {
                    warn!(error = %e, "Degrading to template artifact");
                    Ok(GatewayOutcome {
                        artifact,
                        degraded: true,
                    })
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

/// Failure classes that may degrade to the template artifact: exhausted
/// rate-limit retries and structurally invalid responses. Provider
/// quota/billing errors never degrade; the orchestrator needs them to drive
/// the alternate-provider fallback.
fn degradable(error: &Error) -> bool {
    matches!(error, Error::InvalidResponse(_)) || error.is_rate_limit()
}
