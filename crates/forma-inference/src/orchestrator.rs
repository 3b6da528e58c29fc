//! Generation orchestrator: provider selection and one-shot failover.
//!
//! The orchestrator owns a closed set of two gateways and an explicit
//! default-provider field. When the active provider fails with an
//! account-level quota/billing error, the alternate provider is invoked
//! exactly once for this call; the default is never mutated, so concurrent
//! callers can never observe a stuck-in-fallback state and
//! [`Orchestrator::current_provider`] reflects the configured default after
//! every call, whether or not fallback was used.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use forma_core::{Artifact, EventBus, ImageRef, PipelineEvent, Result};

use crate::gateway::ProviderGateway;
use crate::providers::{GenerationRequest, ProviderId};

/// Outcome classification for one provider invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// Ephemeral record of one provider invocation within a single orchestrator
/// call. Never persisted; exists for logging and caller diagnostics only.
#[derive(Debug, Clone)]
pub struct ProviderAttemptRecord {
    pub provider: ProviderId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// Result of one logical generation request.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub artifact: Artifact,
    /// Provider that produced the artifact (or whose fallback template was
    /// used).
    pub provider: ProviderId,
    /// True when the artifact is a template fallback, not a provider
    /// response.
    pub degraded: bool,
    pub attempts: Vec<ProviderAttemptRecord>,
}

/// Orchestrates generation across the two configured providers.
pub struct Orchestrator {
    default_provider: ProviderId,
    openai: ProviderGateway,
    gemini: ProviderGateway,
    events: EventBus,
}

impl Orchestrator {
    pub fn new(
        default_provider: ProviderId,
        openai: ProviderGateway,
        gemini: ProviderGateway,
        events: EventBus,
    ) -> Self {
        Self {
            default_provider,
            openai,
            gemini,
            events,
        }
    }

    /// The configured default provider. Reflects the same value before,
    /// during, and after any call; fallback is per-call, never sticky.
    pub fn current_provider(&self) -> ProviderId {
        self.default_provider
    }

    fn gateway(&self, id: ProviderId) -> &ProviderGateway {
        match id {
            ProviderId::OpenAi => &self.openai,
            ProviderId::Gemini => &self.gemini,
        }
    }

    /// Run one logical generation request with one-shot failover.
    #[instrument(skip(self, request, image), fields(category = %request.category, provider = %self.default_provider))]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        image: Option<&ImageRef>,
    ) -> Result<GenerationOutcome> {
        let primary = self.default_provider;
        let mut attempts = Vec::new();

        let started_at = Utc::now();
        match self.gateway(primary).generate(request, image).await {
            Ok(outcome) => {
                attempts.push(ProviderAttemptRecord {
                    provider: primary,
                    attempt_number: 1,
                    started_at,
                    outcome: AttemptOutcome::Success,
                });
                Ok(GenerationOutcome {
                    artifact: outcome.artifact,
                    provider: primary,
                    degraded: outcome.degraded,
                    attempts,
                })
            }
            Err(primary_err) if primary_err.is_provider_quota() => {
                attempts.push(ProviderAttemptRecord {
                    provider: primary,
                    attempt_number: 1,
                    started_at,
                    outcome: AttemptOutcome::FatalFailure,
                });

                let alternate = primary.alternate();
                warn!(
                    from = %primary,
                    to = %alternate,
                    error = %primary_err,
                    "Provider quota exhausted, switching to alternate for this call"
                );
                self.events.emit(PipelineEvent::ProviderFallback {
                    from: primary.as_str().to_string(),
                    to: alternate.as_str().to_string(),
                });

                let fallback_started = Utc::now();
                match self.gateway(alternate).generate(request, image).await {
                    Ok(outcome) => {
                        attempts.push(ProviderAttemptRecord {
                            provider: alternate,
                            attempt_number: 2,
                            started_at: fallback_started,
                            outcome: AttemptOutcome::Success,
                        });
                        info!(provider = %alternate, "Alternate provider succeeded");
                        Ok(GenerationOutcome {
                            artifact: outcome.artifact,
                            provider: alternate,
                            degraded: outcome.degraded,
                            attempts,
                        })
                    }
                    // No third provider: the fallback's own error propagates.
                    Err(alternate_err) => {
                        attempts.push(ProviderAttemptRecord {
                            provider: alternate,
                            attempt_number: 2,
                            started_at: fallback_started,
                            outcome: AttemptOutcome::FatalFailure,
                        });
                        warn!(
                            provider = %alternate,
                            error = %alternate_err,
                            "Alternate provider also failed"
                        );
                        Err(alternate_err)
                    }
                }
            }
            Err(e) => {
                attempts.push(ProviderAttemptRecord {
                    provider: primary,
                    attempt_number: 1,
                    started_at,
                    outcome: if e.is_transient() {
                        AttemptOutcome::RetryableFailure
                    } else {
                        AttemptOutcome::FatalFailure
                    },
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use forma_core::{Category, Error};

    use crate::mock::{MockFailure, MockProvider};
    use crate::retry::RetryPolicy;

    fn fast_gateway(provider: Arc<MockProvider>) -> ProviderGateway {
        ProviderGateway::new(
            provider,
            RetryPolicy::rate_limit_aware(
                2,
                Duration::from_millis(1),
                Duration::from_millis(5),
                2.0,
            ),
        )
    }

    fn valid_workout_json() -> serde_json::Value {
        json!({
            "title": "Plan",
            "days": [{
                "name": "Day 1",
                "exercises": [{"name": "Squat", "sets": 3, "reps": "5", "rest_seconds": 180}]
            }]
        })
    }

    fn orchestrator_with(
        openai: Arc<MockProvider>,
        gemini: Arc<MockProvider>,
    ) -> Orchestrator {
        Orchestrator::new(
            ProviderId::OpenAi,
            fast_gateway(openai),
            fast_gateway(gemini),
            EventBus::new(32),
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(Category::Workout, "plan")
    }

    #[tokio::test]
    async fn primary_success_uses_no_fallback() {
        let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
        let gemini = Arc::new(MockProvider::new("gemini"));
        let orch = orchestrator_with(openai, gemini.clone());

        let outcome = orch.generate(&request(), None).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::OpenAi);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(gemini.call_count(), 0);
        assert_eq!(orch.current_provider(), ProviderId::OpenAi);
    }

    #[tokio::test]
    async fn quota_error_fails_over_and_default_is_restored() {
        // Scenario: provider A default, A returns quota-exceeded, B succeeds.
        let openai = Arc::new(
            MockProvider::new("openai")
                .always_fail(MockFailure::ProviderQuota("quota exceeded".to_string())),
        );
        let gemini = Arc::new(MockProvider::new("gemini").with_response(valid_workout_json()));
        let orch = orchestrator_with(openai, gemini);

        let outcome = orch.generate(&request(), None).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::Gemini);
        assert!(!outcome.degraded);
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::FatalFailure);
        assert_eq!(outcome.attempts[1].outcome, AttemptOutcome::Success);

        // Default remains the original for subsequent requests.
        assert_eq!(orch.current_provider(), ProviderId::OpenAi);
    }

    #[tokio::test]
    async fn fallback_failure_propagates_alternates_error() {
        let openai = Arc::new(
            MockProvider::new("openai")
                .always_fail(MockFailure::ProviderQuota("billing".to_string())),
        );
        let gemini = Arc::new(
            MockProvider::new("gemini")
                .always_fail(MockFailure::Transient("HTTP 500".to_string())),
        );
        let orch = orchestrator_with(openai.clone(), gemini.clone());

        let err = orch.generate(&request(), None).await.unwrap_err();
        // The alternate's error, not the primary's quota error.
        assert!(matches!(err, Error::Provider { .. }));
        assert_eq!(openai.call_count(), 1);
        assert_eq!(gemini.call_count(), 1);
        // Default restored regardless of fallback failure.
        assert_eq!(orch.current_provider(), ProviderId::OpenAi);
    }

    #[tokio::test]
    async fn non_quota_errors_propagate_without_fallback() {
        let openai = Arc::new(
            MockProvider::new("openai")
                .always_fail(MockFailure::Transient("HTTP 502".to_string())),
        );
        let gemini = Arc::new(MockProvider::new("gemini").with_response(valid_workout_json()));
        let orch = orchestrator_with(openai, gemini.clone());

        let err = orch.generate(&request(), None).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_emits_provider_event() {
        let openai = Arc::new(
            MockProvider::new("openai")
                .always_fail(MockFailure::ProviderQuota("quota exceeded".to_string())),
        );
        let gemini = Arc::new(MockProvider::new("gemini").with_response(valid_workout_json()));
        let events = EventBus::new(32);
        let mut rx = events.subscribe();
        let orch = Orchestrator::new(
            ProviderId::OpenAi,
            fast_gateway(openai),
            fast_gateway(gemini),
            events,
        );

        orch.generate(&request(), None).await.unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "provider.fallback");
    }

    #[tokio::test]
    async fn gemini_default_falls_back_to_openai() {
        let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
        let gemini = Arc::new(
            MockProvider::new("gemini")
                .always_fail(MockFailure::ProviderQuota("quota exceeded".to_string())),
        );
        let orch = Orchestrator::new(
            ProviderId::Gemini,
            fast_gateway(openai),
            fast_gateway(gemini),
            EventBus::new(32),
        );

        let outcome = orch.generate(&request(), None).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::OpenAi);
        assert_eq!(orch.current_provider(), ProviderId::Gemini);
    }
}
