//! Generation job handler: the worker-side glue for one generation attempt.
//!
//! Charges the quota ledger optimistically when the first attempt is
//! dispatched, invokes the orchestrator, persists the artifact through the
//! domain store, and reports coarse progress milestones. On the terminal
//! transition (success, or failure with no attempts left) it reconciles the
//! quota and dispatches exactly one notification.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use forma_core::{ArtifactStore, Category, Error, ImageRef, Result};
use forma_inference::{GenerationRequest, Orchestrator};
use forma_notify::NotificationDispatcher;
use forma_quota::QuotaLedger;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Progress milestones reported to status readers. Coarse on purpose:
/// consumers tolerate missed intermediates.
mod milestone {
    pub const STARTED: i32 = 10;
    pub const PROVIDER_INVOKED: i32 = 40;
    pub const PERSISTING: i32 = 80;
}

/// Handler executing generation jobs for every category.
pub struct GenerationHandler {
    orchestrator: Arc<Orchestrator>,
    quota: Arc<QuotaLedger>,
    artifacts: Arc<dyn ArtifactStore>,
    notifier: Arc<NotificationDispatcher>,
}

impl GenerationHandler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        quota: Arc<QuotaLedger>,
        artifacts: Arc<dyn ArtifactStore>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            orchestrator,
            quota,
            artifacts,
            notifier,
        }
    }

    /// Record a failed attempt; reconcile quota and notify only when this
    /// failure is terminal for the job.
    async fn fail(&self, ctx: &JobContext, error: Error) -> JobResult {
        let job = &ctx.job;
        let fatal = !error.is_transient();
        let terminal = fatal || job.attempt >= job.max_attempts;

        if terminal {
            // Undo the optimistic charge: the user gets no artifact. The
            // terminal transition happens once per job, so the notification
            // is dispatched exactly once.
            if let Err(e) = self.quota.decrement(job.user_id, job.category).await {
                warn!(job_id = %job.id, error = %e, "Quota reconciliation failed");
            }
            self.notifier
                .notify_error(job.user_id, job.id, job.category, error_summary(&error))
                .await;
        }

        JobResult::Failed {
            reason: error.to_string(),
            fatal,
        }
    }
}

#[async_trait]
impl JobHandler for GenerationHandler {
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let job = &ctx.job;
        ctx.report_progress(milestone::STARTED).await;

        // Charge once per job, not per attempt: queue-level retries of the
        // same job must not double-charge under at-least-once execution.
        if job.attempt <= 1 {
            if let Err(e) = self.quota.increment(job.user_id, job.category).await {
                return self.fail(&ctx, e).await;
            }
        }

        let request = build_request(job.category, ctx.payload());
        let image = match image_from_payload(job.category, ctx.payload()) {
            Ok(image) => image,
            Err(e) => return self.fail(&ctx, e).await,
        };

        ctx.report_progress(milestone::PROVIDER_INVOKED).await;
        let outcome = match self.orchestrator.generate(&request, image.as_ref()).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(&ctx, e).await,
        };

        if outcome.degraded {
            warn!(
                job_id = %job.id,
                category = %job.category,
                provider = %outcome.provider,
                "Delivering template fallback artifact"
            );
        }

        ctx.report_progress(milestone::PERSISTING).await;
        match self.artifacts.store(job.user_id, &outcome.artifact).await {
            Ok(artifact_ref) => {
                info!(
                    job_id = %job.id,
                    category = %job.category,
                    provider = %outcome.provider,
                    degraded = outcome.degraded,
                    "Artifact persisted"
                );
                self.notifier
                    .notify_complete(job.user_id, job.id, job.category, artifact_ref.clone())
                    .await;
                JobResult::Success(artifact_ref)
            }
            Err(e) => self.fail(&ctx, e).await,
        }
    }
}

/// Render the category-specific payload into a provider request.
fn build_request(category: Category, payload: &JsonValue) -> GenerationRequest {
    let field = |key: &str, default: &str| -> String {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    };

    match category {
        Category::Workout => {
            let days = payload.get("days_per_week").and_then(|v| v.as_u64()).unwrap_or(3);
            GenerationRequest::new(
                category,
                format!(
                    "Create a {} day per week workout plan. Goal: {}. Experience: {}. \
                     Available equipment: {}. Respond with a JSON object with keys \
                     \"title\", \"days\" (each with \"name\", optional \"focus\", and \
                     \"exercises\" with \"name\", \"sets\", \"reps\", \"rest_seconds\") \
                     and an optional \"notes\" string.",
                    days,
                    field("goal", "general fitness"),
                    field("experience", "beginner"),
                    field("equipment", "full gym"),
                ),
            )
            .with_system(
                "You are a certified strength and conditioning coach. \
                 Answer only with the requested JSON document.",
            )
        }
        Category::Meal => GenerationRequest::new(
            category,
            format!(
                "Create a meal plan. Goal: {}. Daily calorie target: {}. Dietary \
                 restrictions: {}. Respond with a JSON object with keys \"title\" and \
                 \"days\" (each with \"name\", \"total_calories\", and \"meals\" with \
                 \"name\", \"foods\", \"calories\", \"protein_g\", \"carbs_g\", \"fat_g\").",
                field("goal", "balanced nutrition"),
                field("calorie_target", "2000"),
                field("restrictions", "none"),
            ),
        )
        .with_system(
            "You are a registered dietitian. Answer only with the requested JSON document.",
        ),
        Category::InbodyScan => GenerationRequest::new(
            category,
            "Read the attached InBody result sheet photo and extract the measurements. \
             Respond with a JSON object with keys \"weight_kg\", \
             \"skeletal_muscle_mass_kg\", \"body_fat_percent\", \"bmi\" and, when \
             legible, \"basal_metabolic_rate_kcal\". Use numbers exactly as printed."
                .to_string(),
        )
        .with_system("You transcribe body-composition result sheets. Answer only with JSON."),
        Category::BodyPhoto => GenerationRequest::new(
            category,
            "Assess the physique in the attached photo. Respond with a JSON object with \
             keys \"estimated_body_fat_low\", \"estimated_body_fat_high\" (percent), \
             \"posture_findings\" (array of strings) and \"recommendations\" (array of \
             strings, at least one)."
                .to_string(),
        )
        .with_system("You are a fitness assessment assistant. Answer only with JSON."),
    }
}

/// Extract the image reference for vision categories.
///
/// A vision job without an image can never succeed, so the error is fatal.
fn image_from_payload(category: Category, payload: &JsonValue) -> Result<Option<ImageRef>> {
    if !category.is_vision() {
        return Ok(None);
    }
    let value = payload
        .get("image")
        .ok_or_else(|| Error::InvalidInput(format!("category '{}' requires an image", category)))?;
    let image: ImageRef = serde_json::from_value(value.clone())
        .map_err(|e| Error::InvalidInput(format!("invalid image reference: {}", e)))?;
    Ok(Some(image))
}

/// Short user-safe failure summary. Raw provider error strings never reach
/// the user; the full error goes to the job record and logs only.
fn error_summary(error: &Error) -> &'static str {
    match error {
        Error::RateLimited { .. } | Error::Provider { .. } | Error::Request(_) => {
            "The generation service was temporarily unavailable"
        }
        Error::ProviderQuota { .. } => "The generation service is over capacity",
        Error::InvalidResponse(_) => "The generated result could not be read",
        Error::InvalidInput(_) => "The request was missing required information",
        Error::QuotaExceeded { .. } => "Monthly generation limit reached",
        _ => "Generation failed",
    }
}
