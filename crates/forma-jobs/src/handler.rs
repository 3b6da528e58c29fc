//! Job handler contract and execution context.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use forma_core::{ArtifactRef, EventBus, GenerationJob, JobStore, PipelineEvent};

/// Context provided to job handlers for one attempt.
pub struct JobContext {
    /// The job being processed (snapshot at claim time).
    pub job: GenerationJob,
    store: Arc<dyn JobStore>,
    events: EventBus,
}

impl JobContext {
    pub fn new(job: GenerationJob, store: Arc<dyn JobStore>, events: EventBus) -> Self {
        Self { job, store, events }
    }

    pub fn user_id(&self) -> Uuid {
        self.job.user_id
    }

    pub fn payload(&self) -> &JsonValue {
        &self.job.payload
    }

    /// Report a progress milestone. Best-effort: storage failures are
    /// logged and dropped, and stale values are ignored by the store.
    pub async fn report_progress(&self, percent: i32) {
        if let Err(e) = self.store.update_progress(self.job.id, percent).await {
            warn!(job_id = %self.job.id, error = %e, "Progress update failed");
        }
        self.events.emit(PipelineEvent::JobProgress {
            job_id: self.job.id,
            percent,
        });
    }
}

/// Result of one job attempt.
#[derive(Debug)]
pub enum JobResult {
    /// Attempt produced and persisted an artifact.
    Success(ArtifactRef),
    /// Attempt failed. Non-fatal failures are retried until the job's
    /// attempt ceiling; fatal failures end the job immediately.
    Failed { reason: String, fatal: bool },
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute one attempt of the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// Handler that succeeds immediately. For worker tests.
pub struct NoOpHandler;

#[async_trait]
impl JobHandler for NoOpHandler {
    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(50).await;
        JobResult::Success(ArtifactRef {
            id: Uuid::new_v4(),
            category: ctx.job.category,
            stored_at: chrono::Utc::now(),
        })
    }
}
