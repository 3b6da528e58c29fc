//! Service facade: the operations the HTTP/API collaborator consumes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use forma_core::{
    Category, Error, EventBus, JobStatusView, JobStore, NewJob, PipelineEvent, QuotaUsage, Result,
};
use forma_quota::QuotaLedger;

/// Facade over the queue and ledger with 202-style submission semantics.
pub struct PipelineService {
    store: Arc<dyn JobStore>,
    quota: Arc<QuotaLedger>,
    events: EventBus,
}

impl PipelineService {
    pub fn new(store: Arc<dyn JobStore>, quota: Arc<QuotaLedger>, events: EventBus) -> Self {
        Self {
            store,
            quota,
            events,
        }
    }

    /// Admit and enqueue a generation request.
    ///
    /// Admission is checked strictly before enqueue; a rejected request
    /// creates no job. Returns as soon as the job is queued; generation
    /// itself runs on the category's worker pool, never in this call.
    #[instrument(skip(self, payload), fields(user_id = %user_id, category = %category))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        category: Category,
        payload: JsonValue,
    ) -> Result<Uuid> {
        if !self.quota.has_available(user_id, category).await? {
            debug!("Submission rejected: quota exhausted");
            return Err(Error::QuotaExceeded {
                category: category.as_str().to_string(),
            });
        }

        let job = self
            .store
            .enqueue(NewJob::new(user_id, category, payload))
            .await?;
        self.events.emit(PipelineEvent::JobQueued {
            job_id: job.id,
            user_id,
            category,
        });
        info!(job_id = %job.id, "Job accepted");
        Ok(job.id)
    }

    /// Current state, progress, and outcome of a job.
    pub async fn status(&self, job_id: Uuid) -> Result<JobStatusView> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))?;
        Ok(JobStatusView::from(&job))
    }

    /// Per-category usage snapshot for one user.
    pub async fn quota_stats(&self, user_id: Uuid) -> Result<HashMap<Category, QuotaUsage>> {
        self.quota.stats(user_id).await
    }
}
