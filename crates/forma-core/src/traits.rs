//! Collaborator traits at the pipeline's boundaries.
//!
//! The queue's durable store and the domain artifact store are external
//! collaborators; these traits are the contract the pipeline holds them to.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Outcome of a failed attempt at the queue level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    /// The job was requeued for another attempt after a backoff delay.
    Retried,
    /// The job reached its retry ceiling (or a fatal error) and is failed.
    Failed,
}

/// Durable, at-least-once job store.
///
/// Transition contract: `enqueue` creates a job in `Queued`; `claim_next`
/// flips exactly one claimable job `Queued → Active` and increments its
/// attempt counter; `complete`/`fail_or_retry` own the terminal (or
/// requeue) transition. A job's own transitions are strictly monotonic and
/// terminal states are immutable; no ordering is guaranteed across jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a new queued job and return it.
    async fn enqueue(&self, req: NewJob) -> Result<GenerationJob>;

    /// Claim the next visible queued job for a category, if any.
    async fn claim_next(&self, category: Category) -> Result<Option<GenerationJob>>;

    /// Transition an active job to completed with its artifact reference.
    async fn complete(&self, id: Uuid, artifact: ArtifactRef) -> Result<()>;

    /// Record a failed attempt: requeue with `backoff` visibility delay if
    /// attempts remain and the error is not fatal, otherwise fail terminally.
    async fn fail_or_retry(
        &self,
        id: Uuid,
        reason: &str,
        fatal: bool,
        backoff: Duration,
    ) -> Result<JobDisposition>;

    /// Report progress for an active job. Values are clamped to 0-100 and
    /// stale (lower) values are ignored, keeping observed progress monotone.
    async fn update_progress(&self, id: Uuid, percent: i32) -> Result<()>;

    /// Fetch a job by ID.
    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>>;

    /// Number of queued jobs for a category (including backoff-delayed).
    async fn pending_count(&self, category: Category) -> Result<i64>;

    /// Aggregate queue statistics.
    async fn stats(&self) -> Result<QueueStats>;
}

/// Domain store that takes ownership of completed artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact for a user and return an opaque reference.
    async fn store(&self, user_id: Uuid, artifact: &Artifact) -> Result<ArtifactRef>;
}
