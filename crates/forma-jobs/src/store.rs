//! In-memory reference implementation of the durable job store seam.
//!
//! Per-category FIFO with retry visibility times. Every transition is one
//! lock scope, so a job's observed state sequence is strictly monotonic and
//! terminal states are immutable. A database-backed store can replace this
//! behind the same [`JobStore`] trait without touching the workers.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use forma_core::{
    Artifact, ArtifactRef, ArtifactStore, Category, Error, GenerationJob, JobDisposition,
    JobState, JobStore, NewJob, QueueStats, Result,
};

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<Uuid, GenerationJob>,
    queues: HashMap<Category, VecDeque<Uuid>>,
}

/// In-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<StoreInner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, req: NewJob) -> Result<GenerationJob> {
        let job = GenerationJob {
            id: Uuid::now_v7(),
            user_id: req.user_id,
            category: req.category,
            payload: req.payload,
            state: JobState::Queued,
            attempt: 0,
            max_attempts: req.max_attempts.max(1),
            progress: 0,
            result: None,
            failure_reason: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            not_before: None,
        };

        let mut inner = self.inner.lock().await;
        inner
            .queues
            .entry(req.category)
            .or_default()
            .push_back(job.id);
        inner.jobs.insert(job.id, job.clone());
        debug!(job_id = %job.id, category = %job.category, "Job enqueued");
        Ok(job)
    }

    async fn claim_next(&self, category: Category) -> Result<Option<GenerationJob>> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let StoreInner { jobs, queues } = &mut *inner;

        let Some(queue) = queues.get_mut(&category) else {
            return Ok(None);
        };

        // First queued job whose visibility time has passed; delayed retries
        // ahead of it do not block newer eligible jobs.
        let position = queue.iter().position(|id| {
            jobs.get(id)
                .is_some_and(|job| job.not_before.map_or(true, |t| t <= now))
        });
        let Some(position) = position else {
            return Ok(None);
        };
        let id = queue.remove(position).expect("position is in bounds");

        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::Internal(format!("queued job {} missing from table", id)))?;
        job.state = JobState::Active;
        job.attempt += 1;
        job.not_before = None;
        if job.started_at.is_none() {
            job.started_at = Some(now);
        }
        debug!(job_id = %id, attempt = job.attempt, "Job claimed");
        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: Uuid, artifact: ArtifactRef) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(Error::JobNotFound(id))?;

        if job.state != JobState::Active {
            return Err(Error::Job(format!(
                "cannot complete job {} in state {:?}",
                id, job.state
            )));
        }
        job.state = JobState::Completed;
        job.result = Some(artifact);
        job.progress = 100;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_or_retry(
        &self,
        id: Uuid,
        reason: &str,
        fatal: bool,
        backoff: Duration,
    ) -> Result<JobDisposition> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(Error::JobNotFound(id))?;

        if job.state != JobState::Active {
            return Err(Error::Job(format!(
                "cannot fail job {} in state {:?}",
                id, job.state
            )));
        }

        if !fatal && job.attempt < job.max_attempts {
            job.state = JobState::Queued;
            let backoff = chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::zero());
            job.not_before = Some(Utc::now() + backoff);
            let category = job.category;
            debug!(
                job_id = %id,
                attempt = job.attempt,
                backoff_ms = backoff.as_millis() as u64,
                "Attempt failed, requeued"
            );
            inner.queues.entry(category).or_default().push_back(id);
            Ok(JobDisposition::Retried)
        } else {
            job.state = JobState::Failed;
            job.failure_reason = Some(reason.to_string());
            job.completed_at = Some(Utc::now());
            Ok(JobDisposition::Failed)
        }
    }

    async fn update_progress(&self, id: Uuid, percent: i32) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(Error::JobNotFound(id))?;

        if job.state != JobState::Active {
            // Progress is best-effort; late reports after a terminal
            // transition are dropped rather than erroring.
            return Ok(());
        }
        let percent = percent.clamp(0, 100);
        if percent > job.progress {
            job.progress = percent;
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn pending_count(&self, category: Category) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .queues
            .get(&category)
            .map_or(0, |q| q.len() as i64))
    }

    async fn stats(&self) -> Result<QueueStats> {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats::default();
        for job in inner.jobs.values() {
            match job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

/// In-memory artifact store.
///
/// Stands in for the domain store that takes ownership of completed
/// artifacts; production deployments supply their own [`ArtifactStore`].
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<Uuid, (Uuid, Artifact)>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored artifact by reference ID.
    pub async fn get(&self, id: Uuid) -> Option<Artifact> {
        self.artifacts
            .lock()
            .await
            .get(&id)
            .map(|(_, artifact)| artifact.clone())
    }

    pub async fn count(&self) -> usize {
        self.artifacts.lock().await.len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, user_id: Uuid, artifact: &Artifact) -> Result<ArtifactRef> {
        let reference = ArtifactRef {
            id: Uuid::now_v7(),
            category: artifact.category(),
            stored_at: Utc::now(),
        };
        self.artifacts
            .lock()
            .await
            .insert(reference.id, (user_id, artifact.clone()));
        debug!(artifact_id = %reference.id, user_id = %user_id, "Artifact stored");
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_job(category: Category) -> NewJob {
        NewJob::new(Uuid::new_v4(), category, json!({"goal": "test"}))
    }

    fn artifact_ref(category: Category) -> ArtifactRef {
        ArtifactRef {
            id: Uuid::new_v4(),
            category,
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn enqueue_then_claim_flips_to_active() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::Workout)).await.unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempt, 0);

        let claimed = store.claim_next(Category::Workout).await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempt, 1);
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn claim_is_fifo_within_category() {
        let store = MemoryJobStore::new();
        let first = store.enqueue(new_job(Category::Meal)).await.unwrap();
        let second = store.enqueue(new_job(Category::Meal)).await.unwrap();

        assert_eq!(
            store.claim_next(Category::Meal).await.unwrap().unwrap().id,
            first.id
        );
        assert_eq!(
            store.claim_next(Category::Meal).await.unwrap().unwrap().id,
            second.id
        );
        assert!(store.claim_next(Category::Meal).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn categories_are_isolated() {
        let store = MemoryJobStore::new();
        store.enqueue(new_job(Category::Workout)).await.unwrap();

        assert!(store.claim_next(Category::Meal).await.unwrap().is_none());
        assert!(store.claim_next(Category::Workout).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn complete_is_terminal_and_immutable() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::Workout)).await.unwrap();
        store.claim_next(Category::Workout).await.unwrap();

        store
            .complete(job.id, artifact_ref(Category::Workout))
            .await
            .unwrap();

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.progress, 100);
        assert!(stored.result.is_some());

        // Terminal states reject further transitions.
        assert!(store
            .complete(job.id, artifact_ref(Category::Workout))
            .await
            .is_err());
        assert!(store
            .fail_or_retry(job.id, "late", false, Duration::ZERO)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn failed_attempt_requeues_until_ceiling() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::Workout)).await.unwrap();

        for attempt in 1..=3 {
            let claimed = store.claim_next(Category::Workout).await.unwrap().unwrap();
            assert_eq!(claimed.attempt, attempt);
            let disposition = store
                .fail_or_retry(job.id, "transient", false, Duration::ZERO)
                .await
                .unwrap();
            if attempt < 3 {
                assert_eq!(disposition, JobDisposition::Retried);
            } else {
                assert_eq!(disposition, JobDisposition::Failed);
            }
        }

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("transient"));
        assert!(stored.progress < 100);
    }

    #[tokio::test]
    async fn fatal_failure_skips_remaining_attempts() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::InbodyScan)).await.unwrap();
        store.claim_next(Category::InbodyScan).await.unwrap();

        let disposition = store
            .fail_or_retry(job.id, "user not found", true, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(disposition, JobDisposition::Failed);

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.attempt, 1);
    }

    #[tokio::test]
    async fn backoff_delays_visibility() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::Workout)).await.unwrap();
        store.claim_next(Category::Workout).await.unwrap();

        store
            .fail_or_retry(job.id, "transient", false, Duration::from_secs(60))
            .await
            .unwrap();

        // Still pending but not yet claimable.
        assert_eq!(store.pending_count(Category::Workout).await.unwrap(), 1);
        assert!(store.claim_next(Category::Workout).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_retry_does_not_block_newer_jobs() {
        let store = MemoryJobStore::new();
        let delayed = store.enqueue(new_job(Category::Workout)).await.unwrap();
        store.claim_next(Category::Workout).await.unwrap();
        store
            .fail_or_retry(delayed.id, "transient", false, Duration::from_secs(60))
            .await
            .unwrap();

        let fresh = store.enqueue(new_job(Category::Workout)).await.unwrap();
        let claimed = store.claim_next(Category::Workout).await.unwrap().unwrap();
        assert_eq!(claimed.id, fresh.id);
    }

    #[tokio::test]
    async fn progress_is_monotone_and_clamped() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::Workout)).await.unwrap();
        store.claim_next(Category::Workout).await.unwrap();

        store.update_progress(job.id, 40).await.unwrap();
        store.update_progress(job.id, 10).await.unwrap(); // stale, ignored
        assert_eq!(store.get(job.id).await.unwrap().unwrap().progress, 40);

        store.update_progress(job.id, 250).await.unwrap();
        assert_eq!(store.get(job.id).await.unwrap().unwrap().progress, 100);
    }

    #[tokio::test]
    async fn progress_after_terminal_is_dropped() {
        let store = MemoryJobStore::new();
        let job = store.enqueue(new_job(Category::Workout)).await.unwrap();
        store.claim_next(Category::Workout).await.unwrap();
        store
            .complete(job.id, artifact_ref(Category::Workout))
            .await
            .unwrap();

        store.update_progress(job.id, 50).await.unwrap();
        assert_eq!(store.get(job.id).await.unwrap().unwrap().progress, 100);
    }

    #[tokio::test]
    async fn stats_counts_by_state() {
        let store = MemoryJobStore::new();
        let a = store.enqueue(new_job(Category::Workout)).await.unwrap();
        store.enqueue(new_job(Category::Meal)).await.unwrap();
        store.claim_next(Category::Workout).await.unwrap();
        store
            .complete(a.id, artifact_ref(Category::Workout))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn artifact_store_round_trips_by_reference() {
        use forma_core::{ExercisePrescription, WorkoutDay, WorkoutPlan};

        let store = MemoryArtifactStore::new();
        let artifact = Artifact::Workout(WorkoutPlan {
            title: "Plan".to_string(),
            days: vec![WorkoutDay {
                name: "Day 1".to_string(),
                focus: None,
                exercises: vec![ExercisePrescription {
                    name: "Squat".to_string(),
                    sets: 3,
                    reps: "5".to_string(),
                    rest_seconds: 180,
                }],
            }],
            notes: None,
        });

        let reference = store.store(Uuid::new_v4(), &artifact).await.unwrap();
        assert_eq!(reference.category, Category::Workout);
        assert_eq!(store.get(reference.id).await, Some(artifact));
        assert_eq!(store.count().await, 1);
    }
}
