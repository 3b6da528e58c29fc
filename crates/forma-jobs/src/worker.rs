//! Per-category worker pools claiming and executing jobs.
//!
//! Each category runs a fixed-size pool: up to `concurrency` jobs are
//! claimed and processed together, and each worker runs one job to its
//! disposition (including all provider backoff suspensions) before claiming
//! the next. The pools share one store, one handler registry, and one event
//! bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use forma_core::{
    defaults, Category, EventBus, GenerationJob, JobDisposition, JobStore, PipelineEvent,
};
use forma_inference::RetryPolicy;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the worker pools.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker concurrency per category.
    pub concurrency: HashMap<Category, usize>,
    /// Polling interval in milliseconds when a category queue is empty.
    pub poll_interval_ms: u64,
    /// Hard upper bound on one job execution in seconds.
    pub job_timeout_secs: u64,
    /// Base delay between attempts of one job; doubles each retry.
    pub retry_base: Duration,
    /// Whether to process jobs at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let concurrency = Category::ALL
            .iter()
            .map(|c| (*c, c.default_concurrency()))
            .collect();
        Self {
            concurrency,
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            retry_base: defaults::JOB_BACKOFF_BASE,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `WORKER_PLAN_CONCURRENCY` | `2` | Pool size for workout/meal |
    /// | `WORKER_VISION_CONCURRENCY` | `4` | Pool size for vision categories |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when idle |
    /// | `JOB_TIMEOUT_SECS` | `900` | Per-job execution bound |
    /// | `JOB_RETRY_BASE_MS` | `2000` | First inter-attempt delay |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        if let Some(n) = env_usize("WORKER_PLAN_CONCURRENCY") {
            config.concurrency.insert(Category::Workout, n);
            config.concurrency.insert(Category::Meal, n);
        }
        if let Some(n) = env_usize("WORKER_VISION_CONCURRENCY") {
            config.concurrency.insert(Category::InbodyScan, n);
            config.concurrency.insert(Category::BodyPhoto, n);
        }
        if let Ok(val) = std::env::var("JOB_POLL_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                config.poll_interval_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("JOB_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.job_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("JOB_RETRY_BASE_MS") {
            if let Ok(ms) = val.parse() {
                config.retry_base = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Set one category's pool size.
    pub fn with_concurrency(mut self, category: Category, concurrency: usize) -> Self {
        self.concurrency.insert(category, concurrency.max(1));
        self
    }

    /// Set the idle polling interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the per-job timeout.
    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    /// Set the base inter-attempt retry delay.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    fn concurrency_for(&self, category: Category) -> usize {
        self.concurrency
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_concurrency())
            .max(1)
    }
}

fn env_usize(var: &str) -> Option<usize> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

/// Handle for controlling running worker pools.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    events: EventBus,
}

impl WorkerHandle {
    /// Signal all pools to shut down after their in-flight jobs finish.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Subscribe to pipeline events.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<forma_core::EventEnvelope> {
        self.events.subscribe()
    }
}

/// Job worker running one pool per category.
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<Category, Arc<dyn JobHandler>>>>,
    events: EventBus,
    queue_policy: RetryPolicy,
}

impl JobWorker {
    pub fn new(store: Arc<dyn JobStore>, config: WorkerConfig, events: EventBus) -> Self {
        // Generic policy between attempts of one job: 2 s base doubling by
        // default, capped by the job timeout.
        let queue_policy = RetryPolicy::generic(
            defaults::JOB_MAX_ATTEMPTS as u32,
            config.retry_base,
            Duration::from_secs(config.job_timeout_secs),
            2.0,
        );
        Self {
            store,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            events,
            queue_policy,
        }
    }

    /// Register a handler for one category.
    pub async fn register_handler(&self, category: Category, handler: Arc<dyn JobHandler>) {
        self.handlers.write().await.insert(category, handler);
        debug!(category = %category, "Registered job handler");
    }

    /// Register one handler for every category.
    pub async fn register_for_all(&self, handler: Arc<dyn JobHandler>) {
        for category in Category::ALL {
            self.register_handler(category, handler.clone()).await;
        }
    }

    /// Subscribe to pipeline events.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<forma_core::EventEnvelope> {
        self.events.subscribe()
    }

    /// Start one pool per registered category and return a control handle.
    pub async fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let events = self.events.clone();

        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return WorkerHandle {
                shutdown_tx,
                events,
            };
        }

        let categories: Vec<Category> = {
            let handlers = self.handlers.read().await;
            handlers.keys().copied().collect()
        };

        let worker = Arc::new(self);
        for category in categories {
            let worker = worker.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                worker.run_pool(category, shutdown_rx).await;
            });
        }

        WorkerHandle {
            shutdown_tx,
            events,
        }
    }

    /// Run one category's claim/execute loop.
    #[instrument(skip(self, shutdown_rx), fields(category = %category))]
    async fn run_pool(&self, category: Category, mut shutdown_rx: watch::Receiver<bool>) {
        let concurrency = self.config.concurrency_for(category);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        info!(concurrency, "Worker pool started");
        self.events.emit(PipelineEvent::WorkerStarted { category });

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // Claim up to `concurrency` jobs and process them together.
            let mut tasks = tokio::task::JoinSet::new();
            for _ in 0..concurrency {
                match self.store.claim_next(category).await {
                    Ok(Some(job)) => {
                        let ctx = self.execution_ctx();
                        tasks.spawn(async move {
                            ctx.execute_job(job).await;
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to claim job");
                        break;
                    }
                }
            }

            if tasks.is_empty() {
                // Queue empty, sleep before polling again.
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
                // No sleep: immediately try to claim more jobs.
            }
        }

        self.events.emit(PipelineEvent::WorkerStopped { category });
        info!("Worker pool stopped");
    }

    /// Bundle the references one spawned job execution needs.
    fn execution_ctx(&self) -> ExecutionCtx {
        ExecutionCtx {
            store: self.store.clone(),
            handlers: self.handlers.clone(),
            events: self.events.clone(),
            queue_policy: self.queue_policy.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct ExecutionCtx {
    store: Arc<dyn JobStore>,
    handlers: Arc<RwLock<HashMap<Category, Arc<dyn JobHandler>>>>,
    events: EventBus,
    queue_policy: RetryPolicy,
    job_timeout: Duration,
}

impl ExecutionCtx {
    async fn execute_job(self, job: GenerationJob) {
        let start = Instant::now();
        let job_id = job.id;
        let user_id = job.user_id;
        let category = job.category;
        let attempt = job.attempt;

        info!(job_id = %job_id, category = %category, attempt, "Processing job");
        self.events.emit(PipelineEvent::JobStarted {
            job_id,
            category,
            attempt,
        });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&category).cloned()
        };

        let result = match handler {
            Some(handler) => {
                let ctx = JobContext::new(job, self.store.clone(), self.events.clone());
                match tokio::time::timeout(self.job_timeout, handler.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(job_id = %job_id, "Job exceeded timeout");
                        JobResult::Failed {
                            reason: format!(
                                "Job exceeded timeout of {}s",
                                self.job_timeout.as_secs()
                            ),
                            fatal: false,
                        }
                    }
                }
            }
            None => {
                warn!(category = %category, "No handler registered for category");
                JobResult::Failed {
                    reason: format!("No handler for category: {}", category),
                    fatal: true,
                }
            }
        };

        match result {
            JobResult::Success(artifact) => {
                let artifact_id = artifact.id;
                if let Err(e) = self.store.complete(job_id, artifact).await {
                    error!(job_id = %job_id, error = %e, "Failed to mark job as completed");
                } else {
                    info!(
                        job_id = %job_id,
                        category = %category,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed"
                    );
                    self.events.emit(PipelineEvent::JobCompleted {
                        job_id,
                        user_id,
                        category,
                        artifact_id,
                    });
                }
            }
            JobResult::Failed { reason, fatal } => {
                let backoff = self.queue_policy.next_delay(attempt.max(1) as u32);
                match self
                    .store
                    .fail_or_retry(job_id, &reason, fatal, backoff)
                    .await
                {
                    Ok(JobDisposition::Retried) => {
                        warn!(
                            job_id = %job_id,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            reason = %reason,
                            "Attempt failed, job requeued"
                        );
                    }
                    Ok(JobDisposition::Failed) => {
                        warn!(
                            job_id = %job_id,
                            attempt,
                            reason = %reason,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Job failed"
                        );
                        self.events.emit(PipelineEvent::JobFailed {
                            job_id,
                            user_id,
                            category,
                            reason,
                        });
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Failed to record job failure");
                    }
                }
            }
        }
    }
}
