//! End-to-end pipeline tests over the full submission → worker →
//! orchestrator → persistence → notification path.
//!
//! Validated properties:
//! - Pipeline-001: a submitted job completes, persists its artifact, and
//!   notifies the user exactly once
//! - Pipeline-002: provider quota exhaustion fails over to the alternate
//!   provider for one call and the default is restored afterwards
//! - Pipeline-003: transient failures exhaust the retry ceiling, reconcile
//!   the quota charge, and emit exactly one error notification
//! - Pipeline-004: admission rejects at the limit before any job is created
//! - Pipeline-005: two simultaneous submissions at one-below-the-limit admit
//!   at most one extra job (documented bounded-overrun race, not a bug)
//! - Pipeline-006: overrun under a concurrent burst stays within
//!   worker-concurrency − 1
//! - Pipeline-007: progress observed by a status reader is monotone,
//!   ending at 100 for completed jobs and below 100 for failed ones
//! - Pipeline-008: vision jobs fail fast with no template fallback

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::time::sleep;
use uuid::Uuid;

use forma_api::PipelineService;
use forma_core::{Category, Error, EventBus, ImageRef, JobState, JobStatusView, JobStore};
use forma_inference::{
    MockFailure, MockProvider, Orchestrator, ProviderGateway, ProviderId, RetryPolicy,
};
use forma_jobs::{
    GenerationHandler, JobWorker, MemoryArtifactStore, MemoryJobStore, WorkerConfig, WorkerHandle,
};
use forma_notify::{MemoryChannel, NotificationDispatcher};
use forma_quota::{QuotaConfig, QuotaLedger};

// ============================================================================
// HELPERS
// ============================================================================

struct TestPipeline {
    service: PipelineService,
    orchestrator: Arc<Orchestrator>,
    store: Arc<MemoryJobStore>,
    quota: Arc<QuotaLedger>,
    artifacts: Arc<MemoryArtifactStore>,
    channel: Arc<MemoryChannel>,
    events: EventBus,
    handle: WorkerHandle,
}

fn fast_gateway(provider: Arc<MockProvider>) -> ProviderGateway {
    ProviderGateway::new(
        provider,
        RetryPolicy::rate_limit_aware(3, Duration::from_millis(1), Duration::from_millis(5), 2.0),
    )
}

/// Assemble the full pipeline around scripted providers and start workers.
async fn pipeline_with(
    openai: Arc<MockProvider>,
    gemini: Arc<MockProvider>,
    quota_config: QuotaConfig,
) -> TestPipeline {
    let events = EventBus::new(64);
    let orchestrator = Arc::new(Orchestrator::new(
        ProviderId::OpenAi,
        fast_gateway(openai),
        fast_gateway(gemini),
        events.clone(),
    ));
    let quota = Arc::new(QuotaLedger::new(quota_config));
    let store = Arc::new(MemoryJobStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let channel = Arc::new(MemoryChannel::new());
    let notifier = Arc::new(NotificationDispatcher::new(channel.clone()));
    let handler = Arc::new(GenerationHandler::new(
        orchestrator.clone(),
        quota.clone(),
        artifacts.clone(),
        notifier,
    ));

    let worker = JobWorker::new(
        store.clone(),
        WorkerConfig::default()
            .with_poll_interval(5)
            .with_retry_base(Duration::from_millis(5)),
        events.clone(),
    );
    worker.register_for_all(handler).await;
    let handle = worker.start().await;

    TestPipeline {
        service: PipelineService::new(store.clone(), quota.clone(), events.clone()),
        orchestrator,
        store,
        quota,
        artifacts,
        channel,
        events,
        handle,
    }
}

fn valid_workout_json() -> serde_json::Value {
    json!({
        "title": "Push Pull Legs",
        "days": [{
            "name": "Push",
            "exercises": [{"name": "Bench Press", "sets": 4, "reps": "6-8", "rest_seconds": 150}]
        }]
    })
}

fn valid_inbody_json() -> serde_json::Value {
    json!({
        "weight_kg": 78.4,
        "skeletal_muscle_mass_kg": 34.1,
        "body_fat_percent": 18.2,
        "bmi": 24.6
    })
}

/// Poll until the job is terminal, collecting every observed progress value.
async fn wait_for_terminal(
    service: &PipelineService,
    job_id: Uuid,
    timeout_ms: u64,
) -> (JobStatusView, Vec<i32>) {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut observed = Vec::new();
    loop {
        let view = service.status(job_id).await.expect("job should exist");
        observed.push(view.progress);
        if view.state.is_terminal() {
            return (view, observed);
        }
        assert!(
            Instant::now() < deadline,
            "job {} did not reach a terminal state",
            job_id
        );
        sleep(Duration::from_millis(2)).await;
    }
}

// ============================================================================
// HAPPY PATH
// ============================================================================

#[tokio::test]
async fn submitted_workout_completes_and_notifies_once() {
    let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(openai, gemini, QuotaConfig::default()).await;
    let user = Uuid::new_v4();

    let job_id = fx
        .service
        .submit(user, Category::Workout, json!({"goal": "strength"}))
        .await
        .unwrap();

    let (view, _) = wait_for_terminal(&fx.service, job_id, 5000).await;
    assert_eq!(view.state, JobState::Completed);
    assert_eq!(view.progress, 100);
    let artifact_ref = view.result.expect("completed job carries a result");
    assert!(fx.artifacts.get(artifact_ref.id).await.is_some());

    let delivered = fx.channel.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].job_id, job_id);
    assert_eq!(delivered[0].title, "Workout plan ready");

    let usage = fx.quota.remaining(user, Category::Workout).await.unwrap();
    assert_eq!(usage.used, 1);

    fx.handle.shutdown();
}

// ============================================================================
// PROVIDER FAILOVER (Scenario A)
// ============================================================================

#[tokio::test]
async fn provider_quota_fails_over_and_default_is_restored() {
    let openai = Arc::new(
        MockProvider::new("openai")
            .always_fail(MockFailure::ProviderQuota("quota exceeded".to_string())),
    );
    let gemini = Arc::new(MockProvider::new("gemini").with_response(valid_workout_json()));
    let fx = pipeline_with(openai.clone(), gemini.clone(), QuotaConfig::default()).await;
    let mut events = fx.events.subscribe();

    let job_id = fx
        .service
        .submit(Uuid::new_v4(), Category::Workout, json!({}))
        .await
        .unwrap();

    let (view, _) = wait_for_terminal(&fx.service, job_id, 5000).await;
    assert_eq!(view.state, JobState::Completed);
    assert_eq!(openai.call_count(), 1);
    assert_eq!(gemini.call_count(), 1);

    // Fallback was per-call: the configured default is unchanged.
    assert_eq!(fx.orchestrator.current_provider(), ProviderId::OpenAi);

    let mut saw_fallback = false;
    while let Ok(envelope) = events.try_recv() {
        if envelope.event_type == "provider.fallback" {
            saw_fallback = true;
        }
    }
    assert!(saw_fallback, "expected a provider.fallback event");

    fx.handle.shutdown();
}

#[tokio::test]
async fn both_providers_exhausted_fails_job_once() {
    let openai = Arc::new(
        MockProvider::new("openai")
            .always_fail(MockFailure::ProviderQuota("quota exceeded".to_string())),
    );
    let gemini = Arc::new(
        MockProvider::new("gemini").always_fail(MockFailure::ProviderQuota("billing".to_string())),
    );
    let fx = pipeline_with(openai.clone(), gemini.clone(), QuotaConfig::default()).await;
    let user = Uuid::new_v4();

    let job_id = fx
        .service
        .submit(user, Category::Workout, json!({}))
        .await
        .unwrap();

    let (view, _) = wait_for_terminal(&fx.service, job_id, 5000).await;
    assert_eq!(view.state, JobState::Failed);
    // Account-level exhaustion is not transient: one attempt, no queue
    // retries.
    assert_eq!(openai.call_count(), 1);
    assert_eq!(gemini.call_count(), 1);
    assert_eq!(fx.orchestrator.current_provider(), ProviderId::OpenAi);

    let delivered = fx.channel.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].error_summary.is_some());

    // Charge reconciled: the user paid nothing for a failed job.
    let usage = fx.quota.remaining(user, Category::Workout).await.unwrap();
    assert_eq!(usage.used, 0);

    fx.handle.shutdown();
}

// ============================================================================
// RETRY EXHAUSTION (Scenario B)
// ============================================================================

#[tokio::test]
async fn transient_failures_exhaust_retries_then_fail() {
    let openai = Arc::new(
        MockProvider::new("openai").always_fail(MockFailure::Transient("HTTP 503".to_string())),
    );
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(openai.clone(), gemini.clone(), QuotaConfig::default()).await;
    let user = Uuid::new_v4();

    let job_id = fx
        .service
        .submit(user, Category::Workout, json!({}))
        .await
        .unwrap();

    let (view, observed) = wait_for_terminal(&fx.service, job_id, 10_000).await;
    assert_eq!(view.state, JobState::Failed);
    assert!(view.failure_reason.is_some());
    assert!(*observed.last().unwrap() < 100);

    // Default ceiling of 3 attempts, one provider call each; transient
    // errors never trigger provider failover.
    assert_eq!(openai.call_count(), 3);
    assert_eq!(gemini.call_count(), 0);

    // Incremented once at dispatch, decremented once at the terminal
    // transition.
    let usage = fx.quota.remaining(user, Category::Workout).await.unwrap();
    assert_eq!(usage.used, 0);

    let delivered = fx.channel.delivered().await;
    assert_eq!(delivered.len(), 1, "exactly one error notification");
    assert!(delivered[0].artifact.is_none());

    fx.handle.shutdown();
}

// ============================================================================
// QUOTA ADMISSION (Scenarios C and D)
// ============================================================================

#[tokio::test]
async fn admission_rejects_at_limit_without_creating_a_job() {
    let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(
        openai,
        gemini,
        QuotaConfig::default().with_limit(Category::Workout, 5),
    )
    .await;
    let user = Uuid::new_v4();

    for _ in 0..5 {
        fx.quota.increment(user, Category::Workout).await.unwrap();
    }

    let result = fx.service.submit(user, Category::Workout, json!({})).await;
    assert!(matches!(result, Err(Error::QuotaExceeded { .. })));

    let stats = fx.store.stats().await.unwrap();
    assert_eq!(
        stats.queued + stats.active + stats.completed + stats.failed,
        0,
        "rejected submission must not create a job"
    );

    fx.handle.shutdown();
}

#[tokio::test]
async fn simultaneous_submissions_admit_at_most_one_extra() {
    // Known, accepted race: admission check and the dispatch-time increment
    // are not one transaction, so two requests arriving in the same instant
    // with one admission left can both pass. The overrun is bounded, not a
    // failure.
    let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(
        openai,
        gemini,
        QuotaConfig::default().with_limit(Category::Workout, 5),
    )
    .await;
    let user = Uuid::new_v4();

    for _ in 0..4 {
        fx.quota.increment(user, Category::Workout).await.unwrap();
    }

    let (first, second) = tokio::join!(
        fx.service.submit(user, Category::Workout, json!({})),
        fx.service.submit(user, Category::Workout, json!({})),
    );
    let admitted: Vec<Uuid> = [first, second].into_iter().flatten().collect();
    assert!(!admitted.is_empty());
    assert!(admitted.len() <= 2, "never more than one extra admission");

    for job_id in &admitted {
        let (view, _) = wait_for_terminal(&fx.service, *job_id, 5000).await;
        assert_eq!(view.state, JobState::Completed);
    }

    let usage = fx.quota.remaining(user, Category::Workout).await.unwrap();
    assert!(
        usage.used <= 6,
        "used {} exceeded limit by more than one",
        usage.used
    );

    fx.handle.shutdown();
}

#[tokio::test]
async fn overrun_is_bounded_by_worker_concurrency() {
    // Bounded-overrun property: a burst of C concurrent submissions (C =
    // the category's worker concurrency) can exceed the limit by at most
    // C − 1.
    let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(
        openai,
        gemini,
        QuotaConfig::default().with_limit(Category::Workout, 1),
    )
    .await;
    let user = Uuid::new_v4();
    let concurrency = Category::Workout.default_concurrency();

    let submissions = (0..concurrency)
        .map(|_| fx.service.submit(user, Category::Workout, json!({})));
    let admitted: Vec<Uuid> = futures::future::join_all(submissions)
        .await
        .into_iter()
        .flatten()
        .collect();

    for job_id in &admitted {
        let (view, _) = wait_for_terminal(&fx.service, *job_id, 5000).await;
        assert_eq!(view.state, JobState::Completed);
    }

    let usage = fx.quota.remaining(user, Category::Workout).await.unwrap();
    assert!(
        usage.used <= 1 + (concurrency as i64 - 1),
        "used {} exceeded the bounded overrun",
        usage.used
    );

    fx.handle.shutdown();
}

// ============================================================================
// PROGRESS MONOTONICITY
// ============================================================================

#[tokio::test]
async fn progress_observed_by_a_reader_is_monotone() {
    let openai = Arc::new(MockProvider::new("openai").with_response(valid_workout_json()));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(openai, gemini, QuotaConfig::default()).await;
    let mut events = fx.events.subscribe();

    let job_id = fx
        .service
        .submit(Uuid::new_v4(), Category::Workout, json!({}))
        .await
        .unwrap();

    let (view, observed) = wait_for_terminal(&fx.service, job_id, 5000).await;
    assert_eq!(view.state, JobState::Completed);
    assert!(
        observed.windows(2).all(|w| w[0] <= w[1]),
        "status reads regressed: {:?}",
        observed
    );
    assert_eq!(*observed.last().unwrap(), 100);

    // Milestone events for this job are monotone as well.
    let mut milestones = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        if let forma_core::PipelineEvent::JobProgress { job_id: id, percent } = envelope.payload {
            if id == job_id {
                milestones.push(percent);
            }
        }
    }
    assert!(!milestones.is_empty());
    assert!(milestones.windows(2).all(|w| w[0] <= w[1]));

    fx.handle.shutdown();
}

// ============================================================================
// VISION CATEGORIES
// ============================================================================

#[tokio::test]
async fn inbody_scan_completes_with_extracted_metrics() {
    let openai = Arc::new(MockProvider::new("openai").with_response(valid_inbody_json()));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(openai.clone(), gemini, QuotaConfig::default()).await;

    let image = serde_json::to_value(ImageRef::from_bytes("image/jpeg", b"scan-photo")).unwrap();
    let job_id = fx
        .service
        .submit(Uuid::new_v4(), Category::InbodyScan, json!({ "image": image }))
        .await
        .unwrap();

    let (view, _) = wait_for_terminal(&fx.service, job_id, 5000).await;
    assert_eq!(view.state, JobState::Completed);
    assert_eq!(openai.calls_for("generate_vision"), 1);
    assert_eq!(
        view.result.unwrap().category,
        Category::InbodyScan
    );

    fx.handle.shutdown();
}

#[tokio::test]
async fn unreadable_scan_fails_without_fallback() {
    // Metric extraction has no safe template artifact: a malformed provider
    // response surfaces as job failure, not a silent degrade.
    let openai = Arc::new(MockProvider::new("openai").with_response(json!({"garbled": true})));
    let gemini = Arc::new(MockProvider::new("gemini"));
    let fx = pipeline_with(openai.clone(), gemini, QuotaConfig::default()).await;
    let user = Uuid::new_v4();

    let image = serde_json::to_value(ImageRef::from_bytes("image/jpeg", b"blurry")).unwrap();
    let job_id = fx
        .service
        .submit(user, Category::InbodyScan, json!({ "image": image }))
        .await
        .unwrap();

    let (view, _) = wait_for_terminal(&fx.service, job_id, 5000).await;
    assert_eq!(view.state, JobState::Failed);
    assert_eq!(openai.call_count(), 1, "schema failure is fatal, no retries");
    assert_eq!(fx.artifacts.count().await, 0);

    let delivered = fx.channel.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "InBody analysis failed");

    let usage = fx.quota.remaining(user, Category::InbodyScan).await.unwrap();
    assert_eq!(usage.used, 0);

    fx.handle.shutdown();
}
