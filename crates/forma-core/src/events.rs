//! Typed pipeline events and the broadcast event bus.
//!
//! The job pipeline publishes typed events to a single broadcast channel;
//! downstream consumers (award logic, socket broadcasters, telemetry)
//! subscribe explicitly rather than relying on implicitly wired listeners.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Category;

/// Event emitted by the generation pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A job was accepted and enqueued.
    JobQueued {
        job_id: Uuid,
        user_id: Uuid,
        category: Category,
    },
    /// A worker claimed the job and began an attempt.
    JobStarted {
        job_id: Uuid,
        category: Category,
        attempt: i32,
    },
    /// Progress milestone reported by the owning worker.
    JobProgress { job_id: Uuid, percent: i32 },
    /// Terminal success.
    JobCompleted {
        job_id: Uuid,
        user_id: Uuid,
        category: Category,
        artifact_id: Uuid,
    },
    /// Terminal failure after all attempts.
    JobFailed {
        job_id: Uuid,
        user_id: Uuid,
        category: Category,
        reason: String,
    },
    /// The orchestrator switched to the alternate provider for one call.
    ProviderFallback { from: String, to: String },
    /// A category worker pool started.
    WorkerStarted { category: Category },
    /// A category worker pool stopped.
    WorkerStopped { category: Category },
}

impl PipelineEvent {
    /// Dot-namespaced event type name for wire consumers.
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::JobQueued { .. } => "job.queued",
            PipelineEvent::JobStarted { .. } => "job.started",
            PipelineEvent::JobProgress { .. } => "job.progress",
            PipelineEvent::JobCompleted { .. } => "job.completed",
            PipelineEvent::JobFailed { .. } => "job.failed",
            PipelineEvent::ProviderFallback { .. } => "provider.fallback",
            PipelineEvent::WorkerStarted { .. } => "worker.started",
            PipelineEvent::WorkerStopped { .. } => "worker.stopped",
        }
    }
}

/// Envelope carrying event metadata alongside the payload.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g. `"job.completed"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Domain-specific event data.
    pub payload: PipelineEvent,
}

impl EventEnvelope {
    pub fn new(event: PipelineEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            payload: event,
        }
    }
}

/// Broadcast event bus for pipeline events.
///
/// Slow subscribers observe `Lagged` and miss events; the pipeline never
/// blocks on delivery.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers.
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
