//! # forma-core
//!
//! Core types, traits, and abstractions for the forma generation pipeline:
//! the domain model (categories, jobs, quota records, artifacts), the shared
//! error enum, default constants, structured-logging field names, the
//! pipeline event bus, and the collaborator traits for the durable job store
//! and the domain artifact store.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, PipelineEvent};
pub use models::{
    Artifact, ArtifactRef, BodyPhotoReport, Category, ExercisePrescription, GenerationJob,
    ImageRef, InbodyReport, JobState, JobStatusView, Meal, MealDay, MealPlan, NewJob, QueueStats,
    QuotaRecord, QuotaUsage, WorkoutDay, WorkoutPlan,
};
pub use traits::{ArtifactStore, JobDisposition, JobStore};
