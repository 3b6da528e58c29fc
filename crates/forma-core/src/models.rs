//! Domain models for the forma generation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// CATEGORIES
// =============================================================================

/// Kind of generation request. Each category has its own quota bucket and
/// queue concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// AI-generated workout plan.
    Workout,
    /// AI-generated meal plan.
    Meal,
    /// Metric extraction from an InBody result sheet photo.
    InbodyScan,
    /// Body-composition assessment from a body photo.
    BodyPhoto,
}

impl Category {
    /// All categories, in queue-registration order.
    pub const ALL: [Category; 4] = [
        Category::Workout,
        Category::Meal,
        Category::InbodyScan,
        Category::BodyPhoto,
    ];

    /// Stable string form matching the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Workout => "workout",
            Category::Meal => "meal",
            Category::InbodyScan => "inbody-scan",
            Category::BodyPhoto => "body-photo",
        }
    }

    /// True for categories whose generation reads an image.
    ///
    /// Vision categories have no safe static fallback artifact: a template
    /// cannot stand in for measurements extracted from a user's photo, so
    /// provider exhaustion surfaces as job failure instead of degrading.
    pub fn is_vision(&self) -> bool {
        matches!(self, Category::InbodyScan | Category::BodyPhoto)
    }

    /// Default worker concurrency for this category.
    ///
    /// Vision/OCR calls are much shorter than full plan generation, so they
    /// get a wider pool.
    pub fn default_concurrency(&self) -> usize {
        match self {
            Category::Workout | Category::Meal => crate::defaults::PLAN_CONCURRENCY,
            Category::InbodyScan | Category::BodyPhoto => crate::defaults::VISION_CONCURRENCY,
        }
    }

    /// Default per-period quota limit for this category.
    pub fn default_quota_limit(&self) -> i64 {
        match self {
            Category::Workout => crate::defaults::QUOTA_LIMIT_WORKOUT,
            Category::Meal => crate::defaults::QUOTA_LIMIT_MEAL,
            Category::InbodyScan => crate::defaults::QUOTA_LIMIT_INBODY_SCAN,
            Category::BodyPhoto => crate::defaults::QUOTA_LIMIT_BODY_PHOTO,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workout" => Ok(Category::Workout),
            "meal" => Ok(Category::Meal),
            "inbody-scan" => Ok(Category::InbodyScan),
            "body-photo" => Ok(Category::BodyPhoto),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown category: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// State of a generation job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Terminal states are immutable once written.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A generation job owned by the queue for its lifetime.
///
/// Mutated only by the worker that owns the current attempt. Once terminal,
/// ownership of the artifact passes to the domain store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: Category,
    /// Category-specific generation parameters, opaque to the queue.
    pub payload: JsonValue,
    pub state: JobState,
    /// 1-based while active; 0 before the first claim.
    pub attempt: i32,
    pub max_attempts: i32,
    /// Best-effort monotone progress, 0-100.
    pub progress: i32,
    /// Present only when completed.
    pub result: Option<ArtifactRef>,
    /// Present only when failed.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Retry visibility time; a queued job is claimable once `now >= not_before`.
    pub not_before: Option<DateTime<Utc>>,
}

/// Request to enqueue a new generation job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: Uuid,
    pub category: Category,
    pub payload: JsonValue,
    pub max_attempts: i32,
}

impl NewJob {
    pub fn new(user_id: Uuid, category: Category, payload: JsonValue) -> Self {
        Self {
            user_id,
            category,
            payload,
            max_attempts: crate::defaults::JOB_MAX_ATTEMPTS,
        }
    }
}

/// Status projection returned to API readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub state: JobState,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&GenerationJob> for JobStatusView {
    fn from(job: &GenerationJob) -> Self {
        Self {
            state: job.state,
            progress: job.progress,
            result: job.result.clone(),
            failure_reason: job.failure_reason.clone(),
        }
    }
}

/// Queue statistics summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

// =============================================================================
// QUOTA
// =============================================================================

/// Per (user, category) usage record against a rolling period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub period_start: DateTime<Utc>,
    pub used: i64,
    /// Non-negative limit, or [`crate::defaults::QUOTA_UNLIMITED`].
    pub limit: i64,
}

/// Read-only usage snapshot for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub used: i64,
    pub limit: i64,
    /// Remaining admissions this period; `i64::MAX` when unlimited.
    pub remaining: i64,
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// Opaque reference to a persisted artifact, handed back by the domain store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: Uuid,
    pub category: Category,
    pub stored_at: DateTime<Utc>,
}

/// Schema-validated generation result, one variant per category.
///
/// Validation happens at the Provider Gateway boundary; an invalid shape is
/// a distinct error kind, never a silent pass-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum Artifact {
    Workout(WorkoutPlan),
    Meal(MealPlan),
    InbodyScan(InbodyReport),
    BodyPhoto(BodyPhotoReport),
}

impl Artifact {
    pub fn category(&self) -> Category {
        match self {
            Artifact::Workout(_) => Category::Workout,
            Artifact::Meal(_) => Category::Meal,
            Artifact::InbodyScan(_) => Category::InbodyScan,
            Artifact::BodyPhoto(_) => Category::BodyPhoto,
        }
    }
}

/// A multi-day workout plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub title: String,
    pub days: Vec<WorkoutDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    pub exercises: Vec<ExercisePrescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePrescription {
    pub name: String,
    pub sets: u32,
    /// Free-form rep scheme, e.g. "8-12" or "AMRAP".
    pub reps: String,
    pub rest_seconds: u32,
}

/// A multi-day meal plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub title: String,
    pub days: Vec<MealDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealDay {
    pub name: String,
    pub meals: Vec<Meal>,
    pub total_calories: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    pub foods: Vec<String>,
    pub calories: u32,
    #[serde(default)]
    pub protein_g: f32,
    #[serde(default)]
    pub carbs_g: f32,
    #[serde(default)]
    pub fat_g: f32,
}

/// Metrics extracted from an InBody result sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InbodyReport {
    pub weight_kg: f64,
    pub skeletal_muscle_mass_kg: f64,
    pub body_fat_percent: f64,
    pub bmi: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basal_metabolic_rate_kcal: Option<u32>,
}

/// Assessment produced from a body photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPhotoReport {
    pub estimated_body_fat_low: f64,
    pub estimated_body_fat_high: f64,
    pub posture_findings: Vec<String>,
    pub recommendations: Vec<String>,
}

// =============================================================================
// VISION INPUT
// =============================================================================

/// Image input for vision generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageRef {
    /// Publicly reachable URL.
    Url { url: String },
    /// Inline base64-encoded bytes.
    Inline { media_type: String, data: String },
}

impl ImageRef {
    /// Build an inline reference from raw image bytes.
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::Engine as _;
        ImageRef::Inline {
            media_type: media_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}
