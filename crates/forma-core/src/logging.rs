//! Structured logging field name constants for the forma pipeline.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// User UUID owning the request.
pub const USER_ID: &str = "user_id";

/// Generation category ("workout", "meal", "inbody-scan", "body-photo").
pub const CATEGORY: &str = "category";

/// Provider identifier ("openai", "gemini").
pub const PROVIDER: &str = "provider";

// ─── Measurement fields ────────────────────────────────────────────────────

/// 1-based attempt number (gateway or queue level).
pub const ATTEMPT: &str = "attempt";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Computed backoff delay in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

/// Progress percent reported by a worker.
pub const PROGRESS: &str = "progress";

// ─── Quota fields ──────────────────────────────────────────────────────────

/// Usage count within the current period.
pub const QUOTA_USED: &str = "quota_used";

/// Configured period limit (-1 = unlimited).
pub const QUOTA_LIMIT: &str = "quota_limit";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
