//! Centralized default constants for the forma pipeline.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

use std::time::Duration;

// =============================================================================
// PROVIDER RETRY (rate-limit-aware policy wrapping every gateway call)
// =============================================================================

/// Maximum attempts per gateway operation.
pub const GATEWAY_MAX_ATTEMPTS: u32 = 5;

/// Base delay before the second gateway attempt.
pub const GATEWAY_BASE_DELAY: Duration = Duration::from_secs(20);

/// Ceiling on the computed gateway delay (before jitter).
pub const GATEWAY_MAX_DELAY: Duration = Duration::from_secs(120);

/// Exponential multiplier between gateway attempts.
pub const GATEWAY_MULTIPLIER: f64 = 2.0;

/// Jitter fraction for the generic backoff policy.
pub const JITTER_GENERIC: f64 = 0.25;

/// Jitter fraction for the rate-limit-aware policy. Tighter because the
/// delay is already provider-dictated.
pub const JITTER_RATE_LIMIT: f64 = 0.10;

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Maximum attempts per job before it transitions to failed.
pub const JOB_MAX_ATTEMPTS: i32 = 3;

/// Base delay between job attempts (doubles each retry).
pub const JOB_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Worker polling interval when a category queue is empty.
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Hard upper bound on one job execution, including all provider retry
/// suspensions.
pub const JOB_TIMEOUT_SECS: u64 = 900;

/// Default worker concurrency for plan-generation categories.
pub const PLAN_CONCURRENCY: usize = 2;

/// Default worker concurrency for vision categories. OCR-style calls are
/// shorter than full plan generation, so the pool is wider.
pub const VISION_CONCURRENCY: usize = 4;

// =============================================================================
// QUOTA
// =============================================================================

/// Rolling quota period length in days.
pub const QUOTA_PERIOD_DAYS: i64 = 30;

/// Sentinel limit meaning unconstrained usage; always passes admission.
pub const QUOTA_UNLIMITED: i64 = -1;

/// Default per-period limits by category.
pub const QUOTA_LIMIT_WORKOUT: i64 = 4;
pub const QUOTA_LIMIT_MEAL: i64 = 4;
pub const QUOTA_LIMIT_INBODY_SCAN: i64 = 8;
pub const QUOTA_LIMIT_BODY_PHOTO: i64 = 8;

// =============================================================================
// PROVIDERS
// =============================================================================

/// Timeout for text generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for vision requests in seconds.
pub const VISION_TIMEOUT_SECS: u64 = 60;

/// Default OpenAI-compatible endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI generation model.
pub const OPENAI_GEN_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI vision model.
pub const OPENAI_VISION_MODEL: &str = "gpt-4o";

/// Default Gemini endpoint.
pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model (text and vision).
pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

// =============================================================================
// EVENTS / NOTIFICATIONS
// =============================================================================

/// Broadcast channel capacity for the pipeline event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Fallback language for notification templates.
pub const NOTIFY_DEFAULT_LANGUAGE: &str = "en";
