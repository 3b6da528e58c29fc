//! # forma-inference
//!
//! AI provider layer for the forma pipeline:
//!
//! - [`retry`]: backoff policy (generic and rate-limit-aware variants) and
//!   the explicit-outcome retry driver;
//! - [`providers`]: the uniform text+vision capability trait and the closed
//!   provider set;
//! - [`openai`] / [`gemini`]: concrete backends;
//! - [`schema`]: per-category structural validation of provider responses;
//! - [`fallback`]: deterministic template artifacts for plan categories;
//! - [`gateway`]: a backend wrapped with retry, validation, and degrade;
//! - [`orchestrator`]: default-provider selection with one-shot failover on
//!   provider quota/billing exhaustion;
//! - [`mock`]: scriptable provider for deterministic tests.

pub mod config;
pub mod fallback;
pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod orchestrator;
pub mod providers;
pub mod retry;
pub mod schema;

pub use config::{InferenceConfig, RetryTuning};
pub use gateway::{GatewayOutcome, ProviderGateway};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use mock::{MockFailure, MockProvider};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use orchestrator::{
    AttemptOutcome, GenerationOutcome, Orchestrator, ProviderAttemptRecord,
};
pub use providers::{GenerationProvider, GenerationRequest, ProviderId};
pub use retry::{run_with_retry, Attempt, RetryPolicy};
pub use schema::validate_artifact;
