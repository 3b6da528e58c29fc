//! # forma-api
//!
//! Service facade for the forma generation pipeline: job submission gated by
//! quota admission, job status reads, per-user quota stats, and the
//! composition root that wires the whole pipeline from environment
//! configuration. HTTP routing, validation, and authentication live in the
//! consuming service; this crate exposes the operations that layer calls.

pub mod pipeline;
pub mod service;

pub use pipeline::Pipeline;
pub use service::PipelineService;
