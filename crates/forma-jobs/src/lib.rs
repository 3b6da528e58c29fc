//! # forma-jobs
//!
//! Durable, at-least-once job queue for the forma generation pipeline:
//!
//! - [`store`]: the in-memory reference implementation of the
//!   [`forma_core::JobStore`] seam plus an in-memory artifact store;
//! - [`handler`]: the per-attempt handler contract and execution context;
//! - [`worker`]: fixed-size per-category worker pools with retry/backoff,
//!   progress reporting, broadcast events, and graceful shutdown;
//! - [`generation`]: the handler wiring quota accounting, the generation
//!   orchestrator, artifact persistence, and terminal notifications.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use forma_core::{Category, EventBus, NewJob};
//! use forma_jobs::{JobWorker, MemoryJobStore, NoOpHandler, WorkerConfig};
//!
//! let store = Arc::new(MemoryJobStore::new());
//! let worker = JobWorker::new(store.clone(), WorkerConfig::from_env(), EventBus::default());
//! worker.register_handler(Category::Workout, Arc::new(NoOpHandler)).await;
//! let handle = worker.start().await;
//!
//! let job = store.enqueue(NewJob::new(user_id, Category::Workout, payload)).await?;
//! // ... poll store.get(job.id) for status ...
//! handle.shutdown();
//! ```

pub mod generation;
pub mod handler;
pub mod store;
pub mod worker;

pub use generation::GenerationHandler;
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use store::{MemoryArtifactStore, MemoryJobStore};
pub use worker::{JobWorker, WorkerConfig, WorkerHandle};
