//! # forma-quota
//!
//! Per-user, per-category quota accounting against a rolling 30-day period.
//!
//! The ledger gates admission before a job is enqueued, is charged
//! optimistically when an attempt is dispatched, and is reconciled
//! (decremented) when a job terminates in failure so users are never charged
//! for work that produced no artifact.

pub mod ledger;

pub use ledger::{QuotaConfig, QuotaLedger};
