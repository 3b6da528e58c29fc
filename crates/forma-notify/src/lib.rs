//! # forma-notify
//!
//! Out-of-band delivery of terminal job outcomes. Message content comes
//! from a fixed per-category, per-outcome, per-language template table;
//! delivery through the messaging collaborator's transport is best-effort
//! and never affects job state.

pub mod dispatcher;
pub mod templates;

pub use dispatcher::{MemoryChannel, Notification, NotificationChannel, NotificationDispatcher};
pub use templates::{MessageTemplate, NotificationOutcome, SUPPORTED_LANGUAGES};
