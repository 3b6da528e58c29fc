//! Notification dispatcher: delivers terminal job outcomes out-of-band.
//!
//! Delivery is best-effort and fire-and-forget relative to the job's
//! terminal transition: a channel failure is logged and dropped, never
//! re-failing or retrying the underlying job. Users see the localized
//! title/body, never a raw provider error string.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use forma_core::{ArtifactRef, Category, Result};

use crate::templates::{resolve, NotificationOutcome};

/// Event handed to the messaging collaborator, with resolved localized
/// strings.
#[derive(Debug, Clone)]
pub struct Notification {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub category: Category,
    pub outcome: NotificationOutcome,
    pub title: String,
    pub body: String,
    /// Present for completion notifications.
    pub artifact: Option<ArtifactRef>,
    /// Short human-readable failure summary, present for error
    /// notifications. Already sanitized; never a raw provider error.
    pub error_summary: Option<String>,
}

/// Transport owned by the messaging collaborator (push service, socket
/// broadcast).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Resolves message content and hands events to the transport.
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
    default_language: String,
    user_languages: Mutex<HashMap<Uuid, String>>,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self::with_default_language(channel, forma_core::defaults::NOTIFY_DEFAULT_LANGUAGE)
    }

    pub fn with_default_language(
        channel: Arc<dyn NotificationChannel>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            default_language: default_language.into(),
            user_languages: Mutex::new(HashMap::new()),
        }
    }

    /// Record a user's preferred language (synced from the profile store).
    pub async fn set_user_language(&self, user_id: Uuid, language: impl Into<String>) {
        self.user_languages
            .lock()
            .await
            .insert(user_id, language.into());
    }

    /// Notify the user that their artifact is ready.
    pub async fn notify_complete(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        category: Category,
        artifact: ArtifactRef,
    ) {
        let notification = self
            .build(
                user_id,
                job_id,
                category,
                NotificationOutcome::Complete,
                Some(artifact),
                None,
            )
            .await;
        self.deliver(notification).await;
    }

    /// Notify the user that their job failed.
    pub async fn notify_error(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        category: Category,
        error_summary: impl Into<String>,
    ) {
        let notification = self
            .build(
                user_id,
                job_id,
                category,
                NotificationOutcome::Error,
                None,
                Some(error_summary.into()),
            )
            .await;
        self.deliver(notification).await;
    }

    async fn build(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        category: Category,
        outcome: NotificationOutcome,
        artifact: Option<ArtifactRef>,
        error_summary: Option<String>,
    ) -> Notification {
        let language = self
            .user_languages
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| self.default_language.clone());

        let template = resolve(category, outcome, &language, &self.default_language);

        Notification {
            user_id,
            job_id,
            category,
            outcome,
            title: template.title.to_string(),
            body: template.body.to_string(),
            artifact,
            error_summary,
        }
    }

    async fn deliver(&self, notification: Notification) {
        match self.channel.deliver(&notification).await {
            Ok(()) => debug!(
                user_id = %notification.user_id,
                job_id = %notification.job_id,
                category = %notification.category,
                "Notification delivered"
            ),
            // Best-effort: the job's terminal state is already written and
            // must not be disturbed by messaging failures.
            Err(e) => warn!(
                user_id = %notification.user_id,
                job_id = %notification.job_id,
                error = %e,
                "Notification delivery failed, dropping"
            ),
        }
    }
}

/// In-memory channel collecting notifications, for tests and local runs.
#[derive(Default)]
pub struct MemoryChannel {
    delivered: Mutex<Vec<Notification>>,
    fail_all: bool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every delivery fails, for best-effort tests.
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.delivered.lock().await.len()
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        if self.fail_all {
            return Err(forma_core::Error::Notification(
                "push service unavailable".to_string(),
            ));
        }
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }
}
