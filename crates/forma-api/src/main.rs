//! forma-api pipeline service shell.
//!
//! Wires the generation pipeline from the environment, runs the worker
//! pools, and streams pipeline events to stdout as JSON lines until
//! interrupted. The HTTP layer, real artifact store, and push transport are
//! separate services; this binary stands them in with in-memory and
//! log-backed implementations for local development.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forma_api::Pipeline;
use forma_core::Result;
use forma_jobs::MemoryArtifactStore;
use forma_notify::{Notification, NotificationChannel};

/// Transport stand-in that logs deliveries instead of pushing them.
struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            user_id = %notification.user_id,
            job_id = %notification.job_id,
            category = %notification.category,
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pipeline =
        Pipeline::from_env(Arc::new(MemoryArtifactStore::new()), Arc::new(LogChannel)).await?;
    let mut events = pipeline.events.subscribe();
    info!("forma pipeline running, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(envelope) => println!("{}", serde_json::to_string(&envelope)?),
                Err(RecvError::Lagged(skipped)) => {
                    info!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("Shutting down");
    pipeline.handle.shutdown();
    Ok(())
}
