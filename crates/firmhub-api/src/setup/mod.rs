//! Application setup and initialization
//!
//! Everything `main` needs to go from a [`Config`] to a served router with running
//! consumers, split so tests can reuse the pieces.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::consumers;
use crate::state::AppState;
use anyhow::{Context, Result};
use firmhub_core::Config;
use firmhub_worker::{MessageHandlerContext, MessageQueue, MessageQueueConfig};
use std::sync::{Arc, Weak};

/// A fully wired application.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Worker pool handle; shut it down after the server has drained.
    pub queue: MessageQueue,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    firmhub_infra::init_telemetry("firmhub-api", config.environment(), config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let state = services::initialize_services(&config, pool.clone()).await?;

    let weak_state: Weak<AppState> = Arc::downgrade(&state);
    let context: Weak<dyn MessageHandlerContext> = weak_state;
    let queue = MessageQueue::start(
        state.db.messages.clone(),
        MessageQueueConfig::from_config(&config),
        context,
        Some(pool),
    );
    tracing::info!(
        topics = ?consumers::TOPICS,
        max_workers = config.worker_max_concurrency(),
        "Message consumers started"
    );

    let router = routes::setup_routes(&config, state.clone()).await?;

    Ok(App {
        state,
        router,
        queue,
    })
}
