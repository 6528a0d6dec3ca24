//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use imgvault_core::Config;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything `main` needs to serve and later shut down.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub background: Vec<JoinHandle<()>>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    imgvault_infra::init_telemetry(
        env!("CARGO_PKG_NAME"),
        config.environment(),
        config.log_format(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;

    let state = services::initialize_services(&config, pool).await?;
    let background = services::start_background_tasks(&config, &state);

    let router = routes::setup_routes(&config, state.clone());

    Ok(App {
        state,
        router,
        background,
    })
}
