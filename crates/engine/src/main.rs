//! Homestack Engine - hardware-aware compose deployment daemon
//!
//! Classifies attached GPUs, parameterizes service templates and
//! persists validated compose artifacts under the confinement root.

use engine_lib::{
    catalog::Catalog,
    hardware::SysfsEnumerator,
    health::{components, HealthRegistry},
    ComposeEngine, StructuredLogger,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting homestack-engine");

    // Load configuration
    let config = config::EngineConfig::load()?;
    info!(host_name = %config.host_name, base_root = %config.base_root.display(), "Engine configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CATALOG).await;
    health_registry.register(components::CLASSIFIER).await;
    health_registry.register(components::WRITER).await;

    // Build the engine: built-in catalog, policy from config, sysfs
    // PCI enumeration
    let catalog = Arc::new(Catalog::builtin());
    let policy = Arc::new(config.policy());
    let engine = Arc::new(ComposeEngine::new(
        catalog.clone(),
        policy,
        Arc::new(SysfsEnumerator::new()),
        &config.host_name,
    ));

    // Initialize structured logger
    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(ENGINE_VERSION, engine.catalog_version(), catalog.len());

    // Startup hardware scan; results land in metrics and logs
    let profiles = engine.detect_hardware().await;
    info!(gpus = profiles.len(), "Startup hardware scan complete");

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(engine, health_registry.clone()));

    // Mark engine as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    api_handle.abort();

    Ok(())
}
