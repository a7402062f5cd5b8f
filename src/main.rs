//! # reposync Main Entry Point
//!
//! Loads configuration, prepares the database and serves the webhook endpoint.

use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use reposync::{
    config::ConfigLoader,
    db::init_pool,
    server::{AppState, run_server},
    telemetry,
};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config = Arc::new(ConfigLoader::new().load()?);

    telemetry::init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        debug!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    Migrator::up(&db, None).await?;

    let state = AppState::from_config(config.clone(), Arc::new(db))?;

    run_server(config, state).await
}
