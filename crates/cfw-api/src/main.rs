//! # cfw-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from the environment;
//! see [`cfw_api::state::AppConfig::from_lookup`].

use cfw_api::state::{AppConfig, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let metrics = if config.metrics_enabled {
        Some(cfw_api::metrics::install_recorder().map_err(|e| {
            tracing::error!("Metrics recorder installation failed: {e}");
            e
        })?)
    } else {
        None
    };

    // Absent DATABASE_URL means in-memory only.
    let db_pool = cfw_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let plugin_key = config.plugin_key.clone();
    let state = AppState::new(config).with_pool(db_pool).with_metrics(metrics);
    let app = cfw_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("cfw-api listening on {addr}, mounted at /plugins/{plugin_key}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
