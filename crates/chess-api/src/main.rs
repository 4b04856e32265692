//! Chess API Server
//!
//! REST API server for chess tournament management.

use anyhow::Context;
use chess_api::{create_router, state::AppState};
use chess_core::{AppConfig, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "chess_api={level},chess_core={level},audit=info,tower_http=info",
            level = logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; a missing or weak JWT_SECRET stops here
    let config_path = std::env::var("CHESS_CONFIG").ok().map(PathBuf::from);
    let config = AppConfig::load(config_path).context("Invalid configuration")?;

    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config)?);

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Chess API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/docs", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
