//! # settle-api — Binary Entry Point
//!
//! Reads configuration from the environment, opens the evidence stores,
//! and serves the API.

use anyhow::Context;
use settle_api::config::{init_tracing, ApiConfig};
use settle_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);
    tracing::info!(?config, "starting settle-api");

    let metrics = settle_api::metrics::install_recorder()
        .context("failed to install metrics recorder")?;

    let state = AppState::from_config(&config)
        .await
        .map_err(|e| {
            tracing::error!("Bootstrap failed: {e}");
            e
        })?
        .with_metrics(metrics);

    let app = settle_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("settle-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
