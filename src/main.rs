// =============================================================================
// Lumen Chart — Main Entry Point
// =============================================================================
//
// Serves precomputed chart analytics for a single instrument.  Nothing runs
// in the background: the first request after the freshness window expires
// triggers the rebuild.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod cache;
mod dataset;
mod error;
mod indicators;
mod market_data;
mod runtime_config;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "lumen_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Lumen Chart starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let defaults = RuntimeConfig::default();
        if !std::path::Path::new(CONFIG_PATH).exists() {
            if let Err(e) = defaults.save(CONFIG_PATH) {
                warn!(error = %e, "Failed to write default config");
            }
        }
        defaults
    });
    config.apply_env(|key| std::env::var(key).ok());

    if config.polygon_api_key.is_none() {
        warn!("POLYGON_API_KEY not set; candles will come from the fallback source");
    }
    match config.durable_dir() {
        Some(dir) => info!(dir = %dir.display(), "durable cache enabled"),
        None => info!("serverless mode: durable cache disabled"),
    }
    info!(
        symbol = %config.symbol,
        bar_seconds = config.bar_seconds,
        freshness_secs = config.freshness_secs,
        "configuration resolved"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let client = reqwest::Client::builder()
        .user_agent(concat!("lumen-chart/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::live(config, client));

    // ── 3. Start the API server ──────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("Lumen Chart shut down complete.");
    Ok(())
}
