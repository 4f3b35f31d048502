// =============================================================================
// Price Relay -- Main Entry Point
// =============================================================================
//
// Maintains a single persistent subscription to the upstream trade feed and
// serves the latest price snapshot over HTTP. The feed manager recovers from
// drops on its own; if it exhausts its retry ceiling the process keeps
// running and the API serves the last known data.
// =============================================================================

mod api;
mod app_state;
mod config;
mod market_data;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::RelayConfig;
use crate::market_data::{FeedConfig, FeedManager, TradeBuffer, WsFeedTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env();
    info!(
        feed_url = %config.feed_url,
        retry_ceiling = config.retry_ceiling,
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        buffer_capacity = config.buffer_capacity,
        "Price Relay starting up"
    );

    // ── 2. Feed manager ──────────────────────────────────────────────────
    let buffer = Arc::new(TradeBuffer::new(config.buffer_capacity));
    let transport = WsFeedTransport::new(config.feed_url.clone());
    let feed = Arc::new(FeedManager::new(
        Box::new(transport),
        buffer,
        FeedConfig {
            retry_ceiling: config.retry_ceiling,
            heartbeat_interval: config.heartbeat_interval,
        },
    ));

    tokio::spawn(feed.clone().run());

    // ── 3. API server ────────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config.clone(), feed));
    let bind_addr = config.bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("Relay running. Press Ctrl+C to stop.");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received -- stopping");
    Ok(())
}
