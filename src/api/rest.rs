// =============================================================================
// REST API Endpoints -- Axum 0.7
// =============================================================================
//
// Two endpoints, both public: `/api/v1/health` for liveness probing and
// `/api/v1/live-price` for the latest price snapshot. CORS is permissive so
// the static site can call the API straight from the browser.
//
// Callers see either valid data or an explicit unavailable response; they
// are never exposed to transport-level failures of the upstream feed.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::AppState;
use crate::market_data::Trade;

/// Trades returned by `/live-price` when no `count` is given.
const DEFAULT_RECENT_COUNT: usize = 10;

/// Build the REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/live-price", get(live_price))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connection: String,
    buffered_trades: usize,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        connection: state.feed.state().to_string(),
        buffered_trades: state.feed.buffered_trades(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Live price
// =============================================================================

#[derive(Deserialize)]
struct LivePriceParams {
    count: Option<usize>,
}

#[derive(Serialize)]
struct LivePriceResponse {
    price: f64,
    recent: Vec<Trade>,
}

async fn live_price(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LivePriceParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let Some(price) = state.feed.current_price() else {
        // Empty buffer is not an error condition here -- the feed simply has
        // not received its first trade yet (or never will, if exhausted).
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "No price data available yet." })),
        ));
    };

    let count = params
        .count
        .unwrap_or(DEFAULT_RECENT_COUNT)
        .clamp(1, state.config.buffer_capacity);

    Ok(Json(LivePriceResponse {
        price,
        recent: state.feed.latest_trades(count),
    }))
}
