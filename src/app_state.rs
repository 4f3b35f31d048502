// =============================================================================
// Shared Application State
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::config::RelayConfig;
use crate::market_data::FeedManager;

/// State handed to every API handler via `Arc<AppState>`.
///
/// The feed manager is the only subsystem; it owns the trade buffer and the
/// connection lifecycle, and its read API is safe to call from any handler
/// task concurrently with the writer.
pub struct AppState {
    pub config: RelayConfig,
    pub feed: Arc<FeedManager>,
    /// Instant when the relay started. Used for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: RelayConfig, feed: Arc<FeedManager>) -> Self {
        Self {
            config,
            feed,
            start_time: Instant::now(),
        }
    }
}
