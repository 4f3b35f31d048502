pub mod feed;
pub mod trade_buffer;
pub mod transport;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Trade`).
pub use feed::{ConnectionState, FeedConfig, FeedManager};
pub use trade_buffer::{Trade, TradeBuffer};
pub use transport::WsFeedTransport;
