// =============================================================================
// Relay Configuration -- process-lifetime constants with env overrides
// =============================================================================

use std::time::Duration;

use tracing::warn;

/// Default upstream: Binance spot BTC/USDT trade stream.
const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@trade";

/// Relay settings, fixed for the process lifetime. Values come from the
/// defaults below, overridden by `RELAY_*` environment variables at startup
/// (a `.env` file is honored); nothing is hot-reloadable.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream WebSocket endpoint.
    pub feed_url: String,
    /// Consecutive failed reconnect attempts before the feed gives up.
    pub retry_ceiling: u32,
    /// Keepalive ping cadence while connected.
    pub heartbeat_interval: Duration,
    /// Maximum trades retained in memory.
    pub buffer_capacity: usize,
    /// Bind address for the HTTP read API.
    pub bind_addr: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            retry_ceiling: 5,
            heartbeat_interval: Duration::from_secs(30),
            buffer_capacity: 100,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl RelayConfig {
    /// Build the config from the environment, keeping the default for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RELAY_FEED_URL") {
            if !url.trim().is_empty() {
                config.feed_url = url;
            }
        }
        if let Ok(addr) = std::env::var("RELAY_BIND_ADDR") {
            if !addr.trim().is_empty() {
                config.bind_addr = addr;
            }
        }

        config.retry_ceiling = env_parse("RELAY_RETRY_CEILING", config.retry_ceiling);
        config.heartbeat_interval = Duration::from_secs(env_parse(
            "RELAY_HEARTBEAT_SECS",
            config.heartbeat_interval.as_secs(),
        ));
        config.buffer_capacity = env_parse("RELAY_BUFFER_CAPACITY", config.buffer_capacity);

        config
    }
}

/// Parse an env var, warning and keeping `fallback` on bad input.
fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, "ignoring unparsable env override");
                fallback
            }
        },
        Err(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_relay_contract() {
        let config = RelayConfig::default();
        assert_eq!(config.retry_ceiling, 5);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.buffer_capacity, 100);
        assert!(config.feed_url.starts_with("wss://"));
    }
}
