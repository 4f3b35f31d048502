// =============================================================================
// Feed Connection Manager -- lifecycle of the single upstream subscription
// =============================================================================
//
// Owns the connection state machine: connect, receive, heartbeat, detect
// failure, reconnect with exponential backoff up to a retry ceiling. One
// writer task drives everything; message handling, close handling and
// heartbeat ticks are serialized onto it, so the trade buffer only ever has
// a single writer.
//
// Failure policy: transport failures and parse failures are logged and
// recovered locally, never surfaced to read-side callers. Once the retry
// ceiling is reached the feed stops for good (state `Exhausted`) and the
// read API keeps serving whatever the buffer last held.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::market_data::trade_buffer::{Trade, TradeBuffer};
use crate::market_data::transport::{FeedEvent, FeedSink, FeedStream, FeedTransport};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Lifecycle states of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal -- the retry ceiling was reached. Only a process restart
    /// brings the feed back.
    Exhausted,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Exhausted => write!(f, "Exhausted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for the connection lifecycle.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Consecutive failed attempts allowed before the feed gives up.
    pub retry_ceiling: u32,
    /// Keepalive ping cadence while connected.
    pub heartbeat_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: 5,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// FeedManager
// ---------------------------------------------------------------------------

/// Maintains exactly one logical upstream connection and translates inbound
/// messages into [`Trade`] records.
///
/// The transport is injected so tests can script connection outcomes and
/// inbound events without a network.
pub struct FeedManager {
    transport: Box<dyn FeedTransport>,
    buffer: Arc<TradeBuffer>,
    config: FeedConfig,
    state: RwLock<ConnectionState>,
    retry_count: AtomicU32,
}

impl FeedManager {
    pub fn new(
        transport: Box<dyn FeedTransport>,
        buffer: Arc<TradeBuffer>,
        config: FeedConfig,
    ) -> Self {
        Self {
            transport,
            buffer,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            retry_count: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.write() = next;
    }

    /// Consecutive failures since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Relaxed)
    }

    // ── Read API ─────────────────────────────────────────────────────────
    //
    // Safe to call from any task at any time; these only touch the buffer
    // and never block on the connection lifecycle.

    /// Price of the newest buffered trade, or `None` before the first trade
    /// has been received.
    pub fn current_price(&self) -> Option<f64> {
        self.buffer.latest().map(|t| t.price)
    }

    /// Snapshot of up to the last `count` trades, newest last.
    pub fn latest_trades(&self, count: usize) -> Vec<Trade> {
        self.buffer.snapshot(count)
    }

    /// Number of trades currently buffered.
    pub fn buffered_trades(&self) -> usize {
        self.buffer.len()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Drive the connection lifecycle until the retry ceiling is exhausted.
    ///
    /// Spawn exactly once; this task is the sole writer of both the
    /// connection state and the trade buffer.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.set_state(ConnectionState::Connecting);
            match self.transport.connect().await {
                Ok((sink, stream)) => {
                    self.retry_count.store(0, Ordering::Relaxed);
                    self.set_state(ConnectionState::Connected);
                    info!("trade feed connected");
                    self.run_session(sink, stream).await;
                }
                Err(e) => {
                    warn!(error = %e, "trade feed connect failed");
                }
            }

            // Either the connect attempt failed or a live session ended.
            let failures = self.retry_count.load(Ordering::Relaxed);
            if failures >= self.config.retry_ceiling {
                self.set_state(ConnectionState::Exhausted);
                error!(
                    attempts = failures,
                    "maximum reconnection attempts reached -- trade feed stopped"
                );
                return;
            }

            let attempt = failures + 1;
            self.retry_count.store(attempt, Ordering::Relaxed);
            let delay = Duration::from_secs(2u64.saturating_pow(attempt));
            self.set_state(ConnectionState::Reconnecting);
            warn!(
                attempt,
                ceiling = self.config.retry_ceiling,
                delay_secs = delay.as_secs(),
                "trade feed disconnected -- reconnecting after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One connected session: inbound events and heartbeat ticks are
    /// serialized here until the socket closes or errors.
    ///
    /// The heartbeat interval is owned by this scope, so it is cancelled
    /// exactly once per disconnect and a fresh session always starts a fresh
    /// timer -- it can never be double-started or leak past `Exhausted`.
    async fn run_session(&self, mut sink: Box<dyn FeedSink>, mut stream: Box<dyn FeedStream>) {
        let first_tick = tokio::time::Instant::now() + self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(first_tick, self.config.heartbeat_interval);

        loop {
            tokio::select! {
                event = stream.next_event() => match event {
                    FeedEvent::Message(text) => self.process_trade(&text),
                    FeedEvent::Closed => {
                        warn!("trade feed closed by peer");
                        return;
                    }
                    FeedEvent::Error(e) => {
                        error!(error = %e, "trade feed read error");
                        return;
                    }
                },
                _ = heartbeat.tick() => {
                    // Fire-and-forget liveness signal to the peer; a reply
                    // is neither awaited nor validated. A failed send is
                    // left to the read half to diagnose.
                    match sink.send_ping().await {
                        Ok(()) => debug!("heartbeat ping sent"),
                        Err(e) => warn!(error = %e, "heartbeat ping failed"),
                    }
                }
            }
        }
    }

    /// Parse one inbound payload and buffer it when it carries a usable
    /// price. Malformed payloads are logged and dropped; they never affect
    /// the connection state or terminate the process.
    fn process_trade(&self, raw: &str) {
        match parse_trade_price(raw) {
            Ok(Some(price)) => {
                let trade = Trade::observed_now(price);
                debug!(price = trade.price, "trade stored");
                self.buffer.append(trade);
            }
            // Valid JSON without a price field -- subscription acks and
            // other non-trade events are silently ignored.
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to parse trade message"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extract the price from a trade payload.
///
/// Expected shape:
/// ```json
/// { "e": "trade", "s": "BTCUSDT", "p": "50000.00", "q": "0.123" }
/// ```
///
/// Returns `Ok(None)` when the message is valid JSON without a `p` field,
/// `Err` when the payload is not JSON or the price is unusable. A price must
/// parse to a finite value > 0 -- NaN or zero is never stored.
fn parse_trade_price(raw: &str) -> Result<Option<f64>> {
    let root: serde_json::Value =
        serde_json::from_str(raw).context("failed to parse trade JSON")?;

    let Some(field) = root.get("p") else {
        return Ok(None);
    };

    let price = match field {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse price string: {s}"))?,
        serde_json::Value::Number(n) => n.as_f64().context("price is not a valid f64")?,
        _ => anyhow::bail!("price field has unexpected JSON type"),
    };

    if !price.is_finite() || price <= 0.0 {
        anyhow::bail!("price out of range: {price}");
    }

    Ok(Some(price))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
