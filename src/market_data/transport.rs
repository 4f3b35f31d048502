// =============================================================================
// Upstream transport -- the seam between the feed manager and the socket
// =============================================================================
//
// The feed manager never touches tokio-tungstenite directly; it drives a
// `FeedTransport` factory that hands out connected read/write halves. Tests
// substitute a scripted transport, production uses `WsFeedTransport`.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One inbound lifecycle event from the upstream socket.
#[derive(Debug)]
pub enum FeedEvent {
    /// A text payload, possibly a trade message.
    Message(String),
    /// The peer closed the connection or the stream ended.
    Closed,
    /// A transport-level read error. Funnels into the same reconnect path
    /// as `Closed`.
    Error(anyhow::Error),
}

/// Factory for upstream connections.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Open a fresh connection, returning its write and read halves.
    async fn connect(&self) -> Result<(Box<dyn FeedSink>, Box<dyn FeedStream>)>;
}

/// Read half of an upstream connection.
#[async_trait]
pub trait FeedStream: Send {
    /// Wait for the next lifecycle event. Control frames are handled
    /// internally and never surface here.
    async fn next_event(&mut self) -> FeedEvent;
}

/// Write half of an upstream connection. The relay never sends data
/// upstream; keepalive pings are the only outbound traffic.
#[async_trait]
pub trait FeedSink: Send {
    async fn send_ping(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Production implementation over tokio-tungstenite
// ---------------------------------------------------------------------------

pub struct WsFeedTransport {
    url: String,
}

impl WsFeedTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl FeedTransport for WsFeedTransport {
    async fn connect(&self) -> Result<(Box<dyn FeedSink>, Box<dyn FeedStream>)> {
        info!(url = %self.url, "connecting to trade WebSocket");

        let (ws_stream, _response) = connect_async(&self.url)
            .await
            .context("failed to connect to trade WebSocket")?;

        let (write, read) = ws_stream.split();
        Ok((
            Box::new(WsFeedSink { write }),
            Box::new(WsFeedStream { read }),
        ))
    }
}

struct WsFeedStream {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FeedStream for WsFeedStream {
    async fn next_event(&mut self) -> FeedEvent {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return FeedEvent::Message(text),
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "close frame received");
                    return FeedEvent::Closed;
                }
                // Ping / Pong / Binary / raw frames -- tungstenite answers
                // pings automatically and nothing else carries trade data.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return FeedEvent::Error(e.into()),
                None => return FeedEvent::Closed,
            }
        }
    }
}

struct WsFeedSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FeedSink for WsFeedSink {
    async fn send_ping(&mut self) -> Result<()> {
        self.write
            .send(Message::Ping(Vec::new()))
            .await
            .context("failed to send ping frame")
    }
}
