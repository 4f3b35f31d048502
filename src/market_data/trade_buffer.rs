use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single executed trade as observed by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Executed price. Always finite and > 0; unusable prices are rejected
    /// upstream before a `Trade` is ever constructed.
    pub price: f64,
    /// Local receipt time in Unix milliseconds -- the moment the relay
    /// processed the message, not the exchange's own event time.
    pub observed_at: i64,
}

impl Trade {
    /// Build a trade stamped with the current receipt time.
    pub fn observed_now(price: f64) -> Self {
        Self {
            price,
            observed_at: Utc::now().timestamp_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// TradeBuffer -- thread-safe ring of recent trades
// ---------------------------------------------------------------------------

/// Thread-safe ring buffer holding the most recent trades in receipt order.
///
/// Exactly one writer (the feed task) appends; any number of concurrent
/// readers take snapshots. The ring lives for the process lifetime and is
/// never cleared -- it keeps accumulating and evicting across reconnects.
pub struct TradeBuffer {
    ring: RwLock<VecDeque<Trade>>,
    capacity: usize,
}

impl TradeBuffer {
    /// Create an empty buffer that retains at most `capacity` trades.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RwLock::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Append at the newest end. Once the ring is full, each append evicts
    /// exactly one oldest entry.
    pub fn append(&self, trade: Trade) {
        let mut ring = self.ring.write();
        ring.push_back(trade);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Return an owned copy of up to the last `count` trades, oldest-first.
    ///
    /// The copy is detached: later appends never show through, and a reader
    /// can never observe the ring mid-mutation.
    pub fn snapshot(&self, count: usize) -> Vec<Trade> {
        let ring = self.ring.read();
        let start = ring.len().saturating_sub(count);
        ring.iter().skip(start).cloned().collect()
    }

    /// The most recent trade, if any.
    pub fn latest(&self) -> Option<Trade> {
        self.ring.read().back().cloned()
    }

    /// Number of trades currently held.
    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(price: f64, observed_at: i64) -> Trade {
        Trade { price, observed_at }
    }

    #[test]
    fn append_below_capacity_grows_by_one() {
        let buf = TradeBuffer::new(5);
        assert!(buf.is_empty());

        buf.append(trade(100.0, 1));
        assert_eq!(buf.len(), 1);

        buf.append(trade(101.0, 2));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.latest().map(|t| t.price), Some(101.0));
    }

    #[test]
    fn eviction_keeps_the_newest_at_capacity() {
        let buf = TradeBuffer::new(3);
        for i in 1..=5 {
            buf.append(trade(100.0 + i as f64, i));
        }

        assert_eq!(buf.len(), 3);
        let prices: Vec<f64> = buf.snapshot(10).iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![103.0, 104.0, 105.0]);
    }

    #[test]
    fn snapshot_returns_last_n_newest_last() {
        let buf = TradeBuffer::new(10);
        for i in 1..=5 {
            buf.append(trade(i as f64, i));
        }

        let prices: Vec<f64> = buf.snapshot(2).iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![4.0, 5.0]);
    }

    #[test]
    fn snapshot_clamps_to_current_length() {
        let buf = TradeBuffer::new(10);
        buf.append(trade(1.0, 1));
        buf.append(trade(2.0, 2));

        assert_eq!(buf.snapshot(100).len(), 2);
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let buf = TradeBuffer::new(10);
        buf.append(trade(1.0, 1));

        let snap = buf.snapshot(10);
        buf.append(trade(2.0, 2));

        assert_eq!(snap.len(), 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn latest_on_empty_returns_none() {
        let buf = TradeBuffer::new(10);
        assert!(buf.latest().is_none());
    }

    #[test]
    fn order_is_chronological_by_receipt() {
        let buf = TradeBuffer::new(4);
        for i in 1..=6 {
            buf.append(trade(50.0, i));
        }

        let times: Vec<i64> = buf.snapshot(10).iter().map(|t| t.observed_at).collect();
        assert_eq!(times, vec![3, 4, 5, 6]);
    }
}
