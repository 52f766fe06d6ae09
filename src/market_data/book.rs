//! Local L2 order book, rebuilt from snapshots and kept current by
//! sequenced deltas. A delta that does not chain onto the book's current
//! sequence is rejected so the consumer can force a resnapshot instead of
//! silently diverging.

use serde::{Deserialize, Serialize};

use crate::market_data::types::{BookLevel, Side};

/// Full book state for one market at one exchange sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub market: String,
    /// Bids sorted descending by price.
    pub bids: Vec<BookLevel>,
    /// Asks sorted ascending by price.
    pub asks: Vec<BookLevel>,
    pub seq: u64,
    pub ts_recv_ms: u64,
}

/// Incremental book update covering sequences (from_seq, to_seq].
/// A level with size 0 removes that price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDelta {
    pub market: String,
    pub from_seq: u64,
    pub to_seq: u64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub ts_recv_ms: u64,
}

/// Delta did not chain onto the book's current sequence; the caller must
/// refetch a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookGap {
    pub book_seq: u64,
    pub delta_from_seq: u64,
}

impl std::fmt::Display for BookGap {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "book at seq {} but delta chains from {}",
            self.book_seq, self.delta_from_seq
        )
    }
}

impl std::error::Error for BookGap {}

impl OrderBookSnapshot {
    pub fn new(market: impl Into<String>, seq: u64, ts_recv_ms: u64) -> Self {
        Self {
            market: market.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            seq,
            ts_recv_ms,
        }
    }

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.first().copied()
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / 2.0),
            _ => None,
        }
    }

    /// Levels a taker order of `side` would execute against.
    pub fn opposing_levels(&self, side: Side) -> &[BookLevel] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// Apply an in-sequence delta. On a sequence mismatch the book is left
    /// untouched and the gap is returned for the caller to resync.
    pub fn apply_delta(&mut self, delta: &BookDelta) -> Result<(), BookGap> {
        if delta.from_seq != self.seq {
            return Err(BookGap {
                book_seq: self.seq,
                delta_from_seq: delta.from_seq,
            });
        }

        for level in &delta.bids {
            upsert_level(&mut self.bids, *level, true);
        }
        for level in &delta.asks {
            upsert_level(&mut self.asks, *level, false);
        }

        self.seq = delta.to_seq;
        self.ts_recv_ms = delta.ts_recv_ms;
        Ok(())
    }
}

fn upsert_level(levels: &mut Vec<BookLevel>, level: BookLevel, descending: bool) {
    let pos = levels.iter().position(|l| l.price == level.price);
    match pos {
        Some(i) if level.size <= 0.0 => {
            levels.remove(i);
        }
        Some(i) => {
            levels[i].size = level.size;
        }
        None if level.size > 0.0 => {
            let insert_at = levels
                .iter()
                .position(|l| {
                    if descending {
                        l.price < level.price
                    } else {
                        l.price > level.price
                    }
                })
                .unwrap_or(levels.len());
            levels.insert(insert_at, level);
        }
        None => {} // removal of a level we never had; harmless
    }
}
