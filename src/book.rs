//! Bid/ask depth ladder owned by a ticker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price level in the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    /// Price of the level.
    pub value: Decimal,
    /// Size resting at this price.
    pub amount: Decimal,
}

impl OrderBookEntry {
    pub fn new(value: Decimal, amount: Decimal) -> Self {
        Self { value, amount }
    }
}

/// Order book for a single trading pair.
///
/// The book stores exactly what it is given. Callers must supply asks in
/// ascending and bids in descending price order, with non-negative prices
/// and amounts; adapters sort and merge before handing entries over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    bids: Vec<OrderBookEntry>,
    asks: Vec<OrderBookEntry>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from already-sorted sides.
    pub fn from_sides(bids: Vec<OrderBookEntry>, asks: Vec<OrderBookEntry>) -> Self {
        let mut book = Self::new();
        book.replace_bids(bids);
        book.replace_asks(asks);
        book
    }

    /// Replaces the ask side wholesale.
    pub fn replace_asks(&mut self, entries: Vec<OrderBookEntry>) {
        debug_assert!(entries.iter().all(is_non_negative));
        self.asks = entries;
    }

    /// Replaces the bid side wholesale.
    pub fn replace_bids(&mut self, entries: Vec<OrderBookEntry>) {
        debug_assert!(entries.iter().all(is_non_negative));
        self.bids = entries;
    }

    pub fn asks(&self) -> &[OrderBookEntry] {
        &self.asks
    }

    pub fn bids(&self) -> &[OrderBookEntry] {
        &self.bids
    }

    /// Lowest ask, or `None` when the ask side is empty.
    pub fn best_ask(&self) -> Option<OrderBookEntry> {
        self.asks.first().copied()
    }

    /// Highest bid, or `None` when the bid side is empty.
    pub fn best_bid(&self) -> Option<OrderBookEntry> {
        self.bids.first().copied()
    }

    /// Best ask minus best bid. Negative when the book is crossed.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.value - self.best_bid()?.value)
    }

    /// Total size resting on the bid side.
    pub fn bid_depth(&self) -> Decimal {
        self.bids.iter().map(|e| e.amount).sum()
    }

    /// Total size resting on the ask side.
    pub fn ask_depth(&self) -> Decimal {
        self.asks.iter().map(|e| e.amount).sum()
    }

    /// Keeps at most `depth` levels on each side.
    pub fn truncate(&mut self, depth: usize) {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn is_non_negative(entry: &OrderBookEntry) -> bool {
    entry.value >= Decimal::ZERO && entry.amount >= Decimal::ZERO
}
