//! Order book models: REST `Depth` endpoint and the WebSocket `book` channel.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::book::OrderBookEntry;

/// Per-pair entry of the REST `Depth` result.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthInfo {
    pub asks: Vec<DepthLevel>,
    pub bids: Vec<DepthLevel>,
}

/// One REST depth row: price, volume, unix timestamp.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DepthLevel(pub Decimal, pub Decimal, pub i64);

impl From<&DepthLevel> for OrderBookEntry {
    fn from(level: &DepthLevel) -> Self {
        OrderBookEntry::new(level.0, level.1)
    }
}

/// An update message from the `book` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct BookUpdateResponse {
    pub channel: String,
    /// `"snapshot"` or `"update"`.
    #[serde(rename = "type")]
    pub tpe: String,
    pub data: Vec<BookData>,
}

/// Order book snapshot or incremental update for a single trading pair.
#[derive(Debug, Clone, Deserialize)]
pub struct BookData {
    pub symbol: String,
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
    /// CRC32 checksum used to verify order book integrity.
    pub checksum: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A single price level in the order book. A zero `qty` in an update
/// removes the level.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub qty: Decimal,
}
