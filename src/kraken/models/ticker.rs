//! Ticker models: REST `Ticker` endpoint and the WebSocket `ticker` channel.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Per-pair entry of the REST `Ticker` result.
///
/// Kraken encodes every figure as a string inside short arrays, with the
/// "today" value first and the rolling 24h value second.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerInfo {
    /// Ask: price, whole lot volume, lot volume.
    pub a: [Decimal; 3],
    /// Bid: price, whole lot volume, lot volume.
    pub b: [Decimal; 3],
    /// Last trade closed: price, lot volume.
    pub c: [Decimal; 2],
    /// Volume: today, last 24h.
    pub v: [Decimal; 2],
    /// Volume-weighted average price: today, last 24h.
    pub p: [Decimal; 2],
    /// Low: today, last 24h.
    pub l: [Decimal; 2],
    /// High: today, last 24h.
    pub h: [Decimal; 2],
    /// Today's opening price.
    pub o: Decimal,
}

impl TickerInfo {
    pub fn ask(&self) -> Decimal {
        self.a[0]
    }

    pub fn bid(&self) -> Decimal {
        self.b[0]
    }

    pub fn last(&self) -> Decimal {
        self.c[0]
    }

    /// 24h volume in the traded asset.
    pub fn volume_24h(&self) -> Decimal {
        self.v[1]
    }

    /// 24h volume in the quote currency, from volume times VWAP.
    pub fn quote_volume_24h(&self) -> Decimal {
        self.v[1] * self.p[1]
    }

    pub fn high_24h(&self) -> Decimal {
        self.h[1]
    }

    pub fn low_24h(&self) -> Decimal {
        self.l[1]
    }
}

/// An update message from the WebSocket `ticker` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerUpdateResponse {
    pub channel: String,
    #[serde(rename = "type")]
    pub tpe: String,
    pub data: Vec<TickerData>,
}

/// Level-1 quote for a single trading pair.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerData {
    pub symbol: String,
    pub bid: Decimal,
    pub bid_qty: Decimal,
    pub ask: Decimal,
    pub ask_qty: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub vwap: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    pub change: Decimal,
    pub change_pct: Decimal,
}
