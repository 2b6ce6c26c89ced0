//! OHLC candlestick bars.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trades::TradeHistoryItem;

/// A single OHLC candlestick bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleStickData {
    /// Start of this candle's time window.
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl CandleStickData {
    /// Buckets trades into candles of `period_min` minutes.
    ///
    /// Trades are expected in chronological order; open and close are the
    /// first and last trade seen in each bucket.
    pub fn aggregate<'a>(
        trades: impl IntoIterator<Item = &'a TradeHistoryItem>,
        period_min: u32,
    ) -> Vec<CandleStickData> {
        let period_secs = i64::from(period_min.max(1)) * 60;
        let mut buckets: BTreeMap<i64, CandleStickData> = BTreeMap::new();

        for trade in trades {
            let start = trade.time.timestamp().div_euclid(period_secs) * period_secs;
            buckets
                .entry(start)
                .and_modify(|c| {
                    c.high = c.high.max(trade.rate);
                    c.low = c.low.min(trade.rate);
                    c.close = trade.rate;
                    c.volume += trade.amount;
                })
                .or_insert_with(|| CandleStickData {
                    time: DateTime::from_timestamp(start, 0).unwrap_or(trade.time),
                    open: trade.rate,
                    high: trade.rate,
                    low: trade.rate,
                    close: trade.rate,
                    volume: trade.amount,
                });
        }

        buckets.into_values().collect()
    }
}
