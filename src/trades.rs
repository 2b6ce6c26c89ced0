//! Executed trades and aggregate trade statistics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggressor side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHistoryItem {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub side: TradeSide,
    pub rate: Decimal,
    pub amount: Decimal,
    /// Bid in effect at `time`, filled from ticker history.
    pub bid: Decimal,
    /// Ask in effect at `time`, filled from ticker history.
    pub ask: Decimal,
    /// Last price in effect at `time`, filled from ticker history.
    pub current: Decimal,
}

impl TradeHistoryItem {
    /// Creates a trade whose market context is not yet known.
    pub fn new(id: i64, time: DateTime<Utc>, side: TradeSide, rate: Decimal, amount: Decimal) -> Self {
        Self {
            id,
            time,
            side,
            rate,
            amount,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            current: Decimal::ZERO,
        }
    }

    pub fn total(&self) -> Decimal {
        self.rate * self.amount
    }
}

/// Aggregates over all trades between two statistic updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStatisticsItem {
    /// End of the aggregated window.
    pub time: DateTime<Utc>,
    pub buy_count: u32,
    pub sell_count: u32,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    pub min_buy_price: Decimal,
    pub max_buy_price: Decimal,
    pub min_sell_price: Decimal,
    pub max_sell_price: Decimal,
}

impl TradeStatisticsItem {
    /// Aggregates `trades` into a statistic stamped with `time`.
    /// Price bounds stay zero for a side without trades.
    pub fn from_trades<'a>(time: DateTime<Utc>, trades: impl IntoIterator<Item = &'a TradeHistoryItem>) -> Self {
        let mut item = Self {
            time,
            buy_count: 0,
            sell_count: 0,
            buy_volume: Decimal::ZERO,
            sell_volume: Decimal::ZERO,
            min_buy_price: Decimal::ZERO,
            max_buy_price: Decimal::ZERO,
            min_sell_price: Decimal::ZERO,
            max_sell_price: Decimal::ZERO,
        };

        for trade in trades {
            match trade.side {
                TradeSide::Buy => {
                    if item.buy_count == 0 {
                        item.min_buy_price = trade.rate;
                        item.max_buy_price = trade.rate;
                    } else {
                        item.min_buy_price = item.min_buy_price.min(trade.rate);
                        item.max_buy_price = item.max_buy_price.max(trade.rate);
                    }
                    item.buy_count += 1;
                    item.buy_volume += trade.amount;
                }
                TradeSide::Sell => {
                    if item.sell_count == 0 {
                        item.min_sell_price = trade.rate;
                        item.max_sell_price = trade.rate;
                    } else {
                        item.min_sell_price = item.min_sell_price.min(trade.rate);
                        item.max_sell_price = item.max_sell_price.max(trade.rate);
                    }
                    item.sell_count += 1;
                    item.sell_volume += trade.amount;
                }
            }
        }

        item
    }

    pub fn total_count(&self) -> u32 {
        self.buy_count + self.sell_count
    }
}
