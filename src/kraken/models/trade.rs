//! Trade models for the REST `Trades` endpoint.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::trades::{TradeHistoryItem, TradeSide};
use crate::{Result, TickwatchError};

/// Parsed `Trades` result: the trades plus the cursor for the next call.
#[derive(Debug, Clone)]
pub struct TradesPage {
    pub trades: Vec<TradeHistoryItem>,
    /// Opaque cursor to pass as `since` on the next request.
    pub last: String,
}

impl TradesPage {
    /// Builds a page from the raw result object, which mixes the pair's
    /// rows with a `last` cursor key.
    ///
    /// Each row is `[price, volume, time, side, type, misc, trade_id]`.
    pub fn from_result(mut result: HashMap<String, Value>) -> Result<Self> {
        let last = match result.remove("last") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(malformed("missing last cursor")),
        };
        let rows = result
            .into_values()
            .next()
            .ok_or_else(|| malformed("missing trade rows"))?;
        let rows = rows.as_array().ok_or_else(|| malformed("trade rows not an array"))?;

        let trades = rows.iter().map(parse_row).collect::<Result<Vec<_>>>()?;
        Ok(Self { trades, last })
    }
}

fn parse_row(row: &Value) -> Result<TradeHistoryItem> {
    let fields = row.as_array().ok_or_else(|| malformed("trade row not an array"))?;
    if fields.len() < 7 {
        return Err(malformed("trade row too short"));
    }

    let rate = decimal_field(&fields[0])?;
    let amount = decimal_field(&fields[1])?;
    let time = fields[2]
        .as_f64()
        .and_then(|secs| DateTime::<Utc>::from_timestamp_micros((secs * 1e6) as i64))
        .ok_or_else(|| malformed("invalid trade time"))?;
    let side = match fields[3].as_str() {
        Some("b") => TradeSide::Buy,
        Some("s") => TradeSide::Sell,
        _ => return Err(malformed("invalid trade side")),
    };
    let id = fields[6].as_i64().ok_or_else(|| malformed("invalid trade id"))?;

    Ok(TradeHistoryItem::new(id, time, side, rate, amount))
}

fn decimal_field(value: &Value) -> Result<Decimal> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed("invalid decimal field"))
}

fn malformed(msg: &str) -> TickwatchError {
    TickwatchError::MalformedMessage(format!("trades: {msg}"))
}
