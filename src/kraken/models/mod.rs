//! Kraken REST and WebSocket V2 payload models.
//!
//! REST responses share an envelope of the form
//! `{"error": [...], "result": ...}`; [`parse_envelope`] unwraps it and
//! turns a non-empty `error` list into [`TickwatchError::Exchange`].

pub mod account;
pub mod book;
pub mod ticker;
pub mod trade;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Result, TickwatchError};

/// WebSocket V2 channels this crate subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Book,
    Ticker,
    Status,
    Heartbeat,
}

impl Channel {
    /// Returns the wire-format channel name expected by the Kraken API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Book => "book",
            Channel::Ticker => "ticker",
            Channel::Status => "status",
            Channel::Heartbeat => "heartbeat",
        }
    }
}

/// A `subscribe` request sent to the Kraken WebSocket API.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    pub method: String,
    pub params: Params,
}

impl SubscribeRequest {
    pub fn new(channel: Channel, symbols: &[String], depth: Option<usize>) -> Self {
        Self {
            method: "subscribe".to_string(),
            params: Params {
                channel: channel.as_str().to_string(),
                symbol: symbols.to_vec(),
                depth,
            },
        }
    }
}

/// Channel and symbol parameters used in subscribe requests.
#[derive(Debug, Serialize)]
pub struct Params {
    pub channel: String,
    pub symbol: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

/// Generic REST response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    /// Returns the result, or the exchange-reported errors.
    pub fn into_result(self) -> Result<T> {
        if !self.error.is_empty() {
            return Err(TickwatchError::Exchange(self.error.join(", ")));
        }
        self.result
            .ok_or_else(|| TickwatchError::MalformedMessage("missing result in response".into()))
    }
}

/// Parses a raw REST response body and unwraps its envelope.
pub fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(text)?;
    envelope.into_result()
}

/// Kraken keys per-pair results by its internal pair name (`XXBTZUSD`),
/// which differs from the requested altname (`XBTUSD`). Every per-pair
/// endpoint is queried for a single pair, so the first entry is it.
pub(crate) fn single_pair<T>(map: std::collections::HashMap<String, T>) -> Result<T> {
    map.into_values()
        .next()
        .ok_or_else(|| TickwatchError::MalformedMessage("empty pair result".into()))
}
