//! Kraken WebSocket V2 feed for one ticker.
//!
//! Subscribes to the `ticker` and `book` channels and writes every message
//! straight into the [`Ticker`], so a streaming market records history
//! without polling.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use tungstenite::Message;

use super::models::Channel;
use super::models::SubscribeRequest;
use super::models::book::{BookUpdateResponse, PriceLevel};
use super::models::ticker::TickerUpdateResponse;
use crate::book::{OrderBook, OrderBookEntry};
use crate::ticker::Ticker;
use crate::{Result, TickwatchError};

/// Write half of a Kraken WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a Kraken WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns [`TickwatchError::WebSocket`] if the connection or TLS
/// handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(url).await?;
    info!(url, "WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Subscribes to a symbol-based channel. `depth` only applies to `book`.
pub async fn subscribe(
    write: &mut WsWriter,
    channel: Channel,
    symbols: &[String],
    depth: Option<usize>,
) -> Result<()> {
    let request = SubscribeRequest::new(channel, symbols, depth);
    let json = serde_json::to_string(&request)?;
    write.send(Message::Text(json.into())).await?;
    info!(channel = channel.as_str(), ?symbols, "Subscribed to channel");

    Ok(())
}

/// Connects, subscribes `symbol` to ticker and book, and feeds `ticker`
/// until the server closes the connection.
pub async fn run(url: &str, ticker: &Ticker, symbol: &str, depth: usize) -> Result<()> {
    let (mut write, mut read) = connect(url).await?;
    let symbols = [symbol.to_string()];
    subscribe(&mut write, Channel::Ticker, &symbols, None).await?;
    subscribe(&mut write, Channel::Book, &symbols, Some(depth)).await?;

    process_messages(&mut read, ticker, depth).await
}

/// Reads and applies incoming messages until the stream ends.
///
/// # Errors
///
/// Returns an error if reading fails or a message on a known channel does
/// not parse.
pub async fn process_messages(read: &mut WsReader, ticker: &Ticker, depth: usize) -> Result<()> {
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| TickwatchError::MalformedMessage(e.to_string()))?;
                dispatch_message(ticker, value, depth)?;
            }
            Message::Close(frame) => {
                info!(?frame, "WebSocket closed by server");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Routes one parsed message to the ticker.
pub fn dispatch_message(ticker: &Ticker, value: Value, depth: usize) -> Result<()> {
    if let Some(method) = value.get("method").and_then(Value::as_str) {
        let success = value.get("success").and_then(Value::as_bool);
        match success {
            Some(false) => warn!(
                method,
                error = ?value.get("error"),
                "Request rejected"
            ),
            _ => debug!(method, "Request acknowledged"),
        }
        return Ok(());
    }

    // Owned so the message can be moved into the channel handler.
    let channel = value.get("channel").and_then(Value::as_str).map(String::from);
    match channel.as_deref() {
        Some(ch) if ch == Channel::Ticker.as_str() => apply_ticker_message(ticker, value),
        Some(ch) if ch == Channel::Book.as_str() => apply_book_message(ticker, value, depth),
        Some(ch) if ch == Channel::Heartbeat.as_str() => {
            debug!("Received heartbeat");
            Ok(())
        }
        Some(ch) if ch == Channel::Status.as_str() => {
            debug!(status = %value["data"], "Status update");
            Ok(())
        }
        Some(ch) => {
            warn!(channel = ch, "Unknown channel");
            Ok(())
        }
        None => {
            warn!("Message missing channel field");
            Ok(())
        }
    }
}

/// Writes a `ticker` snapshot or update into the live state, then records
/// history and raises `Changed`.
pub fn apply_ticker_message(ticker: &Ticker, value: Value) -> Result<()> {
    let response: TickerUpdateResponse = serde_json::from_value(value)?;
    let Some(tick) = response.data.last() else {
        return Ok(());
    };

    ticker.update_state(|state| {
        state.set_lowest_ask(tick.ask);
        state.set_highest_bid(tick.bid);
        state.last = tick.last;
        state.hr24_high = tick.high;
        state.hr24_low = tick.low;
        state.volume = tick.volume;
        state.base_volume = tick.volume * tick.vwap;
        state.time = chrono::Utc::now();
    });
    debug!(symbol = tick.symbol, bid = %tick.bid, ask = %tick.ask, "Ticker update");

    ticker.update_history_item();
    ticker.raise_changed();
    Ok(())
}

/// Applies a `book` message. A snapshot replaces the book; an update is
/// merged level by level, where a zero quantity removes the level.
pub fn apply_book_message(ticker: &Ticker, value: Value, depth: usize) -> Result<()> {
    let response: BookUpdateResponse = serde_json::from_value(value)?;
    let is_snapshot = response.tpe == "snapshot";

    // Merge under the book's write lock so a REST refresh landing between
    // read and write is never overwritten by a stale copy.
    let (bids, asks) = ticker.modify_order_book(|book| {
        let (mut bids, mut asks) = if is_snapshot {
            (Vec::new(), Vec::new())
        } else {
            (book.bids().to_vec(), book.asks().to_vec())
        };
        for entry in &response.data {
            merge_levels(&mut bids, &entry.bids);
            merge_levels(&mut asks, &entry.asks);
        }
        asks.sort_by(|a, b| a.value.cmp(&b.value));
        bids.sort_by(|a, b| b.value.cmp(&a.value));

        *book = OrderBook::from_sides(bids, asks);
        book.truncate(depth);
        (book.bids().len(), book.asks().len())
    });
    debug!(msg_type = response.tpe, bids, asks, "Book applied");
    ticker.raise_changed();
    Ok(())
}

fn merge_levels(side: &mut Vec<OrderBookEntry>, levels: &[PriceLevel]) {
    for level in levels {
        let existing = side.iter().position(|e| e.value == level.price);
        match (existing, level.qty.is_zero()) {
            (Some(i), true) => {
                side.remove(i);
            }
            (Some(i), false) => side[i].amount = level.qty,
            (None, false) => side.push(OrderBookEntry::new(level.price, level.qty)),
            (None, true) => {}
        }
    }
}
