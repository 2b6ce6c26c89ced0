//! Market-state core for exchange tickers.
//!
//! A [`ticker::Ticker`] holds the live prices, order book, bounded
//! snapshot history, currency status log and trade history of one pair on
//! one exchange. Exchange adapters implement [`exchange::Exchange`] and
//! write into it; every request they issue first passes the ticker's
//! [`rate_gate::RateGate`]. The [`kraken`] module is the bundled adapter.

pub mod book;
pub mod candle;
pub mod config;
pub mod error;
pub mod exchange;
pub mod history;
pub mod kraken;
pub mod market;
pub mod rate_gate;
pub mod status;
pub mod ticker;
pub mod trades;

pub use error::{Result, TickwatchError};
