//! Pairs a ticker with its exchange adapter and runs update rounds.
//!
//! The core holds no timers: an external driver (the binary's polling
//! loop, a test, a scheduler) decides when each round runs.

use std::sync::Arc;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::Result;
use crate::error::TickwatchError;
use crate::exchange::Exchange;
use crate::ticker::{CurrencyType, Ticker};

/// A ticker together with the adapter that feeds it.
#[derive(Clone)]
pub struct Market {
    ticker: Arc<Ticker>,
    exchange: Arc<dyn Exchange>,
}

impl Market {
    pub fn new(ticker: Arc<Ticker>, exchange: Arc<dyn Exchange>) -> Self {
        Self { ticker, exchange }
    }

    pub fn ticker(&self) -> &Arc<Ticker> {
        &self.ticker
    }

    pub fn exchange(&self) -> &Arc<dyn Exchange> {
        &self.exchange
    }

    /// Fetches live prices, then records history. Returns whether a new
    /// history entry was appended.
    pub async fn refresh_ticker(&self) -> Result<bool> {
        self.exchange.update_ticker(&self.ticker).await?;
        Ok(self.ticker.update_history_item())
    }

    pub async fn refresh_order_book(&self, depth: usize) -> Result<()> {
        self.exchange.update_order_book(&self.ticker, depth).await
    }

    pub async fn refresh_trades(&self) -> Result<usize> {
        self.exchange.update_trades(&self.ticker).await
    }

    /// Refreshes the market-currency balance, then records its transfer
    /// status.
    pub async fn refresh_status(&self) -> Result<bool> {
        self.exchange
            .update_balance(&self.ticker, CurrencyType::Market)
            .await?;
        Ok(self.ticker.update_market_currency_status_history())
    }

    /// Runs one full polling round and raises `Changed` once at the end.
    ///
    /// A failing step is logged and does not prevent the remaining steps;
    /// the first error is returned after `Changed` has been raised.
    pub async fn poll_once(&self, depth: usize) -> Result<()> {
        let results = [
            self.refresh_ticker().await.map(drop),
            self.refresh_order_book(depth).await,
            self.refresh_trades().await.map(drop),
        ];
        self.ticker.raise_changed();

        let mut first_err = None;
        for err in results.into_iter().filter_map(|r| r.err()) {
            warn!(market = self.exchange.name(), error = %err, "Polling step failed");
            first_err.get_or_insert(err);
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Outcome of an arbitrage scan over many markets.
#[derive(Debug, Default)]
pub struct ArbitrageScan {
    /// Names of markets whose book was refreshed.
    pub updated: Vec<String>,
    /// Markets that failed, with the reason.
    pub failed: Vec<(String, TickwatchError)>,
}

/// Best price difference found between two markets of the same pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrageOpportunity {
    pub pair: String,
    /// Host to buy on (lowest ask).
    pub buy_on: String,
    /// Host to sell on (highest bid).
    pub sell_on: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// `sell_price - buy_price`; positive when profitable before fees.
    pub spread: Decimal,
}

/// Refreshes the arbitrage book of every market concurrently.
///
/// Failures are collected, never propagated, so one unreachable market
/// does not abort the scan.
pub async fn scan_arbitrage(markets: &[Market], depth: usize) -> ArbitrageScan {
    let results = join_all(markets.iter().map(|m| async move {
        let outcome = m
            .exchange
            .update_arbitrage_order_book(&m.ticker, depth)
            .await;
        (m.exchange.name().to_string(), outcome)
    }))
    .await;

    let mut scan = ArbitrageScan::default();
    for (name, outcome) in results {
        match outcome {
            Ok(()) => scan.updated.push(name),
            Err(err) => {
                warn!(market = name, error = %err, "Arbitrage book update failed");
                scan.failed.push((name, err));
            }
        }
    }
    debug!(
        updated = scan.updated.len(),
        failed = scan.failed.len(),
        "Arbitrage scan finished"
    );
    scan
}

/// Finds the widest sell-bid minus buy-ask across hosts for `pair`,
/// ignoring markets without a two-sided price.
pub fn best_opportunity(markets: &[Market], pair: &str) -> Option<ArbitrageOpportunity> {
    let quotes: Vec<(String, Decimal, Decimal)> = markets
        .iter()
        .filter(|m| m.ticker.pair() == pair)
        .map(|m| {
            let state = m.ticker.state();
            (
                m.ticker.host_name().to_string(),
                state.lowest_ask(),
                state.highest_bid(),
            )
        })
        .filter(|(_, ask, bid)| !ask.is_zero() && !bid.is_zero())
        .collect();

    let mut best: Option<ArbitrageOpportunity> = None;
    for (buy_host, ask, _) in &quotes {
        for (sell_host, _, bid) in &quotes {
            if buy_host == sell_host {
                continue;
            }
            let spread = *bid - *ask;
            if best.as_ref().is_none_or(|b| spread > b.spread) {
                best = Some(ArbitrageOpportunity {
                    pair: pair.to_string(),
                    buy_on: buy_host.clone(),
                    sell_on: sell_host.clone(),
                    buy_price: *ask,
                    sell_price: *bid,
                    spread,
                });
            }
        }
    }
    best
}
