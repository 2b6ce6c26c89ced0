//! Contract every exchange adapter implements.
//!
//! The core only ever holds adapters as `Arc<dyn Exchange>`, so new
//! exchanges plug in without touching [`Ticker`] or the driver. Adapters
//! own transport and wire formats; they must acquire
//! [`Ticker::rate_gate`] before each request and write live state through
//! [`Ticker::update_state`] so the ask/bid deltas stay consistent.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::Result;
use crate::ticker::{CurrencyType, Ticker};
use crate::trades::TradeStatisticsItem;

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Exchange-specific market name, e.g. `XBTUSD`.
    fn name(&self) -> &str;

    /// Taker fee as a fraction (0.0026 for 0.26%).
    fn fee(&self) -> Decimal;

    fn host_name(&self) -> &str;

    /// Browser URL of the market's trading page.
    fn web_page_address(&self) -> String;

    /// Fetches best bid/ask, last price, volumes and 24h range.
    async fn update_ticker(&self, ticker: &Ticker) -> Result<()>;

    /// Fetches the order book down to `depth` levels per side.
    async fn update_order_book(&self, ticker: &Ticker, depth: usize) -> Result<()>;

    /// Parses a raw book payload into the ticker's book. On error the
    /// existing book is left untouched.
    fn process_order_book(&self, ticker: &Ticker, payload: &str) -> Result<()>;

    /// Fetches trades newer than the ticker's `last_trade_id` and appends
    /// them. Returns the number of new trades.
    async fn update_trades(&self, ticker: &Ticker) -> Result<usize>;

    /// Refreshes trades and aggregates everything since the previous
    /// statistic.
    async fn update_trade_statistic(&self, ticker: &Ticker) -> Result<TradeStatisticsItem> {
        self.update_trades(ticker).await?;
        Ok(ticker.append_trade_statistic(Utc::now()))
    }

    /// Reduced book refresh used when scanning many markets for
    /// cross-exchange price differences.
    async fn update_arbitrage_order_book(&self, ticker: &Ticker, depth: usize) -> Result<()>;

    /// Parses a raw payload for the arbitrage path. On error the existing
    /// book and prices are left untouched.
    fn process_arbitrage_order_book(&self, ticker: &Ticker, payload: &str) -> Result<()>;

    /// Refreshes the balance (and transfer status) of one currency.
    async fn update_balance(&self, ticker: &Ticker, currency: CurrencyType) -> Result<()>;

    async fn get_deposit_address(&self, ticker: &Ticker, currency: CurrencyType) -> Result<String>;

    /// Places a limit buy. Returns the exchange order id.
    async fn buy(&self, ticker: &Ticker, price: Decimal, amount: Decimal) -> Result<String>;

    /// Places a limit sell. Returns the exchange order id.
    async fn sell(&self, ticker: &Ticker, price: Decimal, amount: Decimal) -> Result<String>;

    /// Requests a withdrawal. Returns the exchange reference id.
    async fn withdraw(
        &self,
        ticker: &Ticker,
        currency: &str,
        address: &str,
        amount: Decimal,
    ) -> Result<String>;
}
