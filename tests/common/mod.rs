//! Shared test utilities: an in-memory exchange adapter.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use tickwatch::book::OrderBook;
use tickwatch::exchange::Exchange;
use tickwatch::ticker::{CurrencyType, Ticker};
use tickwatch::trades::TradeHistoryItem;
use tickwatch::{Result, TickwatchError};

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Adapter serving canned data. Every update acquires the ticker's gate.
#[derive(Default)]
pub struct MockExchange {
    pub name: String,
    pub quote: Mutex<(Decimal, Decimal, Decimal)>,
    pub book: Mutex<OrderBook>,
    pub trades: Mutex<Vec<TradeHistoryItem>>,
    pub enabled: Mutex<bool>,
    pub fail_ticker: bool,
    pub fail_book: bool,
    pub requests: AtomicUsize,
}

impl MockExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: Mutex::new(true),
            ..Self::default()
        }
    }

    /// Sets ask, bid and last served by `update_ticker`.
    pub fn set_quote(&self, ask: Decimal, bid: Decimal, last: Decimal) {
        *self.quote.lock() = (ask, bid, last);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn request(&self, ticker: &Ticker) {
        ticker.rate_gate().acquire().await;
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn name(&self) -> &str {
        &self.name
    }

    fn fee(&self) -> Decimal {
        Decimal::new(1, 3)
    }

    fn host_name(&self) -> &str {
        "mock.test"
    }

    fn web_page_address(&self) -> String {
        format!("https://mock.test/{}", self.name)
    }

    async fn update_ticker(&self, ticker: &Ticker) -> Result<()> {
        self.request(ticker).await;
        if self.fail_ticker {
            return Err(TickwatchError::Exchange("ticker unavailable".into()));
        }
        let (ask, bid, last) = *self.quote.lock();
        ticker.update_state(|state| {
            state.set_lowest_ask(ask);
            state.set_highest_bid(bid);
            state.last = last;
            state.time = Utc::now();
        });
        Ok(())
    }

    async fn update_order_book(&self, ticker: &Ticker, depth: usize) -> Result<()> {
        self.request(ticker).await;
        if self.fail_book {
            return Err(TickwatchError::Exchange("book unavailable".into()));
        }
        let mut book = self.book.lock().clone();
        book.truncate(depth);
        ticker.replace_order_book(book);
        Ok(())
    }

    fn process_order_book(&self, ticker: &Ticker, payload: &str) -> Result<()> {
        let book: OrderBook = serde_json::from_str(payload)?;
        ticker.replace_order_book(book);
        Ok(())
    }

    async fn update_trades(&self, ticker: &Ticker) -> Result<usize> {
        self.request(ticker).await;
        let trades = self.trades.lock().clone();
        Ok(ticker.append_trades(trades))
    }

    async fn update_arbitrage_order_book(&self, ticker: &Ticker, depth: usize) -> Result<()> {
        self.update_order_book(ticker, depth).await?;
        let book = ticker.order_book();
        if let (Some(ask), Some(bid)) = (book.best_ask(), book.best_bid()) {
            ticker.update_state(|state| {
                state.set_lowest_ask(ask.value);
                state.set_highest_bid(bid.value);
            });
        }
        Ok(())
    }

    fn process_arbitrage_order_book(&self, ticker: &Ticker, payload: &str) -> Result<()> {
        self.process_order_book(ticker, payload)
    }

    async fn update_balance(&self, ticker: &Ticker, currency: CurrencyType) -> Result<()> {
        self.request(ticker).await;
        if currency == CurrencyType::Market {
            let enabled = *self.enabled.lock();
            ticker.update_balances(|b| b.market_currency_enabled = enabled);
        }
        Ok(())
    }

    async fn get_deposit_address(&self, _ticker: &Ticker, _currency: CurrencyType) -> Result<String> {
        Err(TickwatchError::Unsupported("deposit addresses"))
    }

    async fn buy(&self, _ticker: &Ticker, _price: Decimal, _amount: Decimal) -> Result<String> {
        Err(TickwatchError::Unsupported("trading"))
    }

    async fn sell(&self, _ticker: &Ticker, _price: Decimal, _amount: Decimal) -> Result<String> {
        Err(TickwatchError::Unsupported("trading"))
    }

    async fn withdraw(
        &self,
        _ticker: &Ticker,
        _currency: &str,
        _address: &str,
        _amount: Decimal,
    ) -> Result<String> {
        Err(TickwatchError::Unsupported("withdrawals"))
    }
}
