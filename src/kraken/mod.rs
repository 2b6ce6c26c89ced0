//! Kraken exchange adapter.
//!
//! [`KrakenClient`] wraps the REST API (public and signed private calls);
//! [`KrakenMarket`] implements [`Exchange`] for one pair on top of it.
//! Every request first acquires the ticker's rate gate.

pub mod auth;
pub mod models;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::book::{OrderBook, OrderBookEntry};
use crate::config::{KrakenConfig, MarketConfig};
use crate::exchange::Exchange;
use crate::rate_gate::RateGate;
use crate::ticker::{CurrencyType, Ticker};
use crate::{Result, TickwatchError};
use models::account::{
    AddOrderResult, AssetInfo, DepositAddress, DepositMethod, ExtendedBalance, WithdrawResult,
};
use models::book::DepthInfo;
use models::ticker::TickerInfo;
use models::trade::TradesPage;
use models::{parse_envelope, single_pair};

pub const HOST_NAME: &str = "kraken.com";

/// Kraken taker fee rate (0.26%).
const TAKER_FEE: Decimal = Decimal::from_parts(26, 0, 0, false, 4);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the Kraken REST API.
#[derive(Debug)]
pub struct KrakenClient {
    http: reqwest::Client,
    rest_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl KrakenClient {
    /// # Errors
    ///
    /// Returns [`TickwatchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &KrakenConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            rest_url: config.rest_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// Issues a public GET and returns the raw body.
    pub async fn public_text(
        &self,
        gate: &RateGate,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<String> {
        gate.acquire().await;
        let url = format!("{}/0/public/{method}", self.rest_url);
        debug!(method, "Kraken public request");

        let response = self.http.get(&url).query(query).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    /// Issues a public GET and unwraps the response envelope.
    pub async fn public<T: DeserializeOwned>(
        &self,
        gate: &RateGate,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        parse_envelope(&self.public_text(gate, method, query).await?)
    }

    /// Issues a signed private POST and unwraps the response envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TickwatchError::Config`] when no credentials are
    /// configured, besides the usual transport and exchange errors.
    pub async fn private<T: DeserializeOwned>(
        &self,
        gate: &RateGate,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let (Some(api_key), Some(api_secret)) = (&self.api_key, &self.api_secret) else {
            return Err(TickwatchError::Config(format!(
                "{method} requires KRAKEN_API_KEY and KRAKEN_API_SECRET"
            )));
        };

        // Nonces must reach Kraken in increasing order, so take it after
        // the gate rather than before queueing.
        gate.acquire().await;
        let path = format!("/0/private/{method}");
        let nonce = auth::next_nonce();
        let body = auth::post_data(nonce, params);
        let signature = auth::sign(api_secret, &path, nonce, &body)?;
        debug!(method, "Kraken private request");

        let response = self
            .http
            .post(format!("{}{path}", self.rest_url))
            .header("API-Key", api_key)
            .header("API-Sign", &signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let text = response.error_for_status()?.text().await?;
        parse_envelope(&text)
    }
}

/// One Kraken pair, e.g. `XBTUSD`.
#[derive(Debug)]
pub struct KrakenMarket {
    client: Arc<KrakenClient>,
    pair: String,
    market_asset: String,
    base_asset: String,
    /// `last` cursor from the previous `Trades` call.
    trade_cursor: Mutex<Option<String>>,
}

impl KrakenMarket {
    pub fn new(client: Arc<KrakenClient>, config: &MarketConfig) -> Self {
        Self {
            client,
            pair: config.pair.clone(),
            market_asset: config.market.clone(),
            base_asset: config.base.clone(),
            trade_cursor: Mutex::new(None),
        }
    }

    /// Creates the ticker this market feeds.
    pub fn ticker(config: &MarketConfig) -> Ticker {
        Ticker::new(&config.base, &config.market, HOST_NAME)
    }

    fn asset(&self, currency: CurrencyType) -> &str {
        match currency {
            CurrencyType::Base => &self.base_asset,
            CurrencyType::Market => &self.market_asset,
        }
    }

    fn depth_query(&self, depth: usize) -> [(&'static str, String); 2] {
        [("pair", self.pair.clone()), ("count", depth.to_string())]
    }

    async fn add_order(&self, ticker: &Ticker, side: &str, price: Decimal, amount: Decimal) -> Result<String> {
        let result: AddOrderResult = self
            .client
            .private(
                ticker.rate_gate(),
                "AddOrder",
                &[
                    ("ordertype", "limit".to_string()),
                    ("type", side.to_string()),
                    ("volume", amount.to_string()),
                    ("pair", self.pair.clone()),
                    ("price", price.to_string()),
                ],
            )
            .await?;

        let txid = result
            .txid
            .into_iter()
            .next()
            .ok_or_else(|| TickwatchError::MalformedMessage("AddOrder returned no txid".into()))?;
        info!(
            pair = self.pair,
            side,
            %price,
            %amount,
            txid,
            order = result.descr.order,
            "Order placed"
        );
        Ok(txid)
    }
}

#[async_trait]
impl Exchange for KrakenMarket {
    fn name(&self) -> &str {
        &self.pair
    }

    fn fee(&self) -> Decimal {
        TAKER_FEE
    }

    fn host_name(&self) -> &str {
        HOST_NAME
    }

    fn web_page_address(&self) -> String {
        format!(
            "https://pro.kraken.com/app/trade/{}-{}",
            self.market_asset.to_lowercase(),
            self.base_asset.to_lowercase()
        )
    }

    async fn update_ticker(&self, ticker: &Ticker) -> Result<()> {
        let result: HashMap<String, TickerInfo> = self
            .client
            .public(ticker.rate_gate(), "Ticker", &[("pair", self.pair.clone())])
            .await?;
        let info = single_pair(result)?;

        ticker.update_state(|state| {
            state.set_lowest_ask(info.ask());
            state.set_highest_bid(info.bid());
            state.last = info.last();
            state.hr24_high = info.high_24h();
            state.hr24_low = info.low_24h();
            state.volume = info.volume_24h();
            state.base_volume = info.quote_volume_24h();
            state.time = Utc::now();
        });
        Ok(())
    }

    async fn update_order_book(&self, ticker: &Ticker, depth: usize) -> Result<()> {
        let text = self
            .client
            .public_text(ticker.rate_gate(), "Depth", &self.depth_query(depth))
            .await?;
        self.process_order_book(ticker, &text)
    }

    fn process_order_book(&self, ticker: &Ticker, payload: &str) -> Result<()> {
        let book = parse_depth(payload)?;
        debug!(
            pair = self.pair,
            bids = book.bids().len(),
            asks = book.asks().len(),
            "Order book replaced"
        );
        ticker.replace_order_book(book);
        Ok(())
    }

    async fn update_trades(&self, ticker: &Ticker) -> Result<usize> {
        let mut query = vec![("pair", self.pair.clone())];
        if let Some(since) = self.trade_cursor.lock().clone() {
            query.push(("since", since));
        }

        let result: HashMap<String, Value> = self
            .client
            .public(ticker.rate_gate(), "Trades", &query)
            .await?;
        let page = TradesPage::from_result(result)?;

        *self.trade_cursor.lock() = Some(page.last);
        Ok(ticker.append_trades(page.trades))
    }

    async fn update_arbitrage_order_book(&self, ticker: &Ticker, depth: usize) -> Result<()> {
        let text = self
            .client
            .public_text(ticker.rate_gate(), "Depth", &self.depth_query(depth))
            .await?;
        self.process_arbitrage_order_book(ticker, &text)
    }

    fn process_arbitrage_order_book(&self, ticker: &Ticker, payload: &str) -> Result<()> {
        let book = parse_depth(payload)?;
        let (Some(ask), Some(bid)) = (book.best_ask(), book.best_bid()) else {
            return Err(TickwatchError::MalformedMessage(format!(
                "{}: one-sided book",
                self.pair
            )));
        };

        ticker.update_state(|state| {
            state.set_lowest_ask(ask.value);
            state.set_highest_bid(bid.value);
            state.time = Utc::now();
        });
        ticker.replace_order_book(book);
        Ok(())
    }

    async fn update_balance(&self, ticker: &Ticker, currency: CurrencyType) -> Result<()> {
        let asset = self.asset(currency).to_string();
        let balances: HashMap<String, ExtendedBalance> = self
            .client
            .private(ticker.rate_gate(), "BalanceEx", &[])
            .await?;
        let balance = asset_balance(&balances, &asset);

        match currency {
            CurrencyType::Base => {
                ticker.update_balances(|b| b.base_currency = balance.available());
            }
            CurrencyType::Market => {
                let assets: HashMap<String, AssetInfo> = self
                    .client
                    .public(ticker.rate_gate(), "Assets", &[("asset", asset.clone())])
                    .await?;
                let enabled = single_pair(assets)?.is_enabled();
                ticker.update_balances(|b| {
                    b.market_currency = balance.available();
                    b.market_currency_total = balance.balance;
                    b.market_currency_enabled = enabled;
                });
            }
        }
        debug!(pair = self.pair, asset, balance = %balance.balance, "Balance updated");
        Ok(())
    }

    async fn get_deposit_address(&self, ticker: &Ticker, currency: CurrencyType) -> Result<String> {
        let asset = self.asset(currency).to_string();
        let methods: Vec<DepositMethod> = self
            .client
            .private(ticker.rate_gate(), "DepositMethods", &[("asset", asset.clone())])
            .await?;
        let method = methods
            .into_iter()
            .next()
            .ok_or_else(|| TickwatchError::Exchange(format!("no deposit method for {asset}")))?
            .method;

        let addresses: Vec<DepositAddress> = self
            .client
            .private(
                ticker.rate_gate(),
                "DepositAddresses",
                &[("asset", asset.clone()), ("method", method)],
            )
            .await?;
        addresses
            .into_iter()
            .next()
            .map(|a| a.address)
            .ok_or_else(|| TickwatchError::Exchange(format!("no deposit address for {asset}")))
    }

    async fn buy(&self, ticker: &Ticker, price: Decimal, amount: Decimal) -> Result<String> {
        self.add_order(ticker, "buy", price, amount).await
    }

    async fn sell(&self, ticker: &Ticker, price: Decimal, amount: Decimal) -> Result<String> {
        self.add_order(ticker, "sell", price, amount).await
    }

    async fn withdraw(
        &self,
        ticker: &Ticker,
        currency: &str,
        address: &str,
        amount: Decimal,
    ) -> Result<String> {
        // Kraken withdraws to a pre-registered address referenced by its key name.
        let result: WithdrawResult = self
            .client
            .private(
                ticker.rate_gate(),
                "Withdraw",
                &[
                    ("asset", currency.to_string()),
                    ("key", address.to_string()),
                    ("amount", amount.to_string()),
                ],
            )
            .await?;
        info!(asset = currency, %amount, refid = result.refid, "Withdrawal requested");
        Ok(result.refid)
    }
}

/// Parses a REST `Depth` body into a book. Kraken already returns asks
/// ascending and bids descending.
fn parse_depth(payload: &str) -> Result<OrderBook> {
    let result: HashMap<String, DepthInfo> = parse_envelope(payload)?;
    let depth = single_pair(result)?;
    Ok(OrderBook::from_sides(
        depth.bids.iter().map(OrderBookEntry::from).collect(),
        depth.asks.iter().map(OrderBookEntry::from).collect(),
    ))
}

/// Balance of `asset`, or zero when the account holds none. An asset
/// Kraken never lists is also zero, so the miss is logged to surface a
/// misspelt asset code.
fn asset_balance(balances: &HashMap<String, ExtendedBalance>, asset: &str) -> ExtendedBalance {
    lookup_asset(balances, asset).copied().unwrap_or_else(|| {
        warn!(asset, known = balances.len(), "Asset missing from BalanceEx, using zero");
        ExtendedBalance {
            balance: Decimal::ZERO,
            hold_trade: Decimal::ZERO,
        }
    })
}

/// Kraken prefixes legacy asset codes with `X` (crypto) or `Z` (fiat).
fn lookup_asset<'a, T>(map: &'a HashMap<String, T>, asset: &str) -> Option<&'a T> {
    map.get(asset)
        .or_else(|| map.get(&format!("X{asset}")))
        .or_else(|| map.get(&format!("Z{asset}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market() -> KrakenMarket {
        let client = KrakenClient::new(&KrakenConfig {
            rest_url: "http://127.0.0.1:9".to_string(),
            websocket_url: "ws://127.0.0.1:9".to_string(),
            api_key: None,
            api_secret: None,
        })
        .unwrap();
        KrakenMarket::new(Arc::new(client), &MarketConfig {
            pair: "XBTUSD".to_string(),
            market: "XBT".to_string(),
            base: "USD".to_string(),
            poll_interval_ms: 1_000,
            book_depth: 10,
            stream: false,
        })
    }

    #[test]
    fn taker_fee_is_26_bps() {
        assert_eq!(TAKER_FEE, dec!(0.0026));
        assert_eq!(market().fee(), dec!(0.0026));
    }

    #[test]
    fn web_page_uses_lowercase_assets() {
        assert_eq!(
            market().web_page_address(),
            "https://pro.kraken.com/app/trade/xbt-usd"
        );
    }

    #[test]
    fn lookup_asset_tries_legacy_prefixes() {
        let mut map = HashMap::new();
        map.insert("XXBT".to_string(), 1);
        map.insert("ZUSD".to_string(), 2);
        map.insert("SOL".to_string(), 3);
        assert_eq!(lookup_asset(&map, "XBT"), Some(&1));
        assert_eq!(lookup_asset(&map, "USD"), Some(&2));
        assert_eq!(lookup_asset(&map, "SOL"), Some(&3));
        assert_eq!(lookup_asset(&map, "ETH"), None);
    }

    #[test]
    fn missing_asset_balance_is_zero() {
        let mut balances = HashMap::new();
        balances.insert(
            "XXBT".to_string(),
            ExtendedBalance {
                balance: dec!(2),
                hold_trade: dec!(0.5),
            },
        );
        assert_eq!(asset_balance(&balances, "XBT").available(), dec!(1.5));

        let missing = asset_balance(&balances, "XTB");
        assert_eq!(missing.balance, Decimal::ZERO);
        assert_eq!(missing.available(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn private_call_without_credentials_is_config_error() {
        let market = market();
        let ticker = KrakenMarket::ticker(&crate::config::MarketsConfig::default().markets[0]);
        let err = market.buy(&ticker, dec!(1), dec!(1)).await.unwrap_err();
        assert!(matches!(err, TickwatchError::Config(_)));
    }
}
