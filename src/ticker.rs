//! Live market state for one traded pair on one exchange.
//!
//! A [`Ticker`] owns the pair's order book, snapshot history, currency
//! status log, trade history, trade statistics and candles, and holds a
//! handle to the [`RateGate`] that adapters acquire before every exchange
//! request. It is shared as `Arc<Ticker>`; every collection sits behind its
//! own lock and readers only ever receive copies.
//!
//! Adapters follow an update-then-record discipline: write live state
//! (through [`Ticker::update_state`]), then call
//! [`Ticker::update_history_item`] and
//! [`Ticker::update_market_currency_status_history`].

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::book::OrderBook;
use crate::candle::CandleStickData;
use crate::history::{HistoryBuffer, HistoryConfig, HistoryEntry, SnapshotOutcome, push_bounded};
use crate::rate_gate::RateGate;
use crate::status::{StatusHistoryItem, StatusLog};
use crate::trades::{TradeHistoryItem, TradeStatisticsItem};

/// Buffered notifications per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Payload-free change notifications. Subscribers re-read state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerEvent {
    HistoryItemAdded,
    TradeHistoryItemAdded,
    Changed,
}

/// Mutable market fields of a ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketState {
    lowest_ask: Decimal,
    highest_bid: Decimal,
    /// Ask delta recorded by the most recent change of `lowest_ask`.
    ask_change: Decimal,
    /// Bid delta recorded by the most recent change of `highest_bid`.
    bid_change: Decimal,
    pub last: Decimal,
    pub hr24_high: Decimal,
    pub hr24_low: Decimal,
    pub base_volume: Decimal,
    pub volume: Decimal,
    /// Percentage change of `last` against the previous history entry.
    pub change: Decimal,
    pub time: DateTime<Utc>,
    pub is_frozen: bool,
    pub last_trade_id: i64,
    pub last_trade_statistic_time: Option<DateTime<Utc>>,
    pub candle_stick_period_min: u32,
}

impl MarketState {
    pub fn lowest_ask(&self) -> Decimal {
        self.lowest_ask
    }

    pub fn highest_bid(&self) -> Decimal {
        self.highest_bid
    }

    pub fn ask_change(&self) -> Decimal {
        self.ask_change
    }

    pub fn bid_change(&self) -> Decimal {
        self.bid_change
    }

    /// Sets the lowest ask and returns the delta against the previous
    /// value, or `None` (leaving `ask_change` untouched) if it is equal.
    pub fn set_lowest_ask(&mut self, value: Decimal) -> Option<Decimal> {
        if value == self.lowest_ask {
            return None;
        }
        let delta = value - self.lowest_ask;
        self.ask_change = delta;
        self.lowest_ask = value;
        Some(delta)
    }

    /// Sets the highest bid and returns the delta against the previous
    /// value, or `None` (leaving `bid_change` untouched) if it is equal.
    pub fn set_highest_bid(&mut self, value: Decimal) -> Option<Decimal> {
        if value == self.highest_bid {
            return None;
        }
        let delta = value - self.highest_bid;
        self.bid_change = delta;
        self.highest_bid = value;
        Some(delta)
    }

    /// Lowest ask minus highest bid; negative for a crossed book.
    pub fn spread(&self) -> Decimal {
        self.lowest_ask - self.highest_bid
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            lowest_ask: Decimal::ZERO,
            highest_bid: Decimal::ZERO,
            ask_change: Decimal::ZERO,
            bid_change: Decimal::ZERO,
            last: Decimal::ZERO,
            hr24_high: Decimal::ZERO,
            hr24_low: Decimal::ZERO,
            base_volume: Decimal::ZERO,
            volume: Decimal::ZERO,
            change: Decimal::ZERO,
            time: DateTime::<Utc>::UNIX_EPOCH,
            is_frozen: false,
            last_trade_id: 0,
            last_trade_statistic_time: None,
            candle_stick_period_min: 1,
        }
    }
}

/// Account balances for the two currencies of the pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub base_currency: Decimal,
    pub market_currency: Decimal,
    /// Available plus reserved in open orders.
    pub market_currency_total: Decimal,
    /// Whether the exchange currently allows the market currency to move.
    pub market_currency_enabled: bool,
}

/// Which side of the pair an account operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyType {
    Base,
    Market,
}

#[derive(Debug)]
pub struct Ticker {
    base_currency: String,
    market_currency: String,
    host_name: String,
    history_config: HistoryConfig,
    state: RwLock<MarketState>,
    balances: RwLock<Balances>,
    order_book: RwLock<OrderBook>,
    history: Mutex<HistoryBuffer>,
    status_history: Mutex<StatusLog>,
    trade_history: RwLock<VecDeque<TradeHistoryItem>>,
    trade_statistic: RwLock<Vec<TradeStatisticsItem>>,
    candle_stick_data: RwLock<Vec<CandleStickData>>,
    rate_gate: Arc<RateGate>,
    events: broadcast::Sender<TickerEvent>,
}

impl Ticker {
    /// Creates a ticker with default history limits and its own rate gate.
    ///
    /// `market_currency` is the traded asset and `base_currency` the one
    /// prices are quoted in.
    pub fn new(
        base_currency: impl Into<String>,
        market_currency: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        let history_config = HistoryConfig::default();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            base_currency: base_currency.into(),
            market_currency: market_currency.into(),
            host_name: host_name.into(),
            history_config,
            state: RwLock::new(MarketState::default()),
            balances: RwLock::new(Balances::default()),
            order_book: RwLock::new(OrderBook::new()),
            history: Mutex::new(HistoryBuffer::new(history_config)),
            status_history: Mutex::new(StatusLog::new()),
            trade_history: RwLock::new(VecDeque::new()),
            trade_statistic: RwLock::new(Vec::new()),
            candle_stick_data: RwLock::new(Vec::new()),
            rate_gate: Arc::new(RateGate::default()),
            events,
        }
    }

    /// Replaces the history limits. Call before the ticker is shared.
    ///
    /// # Errors
    ///
    /// Returns [`TickwatchError::Config`](crate::TickwatchError::Config)
    /// if the limits fail [`HistoryConfig::validate`].
    pub fn with_history_config(mut self, config: HistoryConfig) -> crate::Result<Self> {
        config.validate()?;
        self.history_config = config;
        self.history = Mutex::new(HistoryBuffer::new(config));
        Ok(self)
    }

    /// Uses `gate` instead of a private one, e.g. to share one budget
    /// across every ticker of an exchange.
    #[must_use]
    pub fn with_rate_gate(mut self, gate: Arc<RateGate>) -> Self {
        self.rate_gate = gate;
        self
    }

    // -- Identity --

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn market_currency(&self) -> &str {
        &self.market_currency
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Gate to acquire before each request issued on behalf of this ticker.
    pub fn rate_gate(&self) -> &Arc<RateGate> {
        &self.rate_gate
    }

    // -- Live state --

    /// Copy of the current live state.
    pub fn state(&self) -> MarketState {
        self.state.read().clone()
    }

    /// Applies a batch of live-state changes under one write lock.
    pub fn update_state<R>(&self, f: impl FnOnce(&mut MarketState) -> R) -> R {
        f(&mut self.state.write())
    }

    pub fn spread(&self) -> Decimal {
        self.state.read().spread()
    }

    pub fn balances(&self) -> Balances {
        self.balances.read().clone()
    }

    pub fn update_balances<R>(&self, f: impl FnOnce(&mut Balances) -> R) -> R {
        f(&mut self.balances.write())
    }

    pub fn market_currency_enabled(&self) -> bool {
        self.balances.read().market_currency_enabled
    }

    // -- Order book --

    pub fn order_book(&self) -> OrderBook {
        self.order_book.read().clone()
    }

    /// Swaps in a fully built book. Parsers build the new book first so a
    /// failed parse never leaves a partially written one behind.
    pub fn replace_order_book(&self, book: OrderBook) {
        *self.order_book.write() = book;
    }

    /// Runs `f` on the book under its write lock, so an incremental merge
    /// cannot interleave with a concurrent replace.
    pub fn modify_order_book<R>(&self, f: impl FnOnce(&mut OrderBook) -> R) -> R {
        f(&mut self.order_book.write())
    }

    // -- History --

    /// Records the current ask/bid/last stamped with the state's own
    /// update time (`MarketState::time`), which adapters set on refresh.
    pub fn update_history_item(&self) -> bool {
        let time = self.state.read().time;
        self.update_history_item_at(time)
    }

    /// Records the current ask/bid/last stamped with `time`.
    ///
    /// Returns `true` and raises [`TickerEvent::HistoryItemAdded`] when an
    /// entry was appended; derived change, bid change and ask change are
    /// written back into the live state.
    pub fn update_history_item_at(&self, time: DateTime<Utc>) -> bool {
        let mut history = self.history.lock();
        let (ask, bid, last) = {
            let state = self.state.read();
            (state.lowest_ask, state.highest_bid, state.last)
        };

        let SnapshotOutcome::Appended(deltas) = history.record_snapshot(time, ask, bid, last) else {
            return false;
        };

        if let Some(deltas) = deltas {
            let mut state = self.state.write();
            state.change = deltas.change_percent;
            if let Some(bid_change) = deltas.bid_change {
                state.bid_change = bid_change;
            }
            if let Some(ask_change) = deltas.ask_change {
                state.ask_change = ask_change;
            }
        }
        let len = history.len();
        drop(history);

        debug!(
            pair = %self.pair(),
            len,
            %ask,
            %bid,
            %last,
            "History item added"
        );
        self.raise(TickerEvent::HistoryItemAdded);
        true
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn latest_history_item(&self) -> Option<HistoryEntry> {
        self.history.lock().latest().copied()
    }

    // -- Currency status --

    /// Records `market_currency_enabled` if it changed since the last
    /// observation. Returns `true` when an entry was appended.
    pub fn update_market_currency_status_history(&self) -> bool {
        let enabled = self.market_currency_enabled();
        let recorded = self.status_history.lock().record_status(enabled, Utc::now());
        if recorded {
            info!(
                pair = %self.pair(),
                currency = %self.market_currency,
                enabled,
                "Market currency status changed"
            );
        }
        recorded
    }

    pub fn status_history(&self) -> Vec<StatusHistoryItem> {
        self.status_history.lock().items().to_vec()
    }

    // -- Trades --

    /// Fills `item`'s bid, ask and current from the newest history entry
    /// at or before the trade's time. Leaves it untouched when no such
    /// entry exists and returns whether a match was found.
    pub fn update_history_for_trade_item(&self, item: &mut TradeHistoryItem) -> bool {
        let history = self.history.lock();
        match history.nearest_at_or_before(item.time) {
            Some(h) => {
                item.bid = h.bid;
                item.ask = h.ask;
                item.current = h.current;
                true
            }
            None => false,
        }
    }

    /// Appends trades newer than `last_trade_id`, back-filled from history,
    /// and advances `last_trade_id`. Returns how many were appended.
    pub fn append_trades(&self, trades: Vec<TradeHistoryItem>) -> usize {
        let last_id = self.state.read().last_trade_id;
        let mut fresh: Vec<TradeHistoryItem> =
            trades.into_iter().filter(|t| t.id > last_id).collect();
        if fresh.is_empty() {
            return 0;
        }
        fresh.sort_by_key(|t| (t.time, t.id));

        for trade in &mut fresh {
            self.update_history_for_trade_item(trade);
        }

        let count = fresh.len();
        let max_id = fresh.iter().map(|t| t.id).max().unwrap_or(last_id);
        {
            let mut trades = self.trade_history.write();
            for trade in fresh {
                push_bounded(
                    &mut trades,
                    trade,
                    self.history_config.capacity,
                    self.history_config.evict_batch,
                );
            }
        }
        self.state.write().last_trade_id = max_id;

        debug!(pair = %self.pair(), count, last_trade_id = max_id, "Trades appended");
        self.raise(TickerEvent::TradeHistoryItemAdded);
        count
    }

    pub fn trade_history(&self) -> Vec<TradeHistoryItem> {
        self.trade_history.read().iter().cloned().collect()
    }

    /// Aggregates trades newer than the previous statistic into a new
    /// [`TradeStatisticsItem`] stamped `now`.
    pub fn append_trade_statistic(&self, now: DateTime<Utc>) -> TradeStatisticsItem {
        let since = self.state.read().last_trade_statistic_time;
        let item = {
            let trades = self.trade_history.read();
            TradeStatisticsItem::from_trades(
                now,
                trades
                    .iter()
                    .filter(|t| since.is_none_or(|s| t.time > s) && t.time <= now),
            )
        };
        self.trade_statistic.write().push(item.clone());
        self.state.write().last_trade_statistic_time = Some(now);
        item
    }

    pub fn trade_statistic(&self) -> Vec<TradeStatisticsItem> {
        self.trade_statistic.read().clone()
    }

    // -- Candles --

    /// Rebuilds candles from the trade history using the configured
    /// candle period. Returns the number of candles.
    pub fn rebuild_candles(&self) -> usize {
        let period = self.state.read().candle_stick_period_min;
        let candles = CandleStickData::aggregate(self.trade_history.read().iter(), period);
        let len = candles.len();
        *self.candle_stick_data.write() = candles;
        len
    }

    pub fn set_candle_stick_data(&self, candles: Vec<CandleStickData>) {
        *self.candle_stick_data.write() = candles;
    }

    pub fn candle_stick_data(&self) -> Vec<CandleStickData> {
        self.candle_stick_data.read().clone()
    }

    // -- Events --

    pub fn subscribe(&self) -> broadcast::Receiver<TickerEvent> {
        self.events.subscribe()
    }

    /// Signals that a batch of updates finished. Never fired implicitly.
    pub fn raise_changed(&self) {
        self.raise(TickerEvent::Changed);
    }

    fn raise(&self, event: TickerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Display form `MARKET/BASE`.
    pub fn pair(&self) -> String {
        format!("{}/{}", self.market_currency, self.base_currency)
    }
}
