mod common;

use rust_decimal_macros::dec;

use tickwatch::TickwatchError;
use tickwatch::history::HistoryConfig;
use tickwatch::ticker::{Ticker, TickerEvent};
use tickwatch::trades::{TradeHistoryItem, TradeSide};

use common::at;

fn ticker() -> Ticker {
    Ticker::new("USD", "XBT", "mock.test")
}

fn set_quote(ticker: &Ticker, ask: rust_decimal::Decimal, bid: rust_decimal::Decimal, last: rust_decimal::Decimal) {
    ticker.update_state(|s| {
        s.set_lowest_ask(ask);
        s.set_highest_bid(bid);
        s.last = last;
    });
}

#[test]
fn unchanged_snapshot_is_not_recorded() {
    let ticker = ticker();
    set_quote(&ticker, dec!(101), dec!(99), dec!(100));

    assert!(ticker.update_history_item_at(at(1)));
    assert!(!ticker.update_history_item_at(at(2)));
    assert_eq!(ticker.history_len(), 1);
    assert_eq!(ticker.latest_history_item().unwrap().time, at(1));
}

#[test]
fn second_snapshot_derives_change_and_deltas() {
    let ticker = ticker();
    set_quote(&ticker, dec!(101), dec!(99), dec!(100));
    ticker.update_history_item_at(at(1));

    set_quote(&ticker, dec!(103), dec!(98), dec!(110));
    assert!(ticker.update_history_item_at(at(2)));

    let state = ticker.state();
    assert_eq!(state.change, dec!(10));
    assert_eq!(state.ask_change(), dec!(2));
    // Bid deltas keep their historical x100 scaling by default.
    assert_eq!(state.bid_change(), dec!(-100));
}

#[test]
fn bid_scaling_can_be_disabled() {
    let ticker = ticker().with_history_config(HistoryConfig {
        legacy_bid_scale: false,
        ..HistoryConfig::default()
    })
    .unwrap();
    set_quote(&ticker, dec!(101), dec!(99), dec!(100));
    ticker.update_history_item_at(at(1));
    set_quote(&ticker, dec!(101), dec!(98), dec!(100));
    ticker.update_history_item_at(at(2));

    assert_eq!(ticker.state().bid_change(), dec!(-1));
}

#[test]
fn zero_previous_last_gives_zero_change() {
    let ticker = ticker();
    set_quote(&ticker, dec!(1), dec!(1), dec!(0));
    ticker.update_history_item_at(at(1));
    set_quote(&ticker, dec!(1), dec!(1), dec!(5));
    ticker.update_history_item_at(at(2));

    assert_eq!(ticker.state().change, dec!(0));
}

#[test]
fn history_evicts_batch_when_over_capacity() {
    let ticker = ticker().with_history_config(HistoryConfig {
        capacity: 10,
        evict_batch: 4,
        legacy_bid_scale: true,
    })
    .unwrap();
    for i in 0..11 {
        set_quote(&ticker, dec!(100) + rust_decimal::Decimal::from(i), dec!(99), dec!(100));
        ticker.update_history_item_at(at(i));
    }

    let history = ticker.history();
    assert_eq!(history.len(), 7);
    assert_eq!(history[0].time, at(4));
    assert_eq!(history[6].time, at(10));
}

#[test]
fn history_limits_that_empty_the_buffer_are_rejected() {
    let err = ticker()
        .with_history_config(HistoryConfig {
            capacity: 3,
            evict_batch: 5,
            legacy_bid_scale: true,
        })
        .unwrap_err();
    assert!(matches!(err, TickwatchError::Config(_)));

    let err = ticker()
        .with_history_config(HistoryConfig {
            capacity: 0,
            evict_batch: 1,
            legacy_bid_scale: true,
        })
        .unwrap_err();
    assert!(matches!(err, TickwatchError::Config(_)));
}

#[test]
fn batch_equal_to_capacity_keeps_latest_item() {
    let ticker = ticker()
        .with_history_config(HistoryConfig {
            capacity: 3,
            evict_batch: 3,
            legacy_bid_scale: true,
        })
        .unwrap();
    let mut added = Vec::new();
    for i in 0..4 {
        set_quote(&ticker, dec!(100) + rust_decimal::Decimal::from(i), dec!(99), dec!(100));
        added.push(ticker.update_history_item_at(at(i)));
    }

    assert_eq!(added, vec![true; 4]);
    assert_eq!(ticker.history_len(), 1);
    assert_eq!(ticker.latest_history_item().unwrap().time, at(3));
}

#[test]
fn trades_are_backfilled_from_history() {
    let ticker = ticker();
    set_quote(&ticker, dec!(11), dec!(10), dec!(10));
    ticker.update_history_item_at(at(1));
    set_quote(&ticker, dec!(21), dec!(20), dec!(20));
    ticker.update_history_item_at(at(5));

    let appended = ticker.append_trades(vec![
        TradeHistoryItem::new(2, at(3), TradeSide::Buy, dec!(10.5), dec!(1)),
        TradeHistoryItem::new(1, at(0), TradeSide::Sell, dec!(9), dec!(2)),
    ]);
    assert_eq!(appended, 2);

    let trades = ticker.trade_history();
    assert_eq!(trades[0].id, 1);
    assert_eq!(trades[0].bid, dec!(0));
    assert_eq!(trades[0].ask, dec!(0));
    assert_eq!(trades[1].id, 2);
    assert_eq!(trades[1].bid, dec!(10));
    assert_eq!(trades[1].ask, dec!(11));
    assert_eq!(trades[1].current, dec!(10));
    assert_eq!(ticker.state().last_trade_id, 2);
}

#[test]
fn trades_at_or_below_last_id_are_skipped() {
    let ticker = ticker();
    ticker.append_trades(vec![TradeHistoryItem::new(5, at(1), TradeSide::Buy, dec!(1), dec!(1))]);

    let appended = ticker.append_trades(vec![
        TradeHistoryItem::new(5, at(1), TradeSide::Buy, dec!(1), dec!(1)),
        TradeHistoryItem::new(4, at(1), TradeSide::Buy, dec!(1), dec!(1)),
        TradeHistoryItem::new(6, at(2), TradeSide::Sell, dec!(1), dec!(1)),
    ]);
    assert_eq!(appended, 1);
    assert_eq!(ticker.trade_history().len(), 2);
    assert_eq!(ticker.state().last_trade_id, 6);
}

#[test]
fn trade_statistic_covers_trades_since_previous() {
    let ticker = ticker();
    ticker.append_trades(vec![
        TradeHistoryItem::new(1, at(1), TradeSide::Buy, dec!(10), dec!(1)),
        TradeHistoryItem::new(2, at(2), TradeSide::Sell, dec!(12), dec!(3)),
    ]);
    let first = ticker.append_trade_statistic(at(5));
    assert_eq!(first.buy_count, 1);
    assert_eq!(first.sell_count, 1);
    assert_eq!(first.sell_volume, dec!(3));

    ticker.append_trades(vec![TradeHistoryItem::new(3, at(6), TradeSide::Buy, dec!(11), dec!(2))]);
    let second = ticker.append_trade_statistic(at(10));
    assert_eq!(second.total_count(), 1);
    assert_eq!(second.buy_volume, dec!(2));
    assert_eq!(ticker.trade_statistic().len(), 2);
    assert_eq!(ticker.state().last_trade_statistic_time, Some(at(10)));
}

#[test]
fn candles_rebuild_from_trades() {
    let ticker = ticker();
    ticker.append_trades(vec![
        TradeHistoryItem::new(1, at(0), TradeSide::Buy, dec!(10), dec!(1)),
        TradeHistoryItem::new(2, at(30), TradeSide::Buy, dec!(12), dec!(1)),
        TradeHistoryItem::new(3, at(61), TradeSide::Sell, dec!(11), dec!(1)),
    ]);
    assert_eq!(ticker.rebuild_candles(), 2);

    let candles = ticker.candle_stick_data();
    assert_eq!(candles[0].open, dec!(10));
    assert_eq!(candles[0].close, dec!(12));
    assert_eq!(candles[1].open, dec!(11));
}

#[test]
fn status_history_records_only_changes() {
    let ticker = ticker();
    assert!(ticker.update_market_currency_status_history());
    assert!(!ticker.update_market_currency_status_history());

    ticker.update_balances(|b| b.market_currency_enabled = true);
    assert!(ticker.update_market_currency_status_history());
    assert!(!ticker.update_market_currency_status_history());

    let log = ticker.status_history();
    assert_eq!(log.len(), 2);
    assert!(!log[0].enabled);
    assert!(log[1].enabled);
}

#[tokio::test]
async fn events_follow_updates() {
    let ticker = ticker();
    let mut events = ticker.subscribe();

    set_quote(&ticker, dec!(2), dec!(1), dec!(1));
    ticker.update_history_item_at(at(1));
    ticker.update_history_item_at(at(2));
    ticker.append_trades(vec![TradeHistoryItem::new(1, at(1), TradeSide::Buy, dec!(1), dec!(1))]);
    ticker.raise_changed();

    assert_eq!(events.recv().await.unwrap(), TickerEvent::HistoryItemAdded);
    assert_eq!(events.recv().await.unwrap(), TickerEvent::TradeHistoryItemAdded);
    assert_eq!(events.recv().await.unwrap(), TickerEvent::Changed);
    assert!(events.try_recv().is_err());
}

#[test]
fn reads_return_copies() {
    let ticker = ticker();
    set_quote(&ticker, dec!(2), dec!(1), dec!(1));
    let mut snapshot = ticker.state();
    snapshot.last = dec!(999);
    assert_eq!(ticker.state().last, dec!(1));
    assert_eq!(ticker.pair(), "XBT/USD");
}
