use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tickwatch::TickwatchError;
use tickwatch::config::{MarketConfig, MarketsConfig, RateGateScope, fetch_config};
use tickwatch::kraken::{self, KrakenClient, KrakenMarket};
use tickwatch::market::Market;
use tickwatch::rate_gate::RateGate;
use tickwatch::ticker::{Ticker, TickerEvent};

/// Delay before reconnecting a dropped WebSocket feed.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), TickwatchError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_config = fetch_config()?;
    let markets_config = match std::env::var_os("TICKWATCH_MARKETS_FILE") {
        Some(path) => MarketsConfig::load(&PathBuf::from(path))?,
        None => MarketsConfig::default(),
    };

    let client = Arc::new(KrakenClient::new(&app_config.kraken)?);
    let shared_gate = Arc::new(RateGate::new(
        app_config.rate_gate.permits,
        app_config.rate_gate.window,
    ));
    let with_credentials = app_config.kraken.has_credentials();

    let mut tasks = JoinSet::new();
    for market_config in &markets_config.markets {
        let gate = match app_config.rate_gate.scope {
            RateGateScope::Exchange => Arc::clone(&shared_gate),
            RateGateScope::Ticker => Arc::new(RateGate::new(
                app_config.rate_gate.permits,
                app_config.rate_gate.window,
            )),
        };
        let ticker = Arc::new(
            KrakenMarket::ticker(market_config)
                .with_history_config(app_config.history)?
                .with_rate_gate(gate),
        );
        let market = Market::new(
            Arc::clone(&ticker),
            Arc::new(KrakenMarket::new(Arc::clone(&client), market_config)),
        );
        info!(
            pair = market_config.pair,
            interval_ms = market_config.poll_interval_ms,
            stream = market_config.stream,
            "Tracking market"
        );

        tasks.spawn(log_events(Arc::clone(&ticker)));
        tasks.spawn(poll(market, market_config.clone(), with_credentials));
        if market_config.stream {
            tasks.spawn(stream(
                app_config.kraken.websocket_url.clone(),
                ticker,
                market_config.clone(),
            ));
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        Some(joined) = tasks.join_next() => {
            if let Err(e) = joined {
                error!(error = %e, "Market task aborted");
            }
        }
    }
    tasks.shutdown().await;

    Ok(())
}

async fn poll(market: Market, config: MarketConfig, with_credentials: bool) {
    let mut interval = tokio::time::interval(config.poll_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        // Failed steps are already logged by poll_once.
        let _ = market.poll_once(config.book_depth).await;
        if with_credentials && let Err(e) = market.refresh_status().await {
            warn!(pair = config.pair, error = %e, "Status refresh failed");
        }
    }
}

async fn stream(url: String, ticker: Arc<Ticker>, config: MarketConfig) {
    let symbol = config.ws_symbol();
    loop {
        match kraken::stream::run(&url, &ticker, &symbol, config.book_depth).await {
            Ok(()) => info!(symbol, "WebSocket feed ended"),
            Err(e) => warn!(symbol, error = %e, "WebSocket feed failed"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn log_events(ticker: Arc<Ticker>) {
    let mut events = ticker.subscribe();
    loop {
        match events.recv().await {
            Ok(TickerEvent::Changed) => {
                let state = ticker.state();
                info!(
                    pair = %ticker.pair(),
                    ask = %state.lowest_ask(),
                    bid = %state.highest_bid(),
                    last = %state.last,
                    change = %state.change,
                    history = ticker.history_len(),
                    "Ticker changed"
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(pair = %ticker.pair(), skipped, "Event subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
