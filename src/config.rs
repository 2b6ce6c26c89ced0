//! Application configuration loaded from environment variables and a
//! JSON market list.
//!
//! Environment variables (empty values are treated as unset):
//! - `KRAKEN_REST_URL`, `KRAKEN_WEBSOCKET_URL`: endpoint overrides
//! - `KRAKEN_API_KEY`, `KRAKEN_API_SECRET`: optional, but both or neither
//! - `TICKWATCH_RATE_PERMITS`, `TICKWATCH_RATE_WINDOW_MS`: request budget
//! - `TICKWATCH_RATE_SCOPE`: `ticker` (one gate per market) or `exchange`
//! - `TICKWATCH_HISTORY_CAPACITY`, `TICKWATCH_HISTORY_EVICT_BATCH`
//! - `TICKWATCH_LEGACY_BID_SCALE`: `true`/`false`

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::TickwatchError;
use crate::history::HistoryConfig;
use crate::rate_gate::{DEFAULT_PERMITS, DEFAULT_WINDOW};

/// Default public REST endpoint.
const DEFAULT_REST_URL: &str = "https://api.kraken.com";

/// Default public WebSocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://ws.kraken.com/v2";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub kraken: KrakenConfig,
    pub rate_gate: RateGateConfig,
    pub history: HistoryConfig,
}

/// Kraken-specific configuration values.
#[derive(Debug)]
pub struct KrakenConfig {
    pub rest_url: String,
    pub websocket_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl KrakenConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

/// Whether markets get their own request budget or share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateGateScope {
    Ticker,
    Exchange,
}

impl FromStr for RateGateScope {
    type Err = TickwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticker" => Ok(Self::Ticker),
            "exchange" => Ok(Self::Exchange),
            other => Err(TickwatchError::Config(format!(
                "unknown rate gate scope {other:?}, expected \"ticker\" or \"exchange\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateGateConfig {
    pub permits: usize,
    pub window: Duration,
    pub scope: RateGateScope,
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            permits: DEFAULT_PERMITS,
            window: DEFAULT_WINDOW,
            scope: RateGateScope::Ticker,
        }
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`TickwatchError::Config`] if only one credential variable is
/// set, a numeric value does not parse, or a limit is zero or
/// inconsistent.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let rest_url = non_empty_var("KRAKEN_REST_URL").unwrap_or_else(|| DEFAULT_REST_URL.to_string());
    let websocket_url = non_empty_var("KRAKEN_WEBSOCKET_URL")
        .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());

    let api_key = non_empty_var("KRAKEN_API_KEY");
    let api_secret = non_empty_var("KRAKEN_API_SECRET");

    match (&api_key, &api_secret) {
        (Some(_), None) => {
            return Err(TickwatchError::Config(
                "KRAKEN_API_KEY is set but KRAKEN_API_SECRET is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(TickwatchError::Config(
                "KRAKEN_API_SECRET is set but KRAKEN_API_KEY is missing".to_string(),
            ));
        }
        _ => {}
    }

    let defaults = RateGateConfig::default();
    let rate_gate = RateGateConfig {
        permits: parse_var("TICKWATCH_RATE_PERMITS")?.unwrap_or(defaults.permits),
        window: parse_var::<u64>("TICKWATCH_RATE_WINDOW_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.window),
        scope: parse_var("TICKWATCH_RATE_SCOPE")?.unwrap_or(defaults.scope),
    };

    let defaults = HistoryConfig::default();
    let history = HistoryConfig {
        capacity: parse_var("TICKWATCH_HISTORY_CAPACITY")?.unwrap_or(defaults.capacity),
        evict_batch: parse_var("TICKWATCH_HISTORY_EVICT_BATCH")?.unwrap_or(defaults.evict_batch),
        legacy_bid_scale: parse_var("TICKWATCH_LEGACY_BID_SCALE")?
            .unwrap_or(defaults.legacy_bid_scale),
    };

    validate(&rate_gate, &history)?;

    Ok(AppConfig {
        kraken: KrakenConfig {
            rest_url,
            websocket_url,
            api_key,
            api_secret,
        },
        rate_gate,
        history,
    })
}

fn validate(rate_gate: &RateGateConfig, history: &HistoryConfig) -> crate::Result<()> {
    if rate_gate.permits == 0 {
        return Err(TickwatchError::Config(
            "TICKWATCH_RATE_PERMITS must be at least 1".to_string(),
        ));
    }
    if rate_gate.window.is_zero() {
        return Err(TickwatchError::Config(
            "TICKWATCH_RATE_WINDOW_MS must be at least 1".to_string(),
        ));
    }
    match history.validate() {
        Err(TickwatchError::Config(reason)) => Err(TickwatchError::Config(format!(
            "TICKWATCH_HISTORY_CAPACITY/TICKWATCH_HISTORY_EVICT_BATCH: {reason}"
        ))),
        other => other,
    }
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parses a non-empty environment variable.
fn parse_var<T>(name: &str) -> crate::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| TickwatchError::Config(format!("invalid {name} {raw:?}: {e}")))
        })
        .transpose()
}

/// Market list loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsConfig {
    pub markets: Vec<MarketConfig>,
}

/// One market to track.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Exchange pair name, e.g. `XBTUSD`.
    pub pair: String,
    /// Traded asset, e.g. `XBT`.
    pub market: String,
    /// Quote currency, e.g. `USD`.
    pub base: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
    /// Also follow the WebSocket ticker and book channels.
    #[serde(default)]
    pub stream: bool,
}

impl MarketConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Symbol used by the WebSocket API, e.g. `BTC/USD` for `XBT`/`USD`.
    pub fn ws_symbol(&self) -> String {
        let market = match self.market.as_str() {
            "XBT" => "BTC",
            "XDG" => "DOGE",
            other => other,
        };
        format!("{market}/{}", self.base)
    }
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_book_depth() -> usize {
    25
}

impl MarketsConfig {
    /// Loads the market list from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// lists no markets.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TickwatchError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        if config.markets.is_empty() {
            return Err(TickwatchError::Config(format!(
                "{} lists no markets",
                path.display()
            )));
        }
        Ok(config)
    }
}

impl Default for MarketsConfig {
    fn default() -> Self {
        Self {
            markets: vec![MarketConfig {
                pair: "XBTUSD".to_string(),
                market: "XBT".to_string(),
                base: "USD".to_string(),
                poll_interval_ms: default_poll_interval_ms(),
                book_depth: default_book_depth(),
                stream: false,
            }],
        }
    }
}
