use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::Interval;

pub mod validator;

pub use validator::validate_config;

pub const WS_ENDPOINT_ENV: &str = "DASHBOARD_WS_ENDPOINT";
pub const REST_ENDPOINT_ENV: &str = "DASHBOARD_REST_ENDPOINT";
pub const LOG_FILE_ENV: &str = "DASHBOARD_LOG_FILE";

/// Live ticker subscription settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub endpoint: String,
    pub channel: String,
    pub quote_asset: String,
    /// Base assets, in display order.
    pub symbols: Vec<String>,
    /// Base assets whose prices are shown with four fractional digits.
    pub high_precision: Vec<String>,
}

impl StreamConfig {
    pub fn pair_for(&self, symbol: &str) -> String {
        format!("{}{}", symbol, self.quote_asset)
    }

    pub fn pairs(&self) -> Vec<String> {
        self.symbols.iter().map(|s| self.pair_for(s)).collect()
    }

    pub fn is_high_precision(&self, symbol: &str) -> bool {
        self.high_precision.iter().any(|s| s == symbol)
    }
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub endpoint: String,
    pub interval: Interval,
    pub lookback_hours: i64,
    pub max_batch: usize,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub refresh_every: Duration,
    pub tick_rate: Duration,
    pub timeframe_label: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub default_filter: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub stream: StreamConfig,
    pub history: HistoryConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn builtin() -> Self {
        let symbols = ["BTC", "ETH", "XRP", "DOGE"]
            .into_iter()
            .map(String::from)
            .collect();
        let high_precision = ["DOGE", "XRP"].into_iter().map(String::from).collect();

        Config {
            stream: StreamConfig {
                endpoint: "wss://stream.binance.com:9443/ws".to_string(),
                channel: "miniTicker".to_string(),
                quote_asset: "USDT".to_string(),
                symbols,
                high_precision,
            },
            history: HistoryConfig {
                endpoint: "https://api.binance.com/api/v3".to_string(),
                interval: Interval::OneMinute,
                lookback_hours: 24,
                max_batch: crate::fetch::MAX_KLINES_PER_REQUEST,
                request_timeout: Duration::from_secs(10),
            },
            dashboard: DashboardConfig {
                refresh_every: Duration::from_secs(60),
                tick_rate: Duration::from_millis(200),
                timeframe_label: "Last 24h".to_string(),
            },
            logging: LoggingConfig {
                file: PathBuf::from("crypto-dashboard.log"),
                default_filter: "info".to_string(),
            },
        }
    }

    /// Builtin configuration with endpoint and log file overrides taken from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::builtin();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(endpoint) = lookup(WS_ENDPOINT_ENV) {
            self.stream.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }
        if let Some(endpoint) = lookup(REST_ENDPOINT_ENV) {
            self.history.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }
        if let Some(file) = lookup(LOG_FILE_ENV) {
            self.logging.file = PathBuf::from(file.trim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn builtin_tracks_four_usdt_pairs() {
        let config = Config::builtin();
        assert_eq!(
            config.stream.pairs(),
            vec!["BTCUSDT", "ETHUSDT", "XRPUSDT", "DOGEUSDT"]
        );
        assert!(config.stream.is_high_precision("DOGE"));
        assert!(!config.stream.is_high_precision("BTC"));
        assert_eq!(config.history.lookback_hours, 24);
        assert_eq!(config.dashboard.refresh_every, Duration::from_secs(60));
    }

    #[test]
    fn overrides_replace_endpoints_and_ignore_blank_values() {
        let vars = HashMap::from([
            (WS_ENDPOINT_ENV, "wss://example.test/ws/"),
            (REST_ENDPOINT_ENV, "  "),
            (LOG_FILE_ENV, "/tmp/dash.log"),
        ]);
        let mut config = Config::builtin();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.stream.endpoint, "wss://example.test/ws");
        assert_eq!(config.history.endpoint, "https://api.binance.com/api/v3");
        assert_eq!(config.logging.file, PathBuf::from("/tmp/dash.log"));
    }
}
