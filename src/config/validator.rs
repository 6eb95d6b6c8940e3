use std::collections::HashSet;

use url::Url;

use crate::error::{AppError, Result};
use crate::fetch::MAX_KLINES_PER_REQUEST;

use super::{Config, DashboardConfig, HistoryConfig, StreamConfig};

/// One year of history.
pub const MAX_LOOKBACK_HOURS: i64 = 24 * 366;

/// Validate the whole configuration tree and surface every issue in one error.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    validate_stream(&config.stream, &mut issues);
    validate_history(&config.history, &mut issues);
    validate_dashboard(&config.dashboard, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "dashboard config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_stream(stream: &StreamConfig, issues: &mut Vec<String>) {
    validate_endpoint("stream.endpoint", &stream.endpoint, &["ws", "wss"], issues);

    if stream.symbols.is_empty() {
        issues.push("stream.symbols must list at least one asset".to_string());
    }

    if stream.quote_asset.trim().is_empty() {
        issues.push("stream.quote_asset must not be empty".to_string());
    }

    if stream.channel.trim().is_empty() {
        issues.push("stream.channel must not be empty".to_string());
    }

    let mut seen = HashSet::new();
    for symbol in &stream.symbols {
        if symbol.trim().is_empty() {
            issues.push("stream.symbols contains an empty entry".to_string());
        } else if !seen.insert(symbol.as_str()) {
            issues.push(format!("stream.symbols lists `{symbol}` more than once"));
        }
    }

    for symbol in &stream.high_precision {
        if !stream.symbols.contains(symbol) {
            issues.push(format!(
                "stream.high_precision entry `{symbol}` is not a tracked symbol"
            ));
        }
    }
}

fn validate_history(history: &HistoryConfig, issues: &mut Vec<String>) {
    validate_endpoint("history.endpoint", &history.endpoint, &["http", "https"], issues);

    if history.max_batch == 0 || history.max_batch > MAX_KLINES_PER_REQUEST {
        issues.push(format!(
            "history.max_batch must be within 1..={MAX_KLINES_PER_REQUEST}, got {}",
            history.max_batch
        ));
    }

    if history.lookback_hours <= 0 || history.lookback_hours > MAX_LOOKBACK_HOURS {
        issues.push(format!(
            "history.lookback_hours must be within 1..={MAX_LOOKBACK_HOURS}, got {}",
            history.lookback_hours
        ));
    }

    if history.request_timeout.is_zero() {
        issues.push("history.request_timeout must be greater than zero".to_string());
    }
}

fn validate_dashboard(dashboard: &DashboardConfig, issues: &mut Vec<String>) {
    if dashboard.refresh_every.is_zero() {
        issues.push("dashboard.refresh_every must be greater than zero".to_string());
    }
    if dashboard.tick_rate.is_zero() {
        issues.push("dashboard.tick_rate must be greater than zero".to_string());
    }
}

fn validate_endpoint(label: &str, endpoint: &str, schemes: &[&str], issues: &mut Vec<String>) {
    match Url::parse(endpoint) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => issues.push(format!(
            "{label} uses unsupported scheme `{}` (expected {})",
            url.scheme(),
            schemes.join("/")
        )),
        Err(err) => issues.push(format!("{label} is not a valid URL: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn builtin_config_is_valid() {
        validate_config(&Config::builtin()).expect("builtin config should be valid");
    }

    #[test]
    fn rejects_empty_symbol_list() {
        let mut config = Config::builtin();
        config.stream.symbols.clear();
        config.stream.high_precision.clear();

        let err = validate_config(&config).expect_err("validation should fail");
        assert!(
            err.to_string().contains("at least one asset"),
            "unexpected error message: {err}"
        );
    }

    #[test]
    fn rejects_batch_cap_above_exchange_limit() {
        let mut config = Config::builtin();
        config.history.max_batch = 1001;

        let err = validate_config(&config).expect_err("validation should fail");
        assert!(err.to_string().contains("history.max_batch"));
    }

    #[test]
    fn rejects_lookback_beyond_one_year() {
        let mut config = Config::builtin();
        config.history.lookback_hours = MAX_LOOKBACK_HOURS;
        validate_config(&config).expect("a full year is allowed");

        config.history.lookback_hours = i64::MAX;
        let err = validate_config(&config).expect_err("validation should fail");
        assert!(
            err.to_string().contains("history.lookback_hours"),
            "unexpected error message: {err}"
        );
    }

    #[test]
    fn aggregates_multiple_issues() {
        let mut config = Config::builtin();
        config.dashboard.refresh_every = Duration::ZERO;
        config.stream.endpoint = "https://stream.binance.com".to_string();
        config.history.endpoint = "not a url".to_string();

        let message = validate_config(&config)
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("refresh_every"), "{message}");
        assert!(message.contains("unsupported scheme `https`"), "{message}");
        assert!(message.contains("history.endpoint is not a valid URL"), "{message}");
    }

    #[test]
    fn rejects_untracked_high_precision_symbol() {
        let mut config = Config::builtin();
        config.stream.high_precision.push("SHIB".to_string());

        let err = validate_config(&config).expect_err("validation should fail");
        assert!(err.to_string().contains("`SHIB`"));
    }
}
