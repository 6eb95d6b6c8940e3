use url::Url;

use crate::error::{AppError, Context};

use super::{FetchResult, Interval, MAX_KLINES_PER_REQUEST};

/// One page of the backward klines walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineQuery {
    pub symbol: String,
    pub interval: Interval,
    /// Inclusive upper bound on candle open time, in epoch milliseconds.
    pub end_time: i64,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: Url,
}

pub fn prepare_request(endpoint: &str, query: &KlineQuery) -> FetchResult<PreparedRequest> {
    let symbol = query.symbol.trim();
    if symbol.is_empty() {
        return Err(AppError::message("Kline request requires a trading pair"));
    }

    if query.limit == 0 || query.limit > MAX_KLINES_PER_REQUEST {
        return Err(AppError::message(format!(
            "Kline limit must be within 1..={MAX_KLINES_PER_REQUEST}, got {}",
            query.limit
        )));
    }

    let base = format!("{}/klines", endpoint.trim_end_matches('/'));
    let mut url = Url::parse(&base)
        .with_context(|| format!("Invalid klines endpoint: {}", endpoint))?;

    url.query_pairs_mut()
        .append_pair("symbol", &symbol.to_uppercase())
        .append_pair("interval", query.interval.as_str())
        .append_pair("endTime", &query.end_time.to_string())
        .append_pair("limit", &query.limit.to_string());

    Ok(PreparedRequest { url })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: usize) -> KlineQuery {
        KlineQuery {
            symbol: "btcusdt".to_string(),
            interval: Interval::OneMinute,
            end_time: 1_700_000_000_000,
            limit,
        }
    }

    #[test]
    fn renders_klines_url() {
        let prepared = prepare_request("https://api.binance.com/api/v3/", &query(1000)).unwrap();
        assert_eq!(
            prepared.url.as_str(),
            "https://api.binance.com/api/v3/klines?symbol=BTCUSDT&interval=1m&endTime=1700000000000&limit=1000"
        );
    }

    #[test]
    fn rejects_out_of_range_limits() {
        assert!(prepare_request("https://api.binance.com/api/v3", &query(0)).is_err());
        assert!(prepare_request("https://api.binance.com/api/v3", &query(1001)).is_err());
    }

    #[test]
    fn rejects_blank_symbol() {
        let mut q = query(10);
        q.symbol = "  ".to_string();
        let err = prepare_request("https://api.binance.com/api/v3", &q).unwrap_err();
        assert!(err.to_string().contains("trading pair"));
    }
}
