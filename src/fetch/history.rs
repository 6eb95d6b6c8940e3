use std::fmt::Display;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use log::{debug, error, warn};
use reqwest::Client;

use crate::config::HistoryConfig;
use crate::error::{AppError, Context};
use crate::utils::{format_time_label, now_millis};

use super::decode::{decode_api_error, decode_klines};
use super::request::{prepare_request, KlineQuery};
use super::{clamp_batch_size, Candle, FetchResult, Interval, MAX_KLINES_PER_REQUEST};

/// A single plotted sample: candle open time as `HH:MM` and its close price.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub time: String,
    pub price: f64,
}

/// Anything that can serve one page of candles for a [`KlineQuery`].
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn klines(&self, query: &KlineQuery) -> FetchResult<Vec<Candle>>;
}

/// Klines served by the exchange REST API.
pub struct HttpKlineSource {
    client: Client,
    endpoint: String,
}

impl HttpKlineSource {
    pub fn new(config: &HistoryConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to construct history HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl KlineSource for HttpKlineSource {
    async fn klines(&self, query: &KlineQuery) -> FetchResult<Vec<Candle>> {
        let request = prepare_request(&self.endpoint, query)?;

        let response = self
            .client
            .get(request.url)
            .send()
            .await
            .with_context(|| format!("Kline request failed for {}", query.symbol))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read kline body for {}", query.symbol))?;

        if !status.is_success() {
            return Err(decode_api_error(status.as_u16(), &body));
        }

        decode_klines(&body)
    }
}

/// Walks the klines endpoint backward in time until the lookback window is covered.
pub struct HistoryFetcher<S> {
    source: S,
    max_batch: usize,
}

impl<S: KlineSource> HistoryFetcher<S> {
    pub fn new(source: S) -> Self {
        Self::with_max_batch(source, MAX_KLINES_PER_REQUEST)
    }

    pub fn with_max_batch(source: S, max_batch: usize) -> Self {
        Self {
            source,
            max_batch: clamp_batch_size(max_batch),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Chart series for the last `lookback_hours`, oldest first. Failures yield an empty series.
    pub async fn fetch(&self, pair: &str, interval: Interval, lookback_hours: i64) -> Vec<ChartPoint> {
        self.fetch_until(pair, interval, lookback_hours, now_millis())
            .await
    }

    pub async fn fetch_until(
        &self,
        pair: &str,
        interval: Interval,
        lookback_hours: i64,
        end_time: i64,
    ) -> Vec<ChartPoint> {
        let result = self
            .try_fetch_candles(pair, interval, lookback_hours, end_time)
            .await
            .and_then(|candles| to_chart_points(&candles, &Local));

        match result {
            Ok(points) => points,
            Err(err) => {
                error!(
                    "Failed to fetch historical data for {} ({} over {}h ending {}): {}",
                    pair, interval, lookback_hours, end_time, err
                );
                Vec::new()
            }
        }
    }

    /// Paginate backward from `end_time`, returning at most the candles the lookback needs.
    pub async fn try_fetch_candles(
        &self,
        pair: &str,
        interval: Interval,
        lookback_hours: i64,
        end_time: i64,
    ) -> FetchResult<Vec<Candle>> {
        let total_needed = interval.units_for_hours(lookback_hours);
        if total_needed == 0 {
            return Ok(Vec::new());
        }

        let symbol = pair.trim().to_uppercase();
        let mut accumulated: Vec<Candle> = Vec::with_capacity(total_needed.min(self.max_batch));
        let mut cursor_end_time = end_time;
        let mut fetched = 0usize;

        while fetched < total_needed {
            let batch_size = (total_needed - fetched).min(self.max_batch);
            let query = KlineQuery {
                symbol: symbol.clone(),
                interval,
                end_time: cursor_end_time - 1,
                limit: batch_size,
            };

            let batch = match self.source.klines(&query).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(
                        "Kline batch failed for {} (endTime: {}, limit: {}): {}",
                        symbol, query.end_time, batch_size, err
                    );
                    return Err(err);
                }
            };

            if batch.is_empty() {
                debug!("No klines before {} for {}", query.end_time, symbol);
                break;
            }

            let received = batch.len();
            let Some(oldest) = batch.iter().map(|candle| candle.open_time).min() else {
                break;
            };
            if oldest >= cursor_end_time {
                return Err(AppError::message(format!(
                    "Kline batch for {} did not move before {}",
                    symbol, cursor_end_time
                )));
            }

            fetched += received;
            cursor_end_time = oldest;
            accumulated.splice(0..0, batch);

            if received < batch_size {
                if fetched < total_needed {
                    warn!(
                        "Exchange returned fewer klines ({}) than requested ({}) for {}. May be end of history.",
                        received, batch_size, symbol
                    );
                }
                break;
            }
        }

        accumulated.sort_by_key(|candle| candle.open_time);
        accumulated.dedup_by_key(|candle| candle.open_time);

        if accumulated.len() > total_needed {
            let excess = accumulated.len() - total_needed;
            accumulated.drain(..excess);
        }

        Ok(accumulated)
    }
}

pub fn to_chart_points<Tz>(candles: &[Candle], tz: &Tz) -> FetchResult<Vec<ChartPoint>>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    candles
        .iter()
        .map(|candle| {
            let price = candle.close_price()?;
            let time = format_time_label(candle.open_time, tz).ok_or_else(|| {
                AppError::message(format!("Invalid candle open time {}", candle.open_time))
            })?;
            Ok(ChartPoint { time, price })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    const BASE_TIME: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;

    fn candle(open_time: i64, close: &str) -> Candle {
        Candle {
            open_time,
            open: close.to_string(),
            high: close.to_string(),
            low: close.to_string(),
            close: close.to_string(),
            volume: "1.0".to_string(),
            close_time: open_time + MINUTE - 1,
            quote_volume: "1.0".to_string(),
            trades: 1,
            taker_buy_base_volume: "0.5".to_string(),
            taker_buy_quote_volume: "0.5".to_string(),
        }
    }

    fn minute_history(count: usize, step: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| candle(BASE_TIME + i as i64 * step, &format!("{}.5", 100 + i)))
            .collect()
    }

    /// Serves the newest `limit` candles at or before `end_time`, like the exchange does.
    struct MockSource {
        candles: Vec<Candle>,
        fail_status: Option<u16>,
        requests: Mutex<Vec<KlineQuery>>,
    }

    impl MockSource {
        fn new(candles: Vec<Candle>) -> Self {
            Self {
                candles,
                fail_status: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                fail_status: Some(status),
                ..Self::new(minute_history(10, MINUTE))
            }
        }

        fn requests(&self) -> Vec<KlineQuery> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KlineSource for MockSource {
        async fn klines(&self, query: &KlineQuery) -> FetchResult<Vec<Candle>> {
            self.requests.lock().unwrap().push(query.clone());
            if let Some(status) = self.fail_status {
                return Err(AppError::Api {
                    status,
                    message: "Invalid symbol.".to_string(),
                });
            }
            let eligible: Vec<Candle> = self
                .candles
                .iter()
                .filter(|c| c.open_time <= query.end_time)
                .cloned()
                .collect();
            let start = eligible.len().saturating_sub(query.limit);
            Ok(eligible[start..].to_vec())
        }
    }

    fn end_of(history: &[Candle], step: i64) -> i64 {
        history.last().map(|c| c.open_time + step).unwrap_or(BASE_TIME)
    }

    #[tokio::test]
    async fn day_of_minutes_spans_two_pages() {
        let history = minute_history(3000, MINUTE);
        let end = end_of(&history, MINUTE);
        let fetcher = HistoryFetcher::new(MockSource::new(history.clone()));

        let points = fetcher
            .fetch_until("btcusdt", Interval::OneMinute, 24, end)
            .await;

        assert_eq!(points.len(), 1440);
        let last = history.last().unwrap();
        assert_eq!(points.last().unwrap().price, last.close_price().unwrap());
        assert_eq!(points[0].price, history[3000 - 1440].close_price().unwrap());

        let requests = fetcher.source().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].limit, 1000);
        assert_eq!(requests[0].end_time, end - 1);
        assert_eq!(requests[0].symbol, "BTCUSDT");
        assert_eq!(requests[1].limit, 440);
        assert_eq!(requests[1].end_time, history[2000].open_time - 1);
    }

    #[tokio::test]
    async fn candles_are_ascending_without_duplicates() {
        let history = minute_history(3000, MINUTE);
        let end = end_of(&history, MINUTE);
        let fetcher = HistoryFetcher::new(MockSource::new(history));

        let candles = fetcher
            .try_fetch_candles("BTCUSDT", Interval::OneMinute, 24, end)
            .await
            .unwrap();

        assert_eq!(candles.len(), 1440);
        assert!(candles
            .windows(2)
            .all(|pair| pair[0].open_time + MINUTE == pair[1].open_time));
    }

    #[tokio::test]
    async fn short_history_is_returned_as_is() {
        let history = minute_history(600, MINUTE);
        let end = end_of(&history, MINUTE);
        let fetcher = HistoryFetcher::new(MockSource::new(history));

        let points = fetcher
            .fetch_until("ETHUSDT", Interval::OneMinute, 24, end)
            .await;

        assert_eq!(points.len(), 600);
        assert_eq!(fetcher.source().requests().len(), 1);
    }

    #[tokio::test]
    async fn short_page_after_full_page_stops_walk() {
        let history = minute_history(1200, MINUTE);
        let end = end_of(&history, MINUTE);
        let fetcher = HistoryFetcher::new(MockSource::new(history));

        let points = fetcher
            .fetch_until("ETHUSDT", Interval::OneMinute, 24, end)
            .await;

        assert_eq!(points.len(), 1200);
        let requests = fetcher.source().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].limit, 440);
    }

    #[tokio::test]
    async fn error_on_first_page_yields_empty_series() {
        let fetcher = HistoryFetcher::new(MockSource::failing(400));

        let points = fetcher
            .fetch_until("NOPEUSDT", Interval::OneMinute, 24, BASE_TIME)
            .await;
        assert!(points.is_empty());

        let err = fetcher
            .try_fetch_candles("NOPEUSDT", Interval::OneMinute, 24, BASE_TIME)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn non_positive_lookback_issues_no_requests() {
        let fetcher = HistoryFetcher::new(MockSource::new(minute_history(100, MINUTE)));

        assert!(fetcher
            .fetch_until("BTCUSDT", Interval::OneMinute, 0, BASE_TIME)
            .await
            .is_empty());
        assert!(fetcher
            .fetch_until("BTCUSDT", Interval::OneMinute, -3, BASE_TIME)
            .await
            .is_empty());
        assert!(fetcher.source().requests().is_empty());
    }

    #[tokio::test]
    async fn pair_without_history_yields_empty_series() {
        let fetcher = HistoryFetcher::new(MockSource::new(Vec::new()));

        let points = fetcher
            .fetch_until("NEWUSDT", Interval::OneMinute, 24, BASE_TIME)
            .await;

        assert!(points.is_empty());
        assert_eq!(fetcher.source().requests().len(), 1);
    }

    #[tokio::test]
    async fn small_batch_cap_walks_multiple_pages() {
        let hour = 60 * MINUTE;
        let history = minute_history(100, hour);
        let end = end_of(&history, hour);
        let fetcher = HistoryFetcher::with_max_batch(MockSource::new(history.clone()), 7);

        let candles = fetcher
            .try_fetch_candles("BTCUSDT", Interval::OneHour, 24, end)
            .await
            .unwrap();

        assert_eq!(candles.len(), 24);
        assert_eq!(candles.last().unwrap().open_time, history[99].open_time);
        let limits: Vec<usize> = fetcher
            .source()
            .requests()
            .iter()
            .map(|q| q.limit)
            .collect();
        assert_eq!(limits, vec![7, 7, 7, 3]);
    }

    #[tokio::test]
    async fn malformed_close_price_yields_empty_series() {
        let mut history = minute_history(5, MINUTE);
        history[2].close = "not-a-number".to_string();
        let end = end_of(&history, MINUTE);
        let fetcher = HistoryFetcher::new(MockSource::new(history));

        let points = fetcher
            .fetch_until("BTCUSDT", Interval::OneMinute, 1, end)
            .await;

        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn huge_lookback_against_empty_source_yields_empty_series() {
        let fetcher = HistoryFetcher::new(MockSource::new(Vec::new()));

        let points = fetcher
            .fetch_until("BTCUSDT", Interval::OneMinute, i64::MAX, BASE_TIME)
            .await;

        assert!(points.is_empty());
        assert_eq!(fetcher.source().requests().len(), 1);
    }

    #[test]
    fn chart_points_use_open_time_and_close_price() {
        let candles = vec![candle(BASE_TIME, "36510.42"), candle(BASE_TIME + MINUTE, "36511")];

        let points = to_chart_points(&candles, &Utc).unwrap();

        assert_eq!(
            points,
            vec![
                ChartPoint {
                    time: "22:13".to_string(),
                    price: 36510.42
                },
                ChartPoint {
                    time: "22:14".to_string(),
                    price: 36511.0
                },
            ]
        );
    }
}
