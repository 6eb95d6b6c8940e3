use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Context};

use super::FetchResult;

/// Wire layout of a kline row: twelve positional fields.
type RawKline = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    Value,
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawKline")]
pub struct Candle {
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time: i64,
    pub quote_volume: String,
    pub trades: u64,
    pub taker_buy_base_volume: String,
    pub taker_buy_quote_volume: String,
}

impl From<RawKline> for Candle {
    fn from(raw: RawKline) -> Self {
        let (
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
            quote_volume,
            trades,
            taker_buy_base_volume,
            taker_buy_quote_volume,
            _ignore,
        ) = raw;

        Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
            quote_volume,
            trades,
            taker_buy_base_volume,
            taker_buy_quote_volume,
        }
    }
}

impl Candle {
    pub fn close_price(&self) -> FetchResult<f64> {
        parse_f64(&self.close).ok_or_else(|| {
            AppError::message(format!(
                "Invalid close price '{}' for candle opened at {}",
                self.close, self.open_time
            ))
        })
    }
}

/// Error body the exchange attaches to non-success responses.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

pub fn decode_klines(body: &str) -> FetchResult<Vec<Candle>> {
    let candles = serde_json::from_str::<Vec<Candle>>(body)
        .context("Failed to parse klines payload")?;
    Ok(candles)
}

pub fn decode_api_error(status: u16, body: &str) -> AppError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).unwrap_or_default();
    let message = match (parsed.code, parsed.msg) {
        (Some(code), Some(msg)) => format!("{msg} (code {code})"),
        (None, Some(msg)) => msg,
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => body.trim().to_string(),
    };
    AppError::Api { status, message }
}

pub fn parse_f64(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
