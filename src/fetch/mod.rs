use crate::error::Result;

pub mod decode;
pub mod history;
pub mod interval;
pub mod request;

pub use decode::Candle;
pub use history::{to_chart_points, ChartPoint, HistoryFetcher, HttpKlineSource, KlineSource};
pub use interval::Interval;
pub use request::KlineQuery;

/// Hard cap the exchange applies to a single klines page.
pub const MAX_KLINES_PER_REQUEST: usize = 1000;

pub type FetchResult<T> = Result<T>;

#[inline]
pub fn clamp_batch_size(limit: usize) -> usize {
    limit.clamp(1, MAX_KLINES_PER_REQUEST)
}
