use std::collections::{HashMap, HashSet};

use crate::config::StreamConfig;
use crate::error::{AppError, Result};
use crate::fetch::decode::parse_f64;

use super::message::TickerEvent;

pub const DEFAULT_PRECISION: usize = 2;
pub const HIGH_PRECISION: usize = 4;
pub const VOLUME_PRECISION: usize = 2;

/// Display-ready view of one tracked asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub pair: String,
    pub price: String,
    pub volume: String,
    pub high: String,
    pub low: String,
}

impl PriceSnapshot {
    /// Zeroed values at the symbol's display precision.
    pub fn placeholder(symbol: &str, quote_asset: &str, precision: usize) -> Self {
        let zero = format!("{:.*}", precision, 0.0);
        Self {
            symbol: symbol.to_string(),
            pair: format!("{symbol}{quote_asset}"),
            price: zero.clone(),
            volume: format!("{:.*}", VOLUME_PRECISION, 0.0),
            high: zero.clone(),
            low: zero,
        }
    }
}

/// Latest snapshot per tracked symbol, kept in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBook {
    quote_asset: String,
    order: Vec<String>,
    high_precision: HashSet<String>,
    entries: HashMap<String, PriceSnapshot>,
}

impl PriceBook {
    pub fn new<I, S>(symbols: I, quote_asset: &str, high_precision: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut book = Self {
            quote_asset: quote_asset.to_string(),
            order: Vec::new(),
            high_precision: high_precision.iter().cloned().collect(),
            entries: HashMap::new(),
        };
        for symbol in symbols {
            let symbol = symbol.into();
            if book.entries.contains_key(&symbol) {
                continue;
            }
            let placeholder =
                PriceSnapshot::placeholder(&symbol, quote_asset, book.precision_for(&symbol));
            book.entries.insert(symbol.clone(), placeholder);
            book.order.push(symbol);
        }
        book
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.symbols.iter().cloned(),
            &config.quote_asset,
            &config.high_precision,
        )
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSnapshot> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshots in tracked order.
    pub fn snapshots(&self) -> impl Iterator<Item = &PriceSnapshot> + '_ {
        self.order.iter().filter_map(|symbol| self.entries.get(symbol))
    }

    pub fn precision_for(&self, symbol: &str) -> usize {
        if self.high_precision.contains(symbol) {
            HIGH_PRECISION
        } else {
            DEFAULT_PRECISION
        }
    }

    pub fn base_symbol<'a>(&self, pair: &'a str) -> Option<&'a str> {
        pair.strip_suffix(self.quote_asset.as_str())
            .filter(|base| !base.is_empty())
    }

    /// Fold a ticker into the book, replacing only the matching symbol.
    ///
    /// Returns `Ok(None)` for pairs outside the tracked set; malformed numbers are errors.
    pub fn apply(&mut self, event: &TickerEvent) -> Result<Option<&PriceSnapshot>> {
        let Some(symbol) = self.base_symbol(&event.pair) else {
            return Ok(None);
        };
        if !self.entries.contains_key(symbol) {
            return Ok(None);
        }

        let snapshot = self.format_snapshot(symbol, event)?;
        let symbol = snapshot.symbol.clone();
        self.entries.insert(symbol.clone(), snapshot);
        Ok(self.entries.get(&symbol))
    }

    fn format_snapshot(&self, symbol: &str, event: &TickerEvent) -> Result<PriceSnapshot> {
        let precision = self.precision_for(symbol);
        Ok(PriceSnapshot {
            symbol: symbol.to_string(),
            pair: event.pair.clone(),
            price: format_decimal("close", &event.close, precision)?,
            volume: format_decimal("volume", &event.base_volume, VOLUME_PRECISION)?,
            high: format_decimal("high", &event.high, precision)?,
            low: format_decimal("low", &event.low, precision)?,
        })
    }
}

pub fn format_decimal(field: &str, raw: &str, precision: usize) -> Result<String> {
    let value = parse_f64(raw).ok_or_else(|| {
        AppError::message(format!("Ticker field `{field}` is not a number: '{raw}'"))
    })?;
    Ok(format!("{:.*}", precision, value))
}
