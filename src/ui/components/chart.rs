use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Block, Borders, Paragraph, Wrap,
    },
};
use unicode_width::UnicodeWidthStr;

use crate::app::ChartState;
use crate::config::{Config, StreamConfig};
use crate::fetch::{ChartPoint, Interval};
use crate::ui::styles::{AXIS, FALLING, RISING};
use crate::utils::group_thousands;

const PRICE_PADDING: f64 = 0.05;
const FLAT_PADDING: f64 = 0.1;
const TIME_LABEL_WIDTH: f64 = 5.0;

/// Static labelling for the chart panel.
#[derive(Debug, Clone)]
pub struct ChartLabels {
    pub stream: StreamConfig,
    pub timeframe: String,
    pub interval: Interval,
}

impl ChartLabels {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stream: config.stream.clone(),
            timeframe: config.dashboard.timeframe_label.clone(),
            interval: config.history.interval,
        }
    }

    fn window(&self) -> String {
        format!("{} - {}", self.timeframe, self.interval)
    }

    fn base_symbol<'a>(&self, pair: &'a str) -> &'a str {
        pair.strip_suffix(self.stream.quote_asset.as_str())
            .filter(|base| !base.is_empty())
            .unwrap_or(pair)
    }

    pub fn title(&self, pair: &str) -> String {
        format!("{} price ({})", self.base_symbol(pair), self.window())
    }

    pub fn is_high_precision(&self, pair: &str) -> bool {
        self.stream.is_high_precision(self.base_symbol(pair))
    }

    /// Message shown in place of the plot, if any.
    pub fn placeholder(&self, state: &ChartState) -> Option<String> {
        match state {
            ChartState::NoSelection => Some("Select a cryptocurrency to view the chart.".to_string()),
            ChartState::Loading { pair } => Some(format!("Loading chart for {pair}…")),
            ChartState::Selected { pair, series } if series.is_empty() => Some(format!(
                "No data available for {pair} ({}).",
                self.window()
            )),
            ChartState::Selected { .. } => None,
        }
    }
}

pub fn render_chart_panel(f: &mut Frame<'_>, area: Rect, labels: &ChartLabels, state: &ChartState) {
    let title = state
        .pair()
        .map(|pair| labels.title(pair))
        .unwrap_or_else(|| "Price chart".to_string());
    let block = Block::default().borders(Borders::ALL).title(title);

    if let Some(message) = labels.placeholder(state) {
        let inner = block.inner(area);
        let pad = inner.height.saturating_sub(1) / 2;
        let mut lines = vec![Line::default(); usize::from(pad)];
        lines.push(Line::from(message));
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
        return;
    }

    if let ChartState::Selected { pair, series } = state {
        render_series(f, area, block, series, labels.is_high_precision(pair));
    }
}

fn render_series(
    f: &mut Frame<'_>,
    area: Rect,
    block: Block<'_>,
    series: &[ChartPoint],
    high_precision: bool,
) {
    let inner = block.inner(area);
    let Some((y_min, y_max)) = price_bounds(series) else {
        f.render_widget(
            Paragraph::new("Chart data is not plottable.")
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    };

    let width = f64::from(inner.width.max(1));
    let height = f64::from(inner.height.max(1));

    let tick_count = usize::from(inner.height / 3).clamp(2, 7);
    let price_ticks: Vec<(f64, String)> = compute_price_ticks(y_min, y_max, tick_count)
        .into_iter()
        .map(|value| (value, format_price_tick(value, high_precision)))
        .collect();
    let label_width = price_ticks
        .iter()
        .map(|(_, label)| label.width())
        .max()
        .unwrap_or(0) as f64;

    // Bottom row holds time labels; the left gutter holds price labels.
    let axis_x = label_width + 1.0;
    let axis_y = 1.0;
    let plot_width = (width - axis_x - 1.0).max(1.0);
    let plot_height = (height - axis_y - 1.0).max(1.0);
    let y_scale = plot_height / (y_max - y_min);

    let drawn = compress_to_width(series, (plot_width as u16).saturating_mul(2));
    let x_scale = if drawn.len() > 1 {
        plot_width / (drawn.len() - 1) as f64
    } else {
        0.0
    };
    let single = drawn.len() == 1;
    let to_xy = move |idx: usize, price: f64| -> (f64, f64) {
        let x = if single {
            axis_x + plot_width / 2.0
        } else {
            axis_x + idx as f64 * x_scale
        };
        (x, axis_y + (price - y_min) * y_scale)
    };

    let desired_time_ticks = ((plot_width / (TIME_LABEL_WIDTH * 2.0)) as usize).clamp(2, 8);
    let time_ticks: Vec<(f64, String)> = compute_time_ticks(&drawn, desired_time_ticks)
        .into_iter()
        .map(|(idx, label)| {
            let (x, _) = to_xy(idx, y_min);
            let left = (x - TIME_LABEL_WIDTH / 2.0).clamp(axis_x, (width - TIME_LABEL_WIDTH).max(axis_x));
            (left, label)
        })
        .collect();

    let color = match (drawn.first(), drawn.last()) {
        (Some(first), Some(last)) if last.price < first.price => FALLING,
        _ => RISING,
    };
    let coords: Vec<(f64, f64)> = drawn
        .iter()
        .enumerate()
        .map(|(idx, point)| to_xy(idx, point.price))
        .collect();

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            for segment in coords.windows(2) {
                ctx.draw(&CanvasLine {
                    x1: segment[0].0,
                    y1: segment[0].1,
                    x2: segment[1].0,
                    y2: segment[1].1,
                    color,
                });
            }
            if coords.len() == 1 {
                ctx.draw(&Points {
                    coords: &coords,
                    color,
                });
            }

            ctx.layer();
            ctx.draw(&CanvasLine {
                x1: axis_x,
                y1: axis_y,
                x2: axis_x + plot_width,
                y2: axis_y,
                color: AXIS,
            });
            ctx.draw(&CanvasLine {
                x1: axis_x,
                y1: axis_y,
                x2: axis_x,
                y2: axis_y + plot_height,
                color: AXIS,
            });

            for (value, label) in &price_ticks {
                let y = axis_y + (value - y_min) * y_scale;
                ctx.print(0.0, y, label.clone().gray());
            }
            for (x, label) in &time_ticks {
                ctx.print(*x, 0.0, label.clone().gray());
            }
        });

    f.render_widget(canvas, area);
}

/// Y-axis range with 5% headroom. Flat series get 5% of their price (or 0.1 at zero).
pub fn price_bounds(points: &[ChartPoint]) -> Option<(f64, f64)> {
    let (min, max) = points
        .iter()
        .map(|point| point.price)
        .filter(|price| price.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, price| match acc {
            None => Some((price, price)),
            Some((lo, hi)) => Some((lo.min(price), hi.max(price))),
        })?;

    let span = max - min;
    let pad = if span > 0.0 {
        span * PRICE_PADDING
    } else if min != 0.0 {
        min.abs() * PRICE_PADDING
    } else {
        FLAT_PADDING
    };
    Some((min - pad, max + pad))
}

/// Evenly spaced tick values from `min` to `max`, both inclusive.
pub fn compute_price_ticks(min: f64, max: f64, desired: usize) -> Vec<f64> {
    let desired = desired.max(2);
    if !min.is_finite() || !max.is_finite() || max <= min {
        return vec![min, max];
    }

    let step = (max - min) / (desired - 1) as f64;
    (0..desired).map(|i| min + step * i as f64).collect()
}

/// Dollar label with grouped thousands: two fractional digits, or up to five for
/// high-precision pairs.
pub fn format_price_tick(value: f64, high_precision: bool) -> String {
    let decimals = if high_precision {
        let fixed = format!("{:.5}", value);
        let fraction = fixed.split_once('.').map_or("", |(_, fraction)| fraction);
        fraction.trim_end_matches('0').len().max(2)
    } else {
        2
    };
    format!("${}", group_thousands(value, decimals))
}

/// Downsample to at most `max_points`, keeping the last point of every chunk.
pub fn compress_to_width(points: &[ChartPoint], max_points: u16) -> Vec<ChartPoint> {
    let max_points = usize::from(max_points.max(1));
    if points.len() <= max_points {
        return points.to_vec();
    }

    let stride = points.len().div_ceil(max_points);
    points
        .chunks(stride)
        .filter_map(|chunk| chunk.last().cloned())
        .collect()
}

/// Indices (and labels) for the time axis, always including the first and last point.
pub fn compute_time_ticks(points: &[ChartPoint], desired: usize) -> Vec<(usize, String)> {
    let Some(last_index) = points.len().checked_sub(1) else {
        return Vec::new();
    };
    if last_index == 0 {
        return vec![(0, points[0].time.clone())];
    }

    let desired = desired.clamp(2, points.len());
    let step = last_index as f64 / (desired - 1) as f64;
    let mut indices: Vec<usize> = (0..desired)
        .map(|i| ((i as f64 * step).round() as usize).min(last_index))
        .collect();
    indices.dedup();

    indices
        .into_iter()
        .map(|idx| (idx, points[idx].time.clone()))
        .collect()
}
