use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use crate::fetch::decode::parse_f64;
use crate::stream::{PriceBook, PriceSnapshot};
use crate::ui::components::utils::split_columns;
use crate::ui::styles::{card_border, secondary_line};
use crate::utils::{fit_to_width, group_thousands};

/// Text lines of one price card, without styling.
pub fn card_lines(snapshot: &PriceSnapshot, quote_asset: &str, width: usize) -> Vec<String> {
    let volume = parse_f64(&snapshot.volume)
        .map(|value| group_thousands(value, 0))
        .unwrap_or_else(|| snapshot.volume.clone());

    [
        format!("{}/{}", snapshot.symbol, quote_asset),
        format!("${}", snapshot.price),
        format!("Vol: {volume}"),
        format!("High (24h): ${}", snapshot.high),
        format!("Low (24h): ${}", snapshot.low),
    ]
    .iter()
    .map(|line| fit_to_width(line, width))
    .collect()
}

/// One bordered card per tracked symbol, left to right in tracked order.
pub fn render_price_cards(
    f: &mut Frame<'_>,
    area: Rect,
    book: &PriceBook,
    quote_asset: &str,
    focused: usize,
    selected_symbol: Option<&str>,
) {
    let columns = split_columns(area, book.len());
    for (idx, (snapshot, column)) in book.snapshots().zip(columns).enumerate() {
        let is_focused = idx == focused;
        let is_selected = selected_symbol == Some(snapshot.symbol.as_str());

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(card_border(is_focused, is_selected));
        let inner = block.inner(column);
        let lines = card_lines(snapshot, quote_asset, usize::from(inner.width));

        let mut text: Vec<Line> = Vec::with_capacity(lines.len());
        for (row, line) in lines.into_iter().enumerate() {
            text.push(match row {
                0 => Line::from(line.bold()),
                1 => Line::from(line.bold().fg(Color::White)),
                _ => secondary_line(line),
            });
        }

        f.render_widget(Paragraph::new(text).block(block), column);
    }
}
