use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info};
use ratatui::{prelude::*, widgets::Paragraph};

use crate::app::{ChartState, DashboardController};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::KlineSource;
use crate::stream::{ConnectionStatus, PriceBook, PriceSubscriber};
use crate::ui::components::{
    cards::render_price_cards,
    chart::{render_chart_panel, ChartLabels},
    utils::split_vertical,
    TerminalGuard,
};
use crate::ui::styles::{header_span, secondary_line, status_style};
use crate::utils::current_clock_label;

const CARD_HEIGHT: u16 = 7;
const KEY_HELP: &str = "←/→ focus • Enter toggle chart • 1-9 select • q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Focus(usize),
    Toggle(usize),
    Ignore,
}

/// Map a key press onto a dashboard action given the focused card and card count.
pub fn interpret_key(key: KeyEvent, focused: usize, count: usize) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    if count == 0 {
        return match key.code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            _ => KeyAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Left | KeyCode::Char('h') => KeyAction::Focus((focused + count - 1) % count),
        KeyCode::Right | KeyCode::Char('l') => KeyAction::Focus((focused + 1) % count),
        KeyCode::Enter | KeyCode::Char(' ') => KeyAction::Toggle(focused.min(count - 1)),
        KeyCode::Char(digit @ '1'..='9') => {
            let idx = digit as usize - '1' as usize;
            if idx < count {
                KeyAction::Toggle(idx)
            } else {
                KeyAction::Ignore
            }
        }
        _ => KeyAction::Ignore,
    }
}

/// Key presses only; releases, repeats and non-key events are dropped.
pub fn key_press(event: Event) -> Option<KeyEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(key),
        _ => None,
    }
}

/// Wait up to `tick_rate` for a key press.
///
/// Terminal polling blocks, so it runs under `block_in_place` and needs the
/// multi-thread runtime; the stream and refresh tasks keep running meanwhile.
fn next_key_press(tick_rate: Duration) -> Result<Option<KeyEvent>> {
    tokio::task::block_in_place(|| {
        if event::poll(tick_rate)? {
            Ok(key_press(event::read()?))
        } else {
            Ok(None)
        }
    })
}

/// Everything one frame needs, detached from the live channels.
pub struct DashboardFrame<'a> {
    pub book: &'a PriceBook,
    pub quote_asset: &'a str,
    pub connection: &'a ConnectionStatus,
    pub chart: &'a ChartState,
    pub labels: &'a ChartLabels,
    pub focused: usize,
    pub clock: String,
}

pub fn render_dashboard(f: &mut Frame<'_>, frame: &DashboardFrame<'_>) {
    let rows = split_vertical(
        f.size(),
        &[
            Constraint::Length(1),
            Constraint::Length(CARD_HEIGHT),
            Constraint::Min(8),
            Constraint::Length(1),
        ],
    );

    let header = Line::from(vec![
        header_span("Crypto Dashboard"),
        Span::raw("  "),
        Span::raw(format!("{} pairs • {}", frame.quote_asset, frame.clock)).dim(),
    ]);
    f.render_widget(Paragraph::new(header), rows[0]);

    let selected_symbol = frame
        .chart
        .pair()
        .and_then(|pair| frame.book.base_symbol(pair));
    render_price_cards(
        f,
        rows[1],
        frame.book,
        frame.quote_asset,
        frame.focused,
        selected_symbol,
    );

    render_chart_panel(f, rows[2], frame.labels, frame.chart);

    let mut footer = vec![
        Span::raw("Stream: "),
        Span::styled(frame.connection.to_string(), status_style(frame.connection)),
        Span::raw("  "),
    ];
    footer.extend(secondary_line(KEY_HELP).spans);
    f.render_widget(Paragraph::new(Line::from(footer)), rows[3]);
}

/// Run the dashboard until the user quits, feeding key presses into the controller.
pub async fn run_dashboard<S>(
    config: &Config,
    subscriber: &PriceSubscriber,
    controller: &mut DashboardController<S>,
) -> Result<()>
where
    S: KlineSource + 'static,
{
    let mut guard = TerminalGuard::new()?;
    let prices = subscriber.prices();
    let status = subscriber.status();
    let symbols = &config.stream.symbols;
    let labels = ChartLabels::from_config(config);
    let mut focused = 0usize;

    info!("Dashboard ready with {} cards", symbols.len());

    loop {
        controller.pump();

        let book = prices.borrow().clone();
        let connection = status.borrow().clone();
        guard.draw(|f| {
            render_dashboard(
                f,
                &DashboardFrame {
                    book: &book,
                    quote_asset: &config.stream.quote_asset,
                    connection: &connection,
                    chart: controller.state(),
                    labels: &labels,
                    focused,
                    clock: current_clock_label(),
                },
            )
        })?;

        if let Some(key) = next_key_press(config.dashboard.tick_rate)? {
            match interpret_key(key, focused, symbols.len()) {
                KeyAction::Quit => break,
                KeyAction::Focus(idx) => focused = idx,
                KeyAction::Toggle(idx) => {
                    focused = idx;
                    if let Some(symbol) = symbols.get(idx) {
                        controller.select(&config.stream.pair_for(symbol));
                    }
                }
                KeyAction::Ignore => debug!("Unbound key {:?}", key.code),
            }
        }

        tokio::task::yield_now().await;
    }

    guard.restore()?;
    Ok(())
}
