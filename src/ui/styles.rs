use std::borrow::Cow;

use ratatui::prelude::Stylize;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::stream::ConnectionStatus;

/// Accent color for the header and the focused card.
pub const ACCENT: Color = Color::Indexed(208);
pub const SELECTED: Color = Color::Green;
pub const RISING: Color = Color::Green;
pub const FALLING: Color = Color::Red;
pub const AXIS: Color = Color::DarkGray;

pub fn header_span<'a>(text: impl Into<Cow<'a, str>>) -> Span<'a> {
    Span::from(text.into().into_owned()).bold().fg(ACCENT)
}

/// Dimmed line for hints and the key legend.
pub fn secondary_line<'a>(text: impl Into<Cow<'a, str>>) -> Line<'a> {
    Line::from(text.into().into_owned().dim())
}

pub fn card_border(focused: bool, selected: bool) -> Style {
    match (focused, selected) {
        (_, true) => Style::default().fg(SELECTED).add_modifier(Modifier::BOLD),
        (true, false) => Style::default().fg(ACCENT),
        (false, false) => Style::default().fg(AXIS),
    }
}

pub fn status_style(status: &ConnectionStatus) -> Style {
    let color = match status {
        ConnectionStatus::Open => Color::Green,
        ConnectionStatus::Connecting => Color::Yellow,
        ConnectionStatus::Closed => Color::Gray,
        ConnectionStatus::Failed(_) => Color::Red,
    };
    Style::default().fg(color)
}
