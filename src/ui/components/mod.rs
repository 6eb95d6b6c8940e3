pub mod cards;
pub mod chart;
pub mod terminal;
pub mod utils;

pub use cards::render_price_cards;
pub use chart::{render_chart_panel, ChartLabels};
pub use terminal::TerminalGuard;
