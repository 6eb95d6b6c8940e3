pub mod components;
pub mod dashboard;
pub mod styles;

pub use components::TerminalGuard;
pub use dashboard::{interpret_key, key_press, render_dashboard, run_dashboard, DashboardFrame, KeyAction};
