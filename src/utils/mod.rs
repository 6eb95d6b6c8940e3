pub mod text;
pub mod time;

pub use text::{fit_to_width, group_thousands};
pub use time::{current_clock_label, format_time_label, now_millis};
