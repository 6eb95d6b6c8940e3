use std::fmt::Display;

use chrono::{Local, TimeZone, Utc};

pub const TIME_LABEL_FMT: &str = "%H:%M";

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format an epoch-millisecond timestamp as `HH:MM` in the given zone.
pub fn format_time_label<Tz>(millis: i64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(TIME_LABEL_FMT).to_string())
}

pub fn current_clock_label() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hour_and_minute() {
        assert_eq!(
            format_time_label(1_700_000_000_000, &Utc).as_deref(),
            Some("22:13")
        );
        assert_eq!(format_time_label(0, &Utc).as_deref(), Some("00:00"));
    }
}
