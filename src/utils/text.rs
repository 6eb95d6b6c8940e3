use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Render a number with comma thousands separators and `decimals` fractional digits.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }

    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + integer.len() / 3 + 1);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }

    let is_zero = grouped.chars().all(|c| matches!(c, '0' | ',' | '.'));
    if value.is_sign_negative() && !is_zero {
        grouped.insert(0, '-');
    }
    grouped
}

/// Truncate `text` to at most `width` terminal columns, marking the cut with an ellipsis.
pub fn fit_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_integer_part() {
        assert_eq!(group_thousands(1234567.891, 0), "1,234,568");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(1000.5, 2), "1,000.50");
        assert_eq!(group_thousands(-12345.0, 0), "-12,345");
        assert_eq!(group_thousands(-0.2, 0), "0");
        assert_eq!(group_thousands(f64::NAN, 0), "N/A");
    }

    #[test]
    fn fits_text_to_column_budget() {
        assert_eq!(fit_to_width("BTC/USDT", 10), "BTC/USDT");
        assert_eq!(fit_to_width("BTC/USDT", 5), "BTC/…");
        assert_eq!(fit_to_width("BTC", 0), "");
    }
}
