//! Text formatting and measuring helpers used when writing values into templates.

use unicode_width::UnicodeWidthChar;

/// Formats an integer with comma thousands separators (e.g. `-1234567` → `-1,234,567`).
pub(crate) fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Estimates the rendered width of a string in em units.
/// Wide and fullwidth characters count as 1.0, everything else as 0.5.
#[inline]
pub(crate) fn estimate_text_width(text: &str) -> f64 {
    text.chars()
        .map(|character| match character.width() {
            Some(2) => 1.0,
            _ => 0.5,
        })
        .sum()
}

/// Escapes text for embedding into hand-built SVG markup.
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(50669803), "50,669,803");
        assert_eq!(format_thousands(-1234567), "-1,234,567");
    }

    #[test]
    fn width_counts_fullwidth_as_double() {
        assert_eq!(estimate_text_width("abcd"), 2.0);
        assert_eq!(estimate_text_width("ブランド"), 4.0);
        assert_eq!(estimate_text_width("ABCマート"), 4.5);
        assert_eq!(estimate_text_width(""), 0.0);
    }

    #[test]
    fn escape_markup() {
        assert_eq!(escape_xml("A&B <c>"), "A&amp;B &lt;c&gt;");
    }
}
