use crate::tabular::Value;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Types of cell data in XLSX worksheets.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Time-only formats stay numeric since report extracts never carry them.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            _ => Self::Number,
        }
    }

    /// Converts the raw text of a cell into a table value.
    /// Dates become ISO strings so they compare the same way as CSV extracts.
    pub(crate) fn to_value(self, raw: &str, shared_strings: &[String]) -> Value {
        match self {
            Self::Empty | Self::Error => Value::Empty,
            Self::Boolean => Value::Text(if raw == "1" { "TRUE" } else { "FALSE" }.to_owned()),
            Self::Number => Value::parse(raw),
            Self::InlineString | Self::IsoDateTime => Value::text(raw),
            Self::SharedString => raw
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .map(|text| Value::text(text))
                .unwrap_or(Value::Empty),
            Self::NumberDate1900 | Self::NumberDate1904 => to_date_time(raw, self)
                .map(|date_time| Value::Text(date_time.format("%Y-%m-%d").to_string()))
                .unwrap_or_else(|| Value::parse(raw)),
            Self::NumberDateTime1900 | Self::NumberDateTime1904 => to_date_time(raw, self)
                .map(|date_time| Value::Text(date_time.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or_else(|| Value::parse(raw)),
        }
    }
}

/// Converts an Excel serial number into a timestamp for the given epoch.
fn to_date_time(raw: &str, kind: CellType) -> Option<NaiveDateTime> {
    let serial = raw.trim().parse::<f64>().ok()?;
    let epoch = match kind {
        CellType::NumberDate1904 | CellType::NumberDateTime1904 => NaiveDate::from_ymd_opt(1904, 1, 1)?,
        // 1899-12-30 absorbs the phantom 1900-02-29 for every date after March 1900
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_formats_detect_dates() {
        assert_eq!(CellType::parse_custom_number_format("yyyy/mm/dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("#,##0\"件\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
    }

    #[test]
    fn serial_dates_become_iso_text() {
        let value = CellType::NumberDate1900.to_value("46055", &[]);
        assert_eq!(value, Value::Text("2026-02-02".to_owned()));
        let value = CellType::NumberDateTime1900.to_value("46055.5", &[]);
        assert_eq!(value, Value::Text("2026-02-02 12:00:00".to_owned()));
    }

    #[test]
    fn shared_strings_resolve_by_index() {
        let strings = vec!["Acme".to_owned(), "Beta".to_owned()];
        assert_eq!(CellType::SharedString.to_value("1", &strings), Value::Text("Beta".to_owned()));
        assert_eq!(CellType::InlineString.to_value(" Acme ", &strings), Value::Text("Acme".to_owned()));
        assert_eq!(CellType::SharedString.to_value("7", &strings), Value::Empty);
    }
}
