//! # Tabular Loader
//!
//! Reads CSV and XLSX extracts into an in-memory [`Table`] of typed values,
//! groups rows by a key column and detects input files by filename keywords.
use crate::error::ReportError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

mod cell;
pub(crate) mod delimited;
pub mod detect;
pub(crate) mod reference;
pub(crate) mod xlsx;

/// Errors raised while loading or querying tabular data.
#[derive(Error, Debug)]
pub enum TabularError {
    #[error("Unsupported file format '{0}'")]
    UnsupportedFormat(String),

    #[error("Missing column '{column}' in '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("Workbook '{0}' has no worksheet")]
    EmptyWorkbook(String),

    #[error("Missing part '{0}' in workbook")]
    MissingPart(String),
}

/// A single cell value of a loaded table.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Value {
    /// Parses raw field text: blank is empty, numeric text is a number, anything else is text.
    pub fn parse(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Value::Empty
        } else {
            match trimmed.parse::<f64>() {
                // `f64` also accepts words such as `NaN` and `inf`; those stay text
                Ok(number) if number.is_finite() && trimmed.bytes().any(|b| b.is_ascii_digit()) => Value::Number(number),
                _ => Value::Text(trimmed.to_owned()),
            }
        }
    }

    /// Text kept as text, trimmed; blank is empty
    pub fn text(raw: &str) -> Value {
        match raw.trim() {
            "" => Value::Empty,
            trimmed => Value::Text(trimmed.to_owned()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric view of the value; numeric text is accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().replace(',', "").parse().ok().filter(|number: &f64| number.is_finite()),
            Value::Empty => None,
        }
    }

    /// Orders values with numbers first, then text, then empties
    fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(_), _) => Ordering::Less,
            (_, Value::Number(_)) => Ordering::Greater,
            (Value::Text(_), Value::Empty) => Ordering::Less,
            (Value::Empty, Value::Text(_)) => Ordering::Greater,
            (Value::Empty, Value::Empty) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            Value::Number(number) => write!(f, "{}", number),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// A header row plus data rows, all rows padded to the header width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub(crate) name: String,
    pub(crate) headers: Vec<String>,
    pub(crate) rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: &str, headers: Vec<String>) -> Table {
        Table {
            name: name.to_owned(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the header width
    pub fn push(&mut self, mut row: Vec<Value>) {
        row.resize(self.headers.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }

    /// Like [`Table::column_index`] but a missing column is an error
    pub fn require_column(&self, column: &str) -> Result<usize, ReportError> {
        self.column_index(column).ok_or_else(|| {
            TabularError::MissingColumn {
                table: self.name.to_owned(),
                column: column.to_owned(),
            }
            .into()
        })
    }

    /// Cell lookup by row index and column name; `None` when the column does not exist
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|values| &values[index])
    }

    /// Sum of the numeric values of a column; non-numeric cells are skipped
    pub fn sum(&self, column: &str) -> Result<f64, ReportError> {
        let index = self.require_column(column)?;
        Ok(self.rows.iter().filter_map(|row| row[index].as_f64()).sum())
    }

    /// Distinct display values of a column in ascending order
    pub fn distinct(&self, column: &str) -> Result<Vec<String>, ReportError> {
        let index = self.require_column(column)?;
        let values: BTreeSet<String> = self.rows.iter()
            .map(|row| row[index].to_string())
            .filter(|value| !value.is_empty())
            .collect();
        Ok(values.into_iter().collect())
    }

    /// Splits the table by the display value of a key column.
    /// Rows keep their relative order inside each group; rows with an empty key are dropped.
    pub fn group_by(&self, column: &str) -> Result<BTreeMap<String, Table>, ReportError> {
        let index = self.require_column(column)?;
        let mut groups = BTreeMap::<String, Table>::new();
        for row in &self.rows {
            let key = row[index].to_string();
            if key.is_empty() {
                continue;
            }
            groups
                .entry(key)
                .or_insert_with(|| Table::new(&self.name, self.headers.clone()))
                .rows
                .push(row.clone());
        }
        Ok(groups)
    }

    /// Stable sort by a column; `descending` keeps empties last either way
    pub fn sort_by(&mut self, column: &str, descending: bool) -> Result<(), ReportError> {
        let index = self.require_column(column)?;
        self.rows.sort_by(|a, b| {
            let (a, b) = (&a[index], &b[index]);
            match (a.is_empty(), b.is_empty()) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ if descending => b.sort_cmp(a),
                _ => a.sort_cmp(b),
            }
        });
        Ok(())
    }
}

/// Loads a CSV or XLSX file into a table, dispatching on the file extension.
pub fn load(path: &Path) -> Result<Table, ReportError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
        .unwrap_or_default();
    log::debug!("Loading table '{}'", path.display());
    match extension.as_str() {
        "csv" => delimited::read_csv(path),
        "xlsx" | "xlsm" => xlsx::read_first_sheet(path),
        _ => Err(TabularError::UnsupportedFormat(path.display().to_string()))?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, f64)]) -> Table {
        let mut table = Table::new("test", vec!["company".to_owned(), "value".to_owned()]);
        for (company, value) in rows {
            table.push(vec![Value::Text((*company).to_owned()), Value::Number(*value)]);
        }
        table
    }

    #[test]
    fn parse_values() {
        assert_eq!(Value::parse(""), Value::Empty);
        assert_eq!(Value::parse(" 12 "), Value::Number(12.0));
        assert_eq!(Value::parse("2026-02-02"), Value::Text("2026-02-02".to_owned()));
        assert_eq!(Value::Number(1200.0).to_string(), "1200");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn number_words_and_padding_stay_text() {
        assert_eq!(Value::parse("NaN"), Value::Text("NaN".to_owned()));
        assert_eq!(Value::parse("Infinity").to_string(), "Infinity");
        assert_eq!(Value::parse("inf").as_f64(), None);
        assert_eq!(Value::parse(" Acme "), Value::Text("Acme".to_owned()));
        assert_eq!(Value::parse("-1.5e3"), Value::Number(-1500.0));

        let mut names = Table::new("summary", vec!["company".to_owned()]);
        for name in ["NaN", "Infinity", " Acme", "Acme"] {
            names.push(vec![Value::parse(name)]);
        }
        let groups = names.group_by("company").unwrap();
        assert_eq!(groups.keys().cloned().collect::<Vec<_>>(), vec!["Acme", "Infinity", "NaN"]);
        assert_eq!(groups["Acme"].len(), 2);
    }

    #[test]
    fn grouping_is_independent_of_row_order() {
        let forward = table(&[("Acme", 1.0), ("Beta", 2.0), ("Acme", 3.0), ("Beta", 4.0)]);
        let backward = table(&[("Beta", 4.0), ("Acme", 3.0), ("Beta", 2.0), ("Acme", 1.0)]);
        let forward = forward.group_by("company").unwrap();
        let backward = backward.group_by("company").unwrap();
        assert_eq!(forward.keys().collect::<Vec<_>>(), backward.keys().collect::<Vec<_>>());
        for (key, group) in &forward {
            let mut expected = group.rows.iter().map(|row| row[1].to_string()).collect::<Vec<_>>();
            let mut actual = backward[key].rows.iter().map(|row| row[1].to_string()).collect::<Vec<_>>();
            expected.sort();
            actual.sort();
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn missing_group_column_is_reported() {
        let error = table(&[("Acme", 1.0)]).group_by("client").unwrap_err();
        assert!(error.to_string().contains("client"));
    }

    #[test]
    fn sort_descending_keeps_empties_last() {
        let mut table = table(&[("a", 1.0), ("b", 3.0), ("c", 2.0)]);
        table.push(vec![Value::Text("d".to_owned()), Value::Empty]);
        table.sort_by("value", true).unwrap();
        let order: Vec<String> = table.rows.iter().map(|row| row[0].to_string()).collect();
        assert_eq!(order, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn sum_and_distinct() {
        let table = table(&[("Acme", 1.0), ("Beta", 2.5), ("Acme", 3.0)]);
        assert_eq!(table.sum("value").unwrap(), 6.5);
        assert_eq!(table.distinct("company").unwrap(), vec!["Acme", "Beta"]);
    }
}
