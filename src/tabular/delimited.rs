use crate::error::ReportError;
use crate::tabular::Table;
use crate::tabular::Value;
use csv::ReaderBuilder;
use csv::Trim;
use std::io::Read;
use std::path::Path;

/// Reads a comma-separated file whose first record is the header row.
pub(crate) fn read_csv(path: &Path) -> Result<Table, ReportError> {
    let file = std::fs::File::open(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    read_from(&name, file)
}

pub(crate) fn read_from<R: Read>(name: &str, source: R) -> Result<Table, ReportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(source);
    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_owned())
        .collect();
    let mut table = Table::new(name, headers);
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        table.push(record.iter().map(Value::parse).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header_and_typed_values() {
        let data = "\u{feff}client_name,week_start_date,weekly_login_users\nAcme,2026-02-02,120\nBeta,2026-02-09,\n\n";
        let table = read_from("login.csv", data.as_bytes()).unwrap();
        assert_eq!(table.headers(), &["client_name", "week_start_date", "weekly_login_users"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "weekly_login_users"), Some(&Value::Number(120.0)));
        assert_eq!(table.get(1, "weekly_login_users"), Some(&Value::Empty));
        assert_eq!(table.get(1, "week_start_date"), Some(&Value::Text("2026-02-09".to_owned())));
    }

    #[test]
    fn short_records_are_padded() {
        let table = read_from("x.csv", "a,b,c\n1,2\n".as_bytes()).unwrap();
        assert_eq!(table.rows[0], vec![Value::Number(1.0), Value::Number(2.0), Value::Empty]);
    }
}
