//! Per-entity records assembled from the four input datasets.
use crate::chart::BarChart;
use crate::chart::DonutChart;
use crate::config::DatasetsConfig;
use crate::config::ReportConfig;
use crate::config::SeriesDataset;
use crate::error::ReportError;
use crate::error::ResultMessage;
use crate::helpers::string::format_thousands;
use crate::tabular;
use crate::tabular::detect::DetectedFiles;
use crate::tabular::Table;
use crate::tabular::Value;
use chrono::Datelike;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

/// Loaded datasets, series and brand rows grouped by entity name
#[derive(Clone, Debug)]
pub struct Datasets {
    pub summary: Table,
    pub login: BTreeMap<String, Table>,
    pub purchase: BTreeMap<String, Table>,
    pub brand: BTreeMap<String, Table>,
}

fn load_role(files: &DetectedFiles, role: &str) -> Result<Table, ReportError> {
    let path = files
        .get(role)
        .ok_or_else(|| ReportError::WithContextError(format!("No input file for dataset '{role}'")))?;
    tabular::load(path).with_prefix(&format!("Load {role} dataset '{}'", file_name(path)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl Datasets {
    /// Loads every dataset role, fills purchase gaps and ranks brands
    pub fn load(files: &DetectedFiles, config: &DatasetsConfig) -> Result<Datasets, ReportError> {
        let summary = load_role(files, "summary")?;
        summary.require_column(&config.summary.entity_column)?;

        let login_table = load_role(files, "login")?;
        let weeks = login_table.distinct(&config.login.date_column)?;
        let login = login_table.group_by(&config.login.entity_column)?;

        let mut purchase = load_role(files, "purchase")?.group_by(&config.purchase.entity_column)?;
        for table in purchase.values_mut() {
            fill_missing_weeks(table, &weeks, &config.purchase)?;
        }

        let mut brand = load_role(files, "brand")?.group_by(&config.brand.entity_column)?;
        for table in brand.values_mut() {
            table.sort_by(&config.brand.price_column, true)?;
        }
        log::info!(
            "Loaded {} summary rows, login data for {}, purchase data for {}, brand data for {} entities",
            summary.len(),
            login.len(),
            purchase.len(),
            brand.len()
        );
        Ok(Datasets {
            summary,
            login,
            purchase,
            brand,
        })
    }

    /// One entity per distinct summary key, in summary order.
    /// A repeated key keeps its first position and takes the later row.
    pub fn entities(&self, config: &DatasetsConfig) -> Result<Vec<Entity>, ReportError> {
        let key_index = self.summary.require_column(&config.summary.entity_column)?;
        let mut entities: Vec<Entity> = Vec::new();
        for row in &self.summary.rows {
            let name = row[key_index].to_string();
            if name.is_empty() {
                continue;
            }
            let mut summary = Table::new(&self.summary.name, self.summary.headers.clone());
            summary.push(row.clone());
            if let Some(existing) = entities.iter_mut().find(|entity| entity.name == name) {
                log::warn!("Summary has more than one row for '{}', the last one is used", name);
                existing.summary = summary;
                continue;
            }
            entities.push(Entity {
                login: self.login.get(&name).cloned(),
                purchase: self.purchase.get(&name).cloned(),
                brand: self.brand.get(&name).cloned(),
                name,
                summary,
            });
        }
        Ok(entities)
    }
}

/// Adds a zero row for every week of `weeks` missing from a purchase series.
/// Other columns are copied from the series' first row; the result is sorted by week.
pub(crate) fn fill_missing_weeks(table: &mut Table, weeks: &[String], series: &SeriesDataset) -> Result<(), ReportError> {
    let date_index = table.require_column(&series.date_column)?;
    let value_index = table.require_column(&series.value_column)?;
    let first = match table.rows.first() {
        Some(row) => row.clone(),
        None => return Ok(()),
    };
    let existing: BTreeSet<String> = table.rows.iter().map(|row| row[date_index].to_string()).collect();
    let mut added = 0;
    for week in weeks.iter().filter(|week| !existing.contains(*week)) {
        let mut row = first.clone();
        row[date_index] = Value::parse(week);
        row[value_index] = Value::Number(0.0);
        table.push(row);
        added += 1;
    }
    if added > 0 {
        log::debug!("Filled {} missing purchase weeks", added);
        table.sort_by(&series.date_column, false)?;
    }
    Ok(())
}

/// The data behind one output slide
#[derive(Clone, Debug)]
pub struct Entity {
    pub name: String,
    /// The entity's single summary row
    pub summary: Table,
    pub login: Option<Table>,
    pub purchase: Option<Table>,
    pub brand: Option<Table>,
}

/// Thousands-separated integer, the raw text for non-numbers and `xx` when absent
pub(crate) fn display_number(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Empty) => "xx".to_owned(),
        Some(value) => match value.as_f64() {
            Some(number) => format_thousands(number.trunc() as i64),
            None => value.to_string(),
        },
    }
}

/// Year and month of a period start such as `2026/02/01`; `yyyy`/`mm` when it has no date shape
pub(crate) fn period_month(period_start: &str) -> (String, String) {
    let parts: Vec<&str> = period_start
        .split(|c: char| c == '/' || c == '-')
        .map(str::trim)
        .collect();
    match parts.as_slice() {
        [year, month, ..] if !year.is_empty() && !month.is_empty() => (year.to_string(), month.to_string()),
        _ => ("yyyy".to_owned(), "mm".to_owned()),
    }
}

/// X tick label of a week, e.g. `2/9週`; text that is not a date is kept as is
pub(crate) fn week_label(week: &str) -> String {
    let day = week.split_whitespace().next().unwrap_or_default();
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(day, format).ok())
        .map(|date| format!("{}/{}週", date.month(), date.day()))
        .unwrap_or_else(|| week.to_owned())
}

/// Sum of a series as a label value; empty when the entity has no series
pub(crate) fn series_total(series: Option<&Table>, dataset: &SeriesDataset) -> Result<String, ReportError> {
    match series {
        Some(table) if !table.is_empty() => Ok(format_thousands(table.sum(&dataset.value_column)?.trunc() as i64)),
        _ => Ok(String::new()),
    }
}

/// Bar chart of a weekly series, `None` when the entity has no rows
pub(crate) fn series_chart(series: Option<&Table>, dataset: &SeriesDataset, caption: &str, color: &str) -> Result<Option<BarChart>, ReportError> {
    let table = match series {
        Some(table) if !table.is_empty() => table,
        _ => return Ok(None),
    };
    let date_index = table.require_column(&dataset.date_column)?;
    let value_index = table.require_column(&dataset.value_column)?;
    Ok(Some(BarChart {
        title: String::new(),
        y_caption: caption.to_owned(),
        labels: table.rows.iter().map(|row| week_label(&row[date_index].to_string())).collect(),
        values: table.rows.iter().map(|row| row[value_index].as_f64().unwrap_or(0.0)).collect(),
        color: color.to_owned(),
    }))
}

impl Entity {
    fn summary_value(&self, column: &str) -> Option<&Value> {
        self.summary.get(0, column)
    }

    fn summary_text(&self, column: &str) -> String {
        self.summary_value(column).map(Value::to_string).unwrap_or_default()
    }

    /// Entity name with the configured decoration stripped, for the title
    /// Entity name with the `title_strip` matches removed
    pub fn display_name(&self, title_strip: &Regex) -> String {
        title_strip.replace_all(&self.name, "").trim().to_owned()
    }

    pub fn period_start(&self, config: &ReportConfig) -> String {
        self.summary_text(&config.datasets.summary.period_start_column)
    }

    pub fn period_text(&self, config: &ReportConfig) -> String {
        let summary = &config.datasets.summary;
        format!(
            "期間：{}〜{}",
            self.summary_text(&summary.period_start_column),
            self.summary_text(&summary.period_end_column)
        )
    }

    pub fn registration_text(&self, config: &ReportConfig) -> String {
        let value = self.summary_value(&config.datasets.summary.registration_users_column);
        format!("■初回登録ユーザー数：{}人", display_number(value))
    }

    pub fn mau_text(&self, config: &ReportConfig) -> String {
        let value = self.summary_value(&config.datasets.summary.mau_column);
        format!("■MAU(購入ユーザー数)：{}人", display_number(value))
    }

    pub fn distribution_text(&self, config: &ReportConfig) -> String {
        let summary = &config.datasets.summary;
        format!(
            "　商品代流通総額：{}円 (総購入金額：{}円)",
            display_number(self.summary_value(&summary.distribution_total_column)),
            display_number(self.summary_value(&summary.purchase_total_column))
        )
    }

    /// Issue-count and sales donuts of the top brands plus one bucket for the rest
    pub(crate) fn brand_donuts(&self, config: &ReportConfig) -> Result<Option<(DonutChart, DonutChart)>, ReportError> {
        let table = match &self.brand {
            Some(table) if !table.is_empty() => table,
            _ => return Ok(None),
        };
        let brand = &config.datasets.brand;
        let name_index = table.require_column(&brand.name_column)?;
        let count_index = table.require_column(&brand.count_column)?;
        let price_index = table.require_column(&brand.price_column)?;
        let number = |row: &Vec<Value>, index: usize| row[index].as_f64().unwrap_or(0.0);

        let mut counts: Vec<(String, f64)> = Vec::new();
        let mut prices: Vec<(String, f64)> = Vec::new();
        for row in table.rows.iter().take(config.donut_max) {
            counts.push((row[name_index].to_string(), number(row, count_index)));
            prices.push((row[name_index].to_string(), number(row, price_index)));
        }
        let rest = &table.rows[table.rows.len().min(config.donut_max)..];
        if !rest.is_empty() {
            counts.push((config.other_label.to_owned(), rest.iter().map(|row| number(row, count_index)).sum()));
            prices.push((config.other_label.to_owned(), rest.iter().map(|row| number(row, price_index)).sum()));
        }
        Ok(Some((DonutChart::new("発行総数", counts), DonutChart::new("販売総額", prices))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn purchase_gaps_are_filled_with_zero_weeks() {
        let config = DatasetsConfig::default();
        let mut table = Table::new("purchase", strings(&["company_name", "week_start", "weekly_purchase_count"]));
        table.push(vec![Value::parse("Acme"), Value::parse("2026-02-09"), Value::Number(5.0)]);
        let weeks = strings(&["2026-02-02", "2026-02-09", "2026-02-16"]);
        fill_missing_weeks(&mut table, &weeks, &config.purchase).unwrap();

        let dates: Vec<String> = (0..table.len()).map(|row| table.get(row, "week_start").unwrap().to_string()).collect();
        assert_eq!(dates, weeks);
        let values: Vec<String> = (0..table.len()).map(|row| table.get(row, "weekly_purchase_count").unwrap().to_string()).collect();
        assert_eq!(values, strings(&["0", "5", "0"]));
        assert_eq!(table.get(0, "company_name"), Some(&Value::parse("Acme")));
    }

    #[test]
    fn summary_texts_format_numbers_and_mark_missing_columns() {
        let config = ReportConfig::default();
        let mut summary = Table::new(
            "summary",
            strings(&["client_name", "period_start", "period_end", "first_registration_users", "mau"]),
        );
        summary.push(vec![
            Value::parse("Acme（申込企業：Acme Holdings）"),
            Value::parse("2026/02/01"),
            Value::parse("2026/02/28"),
            Value::Number(12345.0),
            Value::Empty,
        ]);
        let entity = Entity {
            name: "Acme（申込企業：Acme Holdings）".to_owned(),
            summary,
            login: None,
            purchase: None,
            brand: None,
        };
        assert_eq!(entity.display_name(&config.title_strip_regex().unwrap()), "Acme");
        assert_eq!(entity.period_text(&config), "期間：2026/02/01〜2026/02/28");
        assert_eq!(entity.registration_text(&config), "■初回登録ユーザー数：12,345人");
        assert_eq!(entity.mau_text(&config), "■MAU(購入ユーザー数)：xx人");
        assert_eq!(entity.distribution_text(&config), "　商品代流通総額：xx円 (総購入金額：xx円)");
        assert_eq!(period_month(&entity.period_start(&config)), ("2026".to_owned(), "02".to_owned()));
        assert_eq!(period_month(""), ("yyyy".to_owned(), "mm".to_owned()));
        assert_eq!(series_total(None, &config.datasets.login).unwrap(), "");
    }

    #[test]
    fn one_title_pattern_serves_every_entity() {
        let title_strip = ReportConfig::default().title_strip_regex().unwrap();
        let names = ["Acme（申込企業：Acme Holdings）", " Beta ", "Gamma（申込企業：G）商事"];
        let titles: Vec<String> = names
            .iter()
            .map(|name| Entity {
                name: name.to_string(),
                summary: Table::default(),
                login: None,
                purchase: None,
                brand: None,
            })
            .map(|entity| entity.display_name(&title_strip))
            .collect();
        assert_eq!(titles, strings(&["Acme", "Beta", "Gamma商事"]));
    }

    #[test]
    fn week_labels_use_month_and_day() {
        assert_eq!(week_label("2026-02-09"), "2/9週");
        assert_eq!(week_label("2026/12/01 00:00:00"), "12/1週");
        assert_eq!(week_label("W06"), "W06");
    }

    #[test]
    fn login_chart_has_one_bar_per_week() {
        let config = DatasetsConfig::default();
        let mut login = Table::new("login", strings(&[config.login.date_column.as_str(), config.login.value_column.as_str()]));
        for (week, users) in [("2026-02-02", 120.0), ("2026-02-09", 80.0), ("2026-02-16", 95.0)] {
            login.push(vec![Value::parse(week), Value::Number(users)]);
        }
        let chart = series_chart(Some(&login), &config.login, "ユーザー数", "#4472C4").unwrap().unwrap();
        assert_eq!(chart.labels, strings(&["2/2週", "2/9週", "2/16週"]));
        assert_eq!(chart.values, vec![120.0, 80.0, 95.0]);
        assert_eq!(series_total(Some(&login), &config.login).unwrap(), "295");
        assert!(series_chart(None, &config.login, "ユーザー数", "#4472C4").unwrap().is_none());
    }

    #[test]
    fn donut_buckets_brands_beyond_the_limit() {
        let config = ReportConfig::default();
        let mut brand = Table::new("brand", strings(&["client_name", "brand_name", "total_count", "total_price"]));
        for index in 0..12 {
            brand.push(vec![
                Value::parse("Acme"),
                Value::Text(format!("Brand{index}")),
                Value::Number(10.0),
                Value::Number(1000.0 - index as f64),
            ]);
        }
        let entity = Entity {
            name: "Acme".to_owned(),
            summary: Table::default(),
            login: None,
            purchase: None,
            brand: Some(brand),
        };
        let (counts, prices) = entity.brand_donuts(&config).unwrap().unwrap();
        assert_eq!(counts.slices.len(), 9);
        assert_eq!(counts.slices[8], ("その他".to_owned(), 40.0));
        assert_eq!(prices.slices[8], ("その他".to_owned(), 992.0 + 991.0 + 990.0 + 989.0));
        assert_eq!(prices.slices[0].0, "Brand0");
    }
}
