//! # Run configuration
//!
//! [`ReportConfig`] is built once per run, either from defaults or from a YAML
//! file, and passed by reference through the whole pipeline. Relative paths are
//! resolved against the directory of the configuration file.
use crate::deck::locator::default_image_rules;
use crate::deck::locator::default_text_rules;
use crate::deck::locator::ImageRule;
use crate::deck::locator::TextRule;
use crate::error::ReportError;
use crate::error::ResultMessage;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or checking the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Template not found: {0}")]
    MissingTemplate(String),
}

/// Column names and filename keywords of a weekly time series extract
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SeriesDataset {
    pub keywords: Vec<String>,
    pub entity_column: String,
    pub date_column: String,
    pub value_column: String,
}

/// Column names and filename keywords of the per-entity brand breakdown
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BrandDataset {
    pub keywords: Vec<String>,
    pub entity_column: String,
    pub name_column: String,
    pub count_column: String,
    pub price_column: String,
}

/// Column names and filename keywords of the one-row-per-entity summary
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SummaryDataset {
    pub keywords: Vec<String>,
    pub entity_column: String,
    pub period_start_column: String,
    pub period_end_column: String,
    pub registration_users_column: String,
    pub mau_column: String,
    pub distribution_total_column: String,
    pub purchase_total_column: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatasetsConfig {
    pub login: SeriesDataset,
    pub purchase: SeriesDataset,
    pub brand: BrandDataset,
    pub summary: SummaryDataset,
}

/// A table column and the unit appended to its formatted numbers
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TableColumn {
    pub name: String,
    #[serde(default)]
    pub unit: String,
}

/// Layout of the brand ranking table
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    pub columns: Vec<TableColumn>,
    /// Data rows below the header
    pub max_rows: usize,
    pub base_font_size: f64,
    pub min_font_size: f64,
    /// Left/right cell margin in EMU
    pub cell_margin: i64,
}

/// Chart appearance
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    /// CSS font-family list used for all chart text
    pub font_family: String,
    /// Extra directories scanned for fonts besides the system fonts
    pub font_dirs: Vec<PathBuf>,
    pub login_color: String,
    pub purchase_color: String,
    pub palette: Vec<String>,
}

/// Settings of the `monthly` spreadsheet reports
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonthlyConfig {
    pub campaign_template: PathBuf,
    pub point_template: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub campaign_keywords: Vec<String>,
    pub discount_keywords: Vec<String>,
    pub point_keywords: Vec<String>,
    /// Output file names, `{period}` is replaced by the target month
    pub campaign_output_name: String,
    pub point_output_name: String,
}

/// Complete configuration of a report run
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub template: PathBuf,
    pub tasks_dir: PathBuf,
    /// Output deck file name, `{period}` is replaced by the target month
    pub output_name: String,
    pub datasets: DatasetsConfig,
    pub table: TableConfig,
    /// Brands shown individually in the donut before the rest are bucketed
    pub donut_max: usize,
    pub other_label: String,
    /// Removed from entity names before they are written to the title
    pub title_strip_pattern: String,
    pub shape_rules: Vec<TextRule>,
    pub image_rules: Vec<ImageRule>,
    pub chart: ChartConfig,
    pub monthly: MonthlyConfig,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for SeriesDataset {
    fn default() -> Self {
        SeriesDataset {
            keywords: Vec::new(),
            entity_column: "company_name".to_owned(),
            date_column: String::new(),
            value_column: String::new(),
        }
    }
}

impl Default for BrandDataset {
    fn default() -> Self {
        BrandDataset {
            keywords: strings(&["brand", "ブランド", "販売"]),
            entity_column: "client_name".to_owned(),
            name_column: "brand_name".to_owned(),
            count_column: "total_count".to_owned(),
            price_column: "total_price".to_owned(),
        }
    }
}

impl Default for SummaryDataset {
    fn default() -> Self {
        SummaryDataset {
            keywords: strings(&["summary", "サマリ"]),
            entity_column: "client_name".to_owned(),
            period_start_column: "period_start".to_owned(),
            period_end_column: "period_end".to_owned(),
            registration_users_column: "first_registration_users".to_owned(),
            mau_column: "mau".to_owned(),
            distribution_total_column: "product_distribution_total".to_owned(),
            purchase_total_column: "total_purchase_amount".to_owned(),
        }
    }
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        DatasetsConfig {
            login: SeriesDataset {
                keywords: strings(&["login", "ログイン"]),
                date_column: "week_start_date".to_owned(),
                value_column: "weekly_login_users".to_owned(),
                ..SeriesDataset::default()
            },
            purchase: SeriesDataset {
                keywords: strings(&["purchase", "購入"]),
                date_column: "week_start".to_owned(),
                value_column: "weekly_purchase_count".to_owned(),
                ..SeriesDataset::default()
            },
            brand: BrandDataset::default(),
            summary: SummaryDataset::default(),
        }
    }
}

impl DatasetsConfig {
    /// Filename keywords per dataset role, in detection order
    pub fn patterns(&self) -> Vec<(String, Vec<String>)> {
        vec![
            ("login".to_owned(), self.login.keywords.clone()),
            ("purchase".to_owned(), self.purchase.keywords.clone()),
            ("brand".to_owned(), self.brand.keywords.clone()),
            ("summary".to_owned(), self.summary.keywords.clone()),
        ]
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        let column = |name: &str, unit: &str| TableColumn {
            name: name.to_owned(),
            unit: unit.to_owned(),
        };
        TableConfig {
            columns: vec![
                column("brand_name", ""),
                column("total_price", "円"),
                column("total_count", "件"),
                column("unique_user_count", "人"),
            ],
            max_rows: 10,
            base_font_size: 10.5,
            min_font_size: 7.0,
            cell_margin: 91440,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            font_family: "Hiragino Sans, Noto Sans CJK JP, Noto Sans JP, IPAexGothic, sans-serif".to_owned(),
            font_dirs: Vec::new(),
            login_color: "#4285F4".to_owned(),
            purchase_color: "#34A853".to_owned(),
            palette: strings(&[
                "#4285F4", "#EA4335", "#34A853", "#5F6368", "#00BCD4", "#FF9800", "#9C27B0", "#795548",
            ]),
        }
    }
}

impl Default for MonthlyConfig {
    fn default() -> Self {
        MonthlyConfig {
            campaign_template: PathBuf::from("templates/yyyymm_【月次集計】キャンペーン販促費.xlsx"),
            point_template: PathBuf::from("templates/yyyymm_【月次集計】ポイント利用額.xlsx"),
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            campaign_keywords: strings(&["商品×割引率", "campaign"]),
            discount_keywords: strings(&["割引率一覧", "discount"]),
            point_keywords: strings(&["ポイント利用", "point"]),
            campaign_output_name: "{period}_【月次集計】キャンペーン販促費.xlsx".to_owned(),
            point_output_name: "{period}_【月次集計】ポイント利用額.xlsx".to_owned(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            template: PathBuf::from("template/報告資料_v3.pptx"),
            tasks_dir: PathBuf::from("tasks"),
            output_name: "JCB報告資料_{period}.pptx".to_owned(),
            datasets: DatasetsConfig::default(),
            table: TableConfig::default(),
            donut_max: 8,
            other_label: "その他".to_owned(),
            title_strip_pattern: "（申込企業：[^）]+）".to_owned(),
            shape_rules: default_text_rules(),
            image_rules: default_image_rules(),
            chart: ChartConfig::default(),
            monthly: MonthlyConfig::default(),
        }
    }
}

/// Joins a relative path onto `base`, leaving absolute paths untouched
fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl ReportConfig {
    /// Loads the configuration from a YAML file, or the defaults when no file is given.
    ///
    /// # Arguments
    /// * `path` - Optional path of a YAML configuration file
    ///
    /// # Returns
    /// * `Result<ReportConfig, ReportError>` - The checked configuration with resolved paths
    pub fn load(path: Option<&Path>) -> Result<ReportConfig, ReportError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(ReportError::from)
                    .with_prefix(&format!("Read config '{}'", path.display()))?;
                let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                let mut config = ReportConfig::from_yaml(&text)?;
                config.resolve_paths(&base);
                log::debug!("Loaded configuration from '{}'", path.display());
                config
            }
            None => ReportConfig::default(),
        };
        config.check()?;
        if config.chart.palette.is_empty() {
            config.chart.palette = ChartConfig::default().palette;
        }
        Ok(config)
    }

    /// Parses YAML text; missing keys take their default values
    pub fn from_yaml(text: &str) -> Result<ReportConfig, ReportError> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.template);
        resolve(base, &mut self.tasks_dir);
        resolve(base, &mut self.monthly.campaign_template);
        resolve(base, &mut self.monthly.point_template);
        resolve(base, &mut self.monthly.input_dir);
        resolve(base, &mut self.monthly.output_dir);
        for directory in &mut self.chart.font_dirs {
            resolve(base, directory);
        }
    }

    /// Rejects values the pipeline cannot work with
    pub fn check(&self) -> Result<(), ReportError> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_owned(),
            reason: reason.to_owned(),
        };
        if self.table.max_rows == 0 {
            Err(invalid("table.max_rows", "must be at least 1"))?;
        }
        if self.table.columns.is_empty() {
            Err(invalid("table.columns", "must not be empty"))?;
        }
        if !(self.table.min_font_size > 0.0 && self.table.min_font_size <= self.table.base_font_size) {
            Err(invalid("table.min_font_size", "must be positive and not above base_font_size"))?;
        }
        if self.donut_max == 0 {
            Err(invalid("donut_max", "must be at least 1"))?;
        }
        if !self.output_name.ends_with(".pptx") {
            Err(invalid("output_name", "must end with .pptx"))?;
        }
        for (index, rule) in self.shape_rules.iter().enumerate() {
            if rule.any_of.is_empty() || rule.any_of.iter().any(|markers| markers.is_empty()) {
                Err(invalid(&format!("shape_rules[{index}]"), "every alternative needs at least one marker"))?;
            }
        }
        for (role, keywords) in self.datasets.patterns() {
            if keywords.is_empty() {
                Err(invalid(&format!("datasets.{role}.keywords"), "must not be empty"))?;
            }
        }
        for (role, series) in [("login", &self.datasets.login), ("purchase", &self.datasets.purchase)] {
            if series.date_column.is_empty() || series.value_column.is_empty() {
                Err(invalid(&format!("datasets.{role}"), "date_column and value_column are required"))?;
            }
        }
        self.title_strip_regex()?;
        Ok(())
    }

    pub fn title_strip_regex(&self) -> Result<Regex, ReportError> {
        Ok(Regex::new(&self.title_strip_pattern)?)
    }

    /// Output deck file name for a period
    pub fn output_file_name(&self, period: &str) -> String {
        self.output_name.replace("{period}", period)
    }

    /// Fails when the template deck does not exist
    pub fn require_template(&self) -> Result<(), ReportError> {
        if self.template.is_file() {
            Ok(())
        } else {
            Err(ConfigError::MissingTemplate(self.template.display().to_string()))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Role;

    #[test]
    fn defaults_are_valid() {
        let config = ReportConfig::default();
        config.check().unwrap();
        assert_eq!(config.table.max_rows, 10);
        assert_eq!(config.donut_max, 8);
        assert_eq!(config.output_file_name("202602"), "JCB報告資料_202602.pptx");
        let strip = config.title_strip_regex().unwrap();
        assert_eq!(strip.replace_all("Acme（申込企業：Acme Holdings）", ""), "Acme");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "table:\n  max_rows: 5\ndatasets:\n  login:\n    keywords: [weekly]\n    date_column: week\n    value_column: users\n";
        let config = ReportConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.table.max_rows, 5);
        assert_eq!(config.table.columns.len(), 4);
        assert_eq!(config.datasets.login.keywords, vec!["weekly"]);
        assert_eq!(config.datasets.login.entity_column, "company_name");
        assert_eq!(config.datasets.summary.entity_column, "client_name");
        assert_eq!(config.shape_rules[0].role, Role::Title);
    }

    #[test]
    fn relative_paths_resolve_against_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.yaml");
        std::fs::write(&path, "template: deck/template.pptx\ntasks_dir: /var/tasks\n").unwrap();
        let config = ReportConfig::load(Some(&path)).unwrap();
        assert_eq!(config.template, dir.path().join("deck/template.pptx"));
        assert_eq!(config.tasks_dir, PathBuf::from("/var/tasks"));
        assert!(config.require_template().is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = ReportConfig::from_yaml("table:\n  min_font_size: 12\n").unwrap();
        let error = config.check().unwrap_err();
        assert!(error.to_string().contains("table.min_font_size"));

        let config = ReportConfig::from_yaml("title_strip_pattern: '('\n").unwrap();
        assert!(config.check().is_err());
    }
}
