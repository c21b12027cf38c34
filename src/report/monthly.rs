//! Monthly spreadsheet reports: campaign promotion cost and point usage.
//!
//! Both reports start from a workbook template whose data ranges are cleared and
//! rewritten. Formulas are left to Excel, which recalculates them on open.
use crate::config::ConfigError;
use crate::config::MonthlyConfig;
use crate::error::ReportError;
use crate::error::ResultMessage;
use crate::report::RunError;
use crate::report::INPUT_EXTENSIONS;
use crate::tabular;
use crate::tabular::detect::detect_files;
use crate::tabular::Table;
use crate::workbook::Border;
use crate::workbook::CellValue;
use crate::workbook::Workbook;
use crate::workbook::Worksheet;
use std::path::Path;
use std::path::PathBuf;

const CAMPAIGN_RAW_SHEET: &str = "(元データ)キャンペーン販売商品とその割引総額";
const DISCOUNT_RAW_SHEET: &str = "(元データ)基本割引率一覧";
const CAMPAIGN_SHEET: &str = "キャンペーン費用集計";
const POINT_RAW_SHEET: &str = "(元データ) oasis ポイント利用状況(月次)";
const POINT_SHEET: &str = "集計結果";

/// Campaign item columns; the first three fall back to blank, the rest to zero
const CAMPAIGN_COLUMNS: [&str; 11] = [
    "brand_name",
    "item_name",
    "item_code",
    "discount_rate",
    "issue_count",
    "item_price",
    "total_item_price",
    "purchase_price",
    "total_purchase_amount",
    "discount_amount",
    "total_discount_amount",
];
const CAMPAIGN_TEXT_COLUMNS: usize = 3;

const DISCOUNT_COLUMNS: [&str; 14] = [
    "ブランド",
    "商品",
    "gx_item_type",
    "gx_item_code",
    "等価価格",
    "割引率",
    "割引価格",
    "おすすめ度",
    "掲載状況",
    "案件個別_掲載可",
    "マスタ_掲載可",
    "更新日",
    "project_id",
    "client_id",
];

const POINT_COLUMNS: [&str; 10] = [
    "client_id",
    "company_name",
    "month",
    "granted_points",
    "used_points",
    "remaining_points",
    "avg_user_usage",
    "point_usage_rate_percent",
    "monthly_point_users",
    "point_consumption_rate_percent",
];

/// Point summary columns; the two point columns fall back to zero
const POINT_SUMMARY_COLUMNS: [&str; 5] = ["client_id", "company_name", "month", "granted_points", "used_points"];

/// Last row of the point summary template, which carries a note in F
const POINT_TEMPLATE_LAST_ROW: u32 = 28;
const SUM_FILL: &str = "FFFF00";
const SUM_LABEL: &str = "合計利用pt";

/// Parameters of a monthly run; unset files are detected in the input directory
#[derive(Clone, Debug, Default)]
pub struct MonthlyRequest {
    pub period: String,
    pub campaign: Option<PathBuf>,
    pub discount: Option<PathBuf>,
    pub point: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// What a monthly run produced
#[derive(Clone, Debug, Default)]
pub struct MonthlyOutcome {
    pub outputs: Vec<PathBuf>,
    /// Reports skipped for lack of input, with the missing datasets
    pub skipped: Vec<String>,
    /// Inputs moved out of the input directory
    pub moved: Vec<PathBuf>,
}

/// Value of a column, `fallback` when the column is missing or the cell is empty
fn field(table: &Table, row: usize, column: &str, fallback: CellValue) -> CellValue {
    match table.get(row, column) {
        Some(value) if !value.is_empty() => CellValue::from(value),
        _ => fallback,
    }
}

fn write_campaign_fields(sheet: &mut Worksheet, sheet_row: u32, table: &Table, row: usize) -> Result<(), ReportError> {
    for (index, column) in CAMPAIGN_COLUMNS.iter().enumerate() {
        let fallback = if index < CAMPAIGN_TEXT_COLUMNS {
            CellValue::Empty
        } else {
            CellValue::Number(0.0)
        };
        sheet.set(sheet_row, index as u32 + 1, field(table, row, column, fallback))?;
    }
    Ok(())
}

/// Writes the non-empty values of `columns`, one table row per sheet row from `first_row`
fn write_present_values(sheet: &mut Worksheet, first_row: u32, table: &Table, columns: &[&str]) -> Result<(), ReportError> {
    for row in 0..table.len() {
        for (index, column) in columns.iter().enumerate() {
            if let Some(value) = table.get(row, column).filter(|value| !value.is_empty()) {
                sheet.set(first_row + row as u32, index as u32 + 1, CellValue::from(value))?;
            }
        }
    }
    Ok(())
}

/// Per-row formulas of the cost sheet, columns L to T
pub(crate) fn campaign_formulas(row: u32, last_rate_row: u32) -> [String; 9] {
    let r = row;
    [
        format!("=VLOOKUP({CAMPAIGN_SHEET}!$C{r},'{DISCOUNT_RAW_SHEET}'!D$2:L${last_rate_row},3,)"),
        format!("=VLOOKUP({CAMPAIGN_SHEET}!$C{r},'{DISCOUNT_RAW_SHEET}'!D$2:N${last_rate_row},4,)"),
        format!("=M{r}*E{r}"),
        format!("=ROUNDDOWN(F{r}*L{r},0)"),
        format!("=O{r}*E{r}"),
        format!("=G{r}-N{r}"),
        format!("=IF(Q{r}=P{r},\"OK\",\"\")"),
        format!("=K{r}-P{r}"),
        format!("=IF($D{r}=$L{r},\"通常\",\"キャンペーン\")"),
    ]
}

/// Fills the campaign promotion cost workbook
pub fn fill_campaign(workbook: &mut Workbook, campaign: &Table, discount: &Table) -> Result<(), ReportError> {
    let mut raw = workbook.worksheet(CAMPAIGN_RAW_SHEET)?;
    raw.clear(2..=raw.max_row(), 1..=11)?;
    for row in 0..campaign.len() {
        write_campaign_fields(&mut raw, row as u32 + 2, campaign, row)?;
    }
    workbook.store(&raw)?;

    let mut rates = workbook.worksheet(DISCOUNT_RAW_SHEET)?;
    rates.clear(2..=rates.max_row(), 1..=14)?;
    write_present_values(&mut rates, 2, discount, &DISCOUNT_COLUMNS)?;
    workbook.store(&rates)?;

    let mut cost = workbook.worksheet(CAMPAIGN_SHEET)?;
    cost.clear(4..=cost.max_row(), 1..=20)?;
    let last_rate_row = discount.len() as u32 + 1;
    for row in 0..campaign.len() {
        let sheet_row = row as u32 + 4;
        write_campaign_fields(&mut cost, sheet_row, campaign, row)?;
        for (offset, formula) in campaign_formulas(sheet_row, last_rate_row).into_iter().enumerate() {
            cost.set(sheet_row, 12 + offset as u32, CellValue::Formula(formula))?;
        }
    }
    let last_row = campaign.len() as u32 + 3;
    for (column, letter) in [(11, "K"), (16, "P"), (17, "Q"), (19, "S")] {
        cost.set(3, column, CellValue::Formula(format!("=SUM({letter}4:{letter}{last_row})")))?;
    }
    workbook.store(&cost)?;
    log::debug!("Campaign report: {} items, {} discount rates", campaign.len(), discount.len());
    Ok(())
}

/// Fills the point usage workbook: raw data, per-client summary and the total row
pub fn fill_point(workbook: &mut Workbook, point: &Table) -> Result<(), ReportError> {
    let mut raw = workbook.worksheet(POINT_RAW_SHEET)?;
    raw.clear(2..=raw.max_row(), 1..=10)?;
    write_present_values(&mut raw, 2, point, &POINT_COLUMNS)?;
    workbook.store(&raw)?;

    let mut result = workbook.worksheet(POINT_SHEET)?;
    result.clear(2..=result.max_row(), 1..=5)?;
    for row in 0..point.len() {
        for (index, column) in POINT_SUMMARY_COLUMNS.iter().enumerate() {
            let fallback = if index >= 3 { CellValue::Number(0.0) } else { CellValue::Empty };
            result.set(row as u32 + 2, index as u32 + 1, field(point, row, column, fallback))?;
        }
    }

    let last_data_row = point.len() as u32 + 1;
    let sum_row = last_data_row + 1;
    result.set(sum_row, 2, CellValue::Text(SUM_LABEL.to_owned()))?;
    result.set(sum_row, 5, CellValue::Formula(format!("=SUM(E2:E{last_data_row})")))?;
    let styles = workbook.styles_mut()?;
    let filled = styles.with_solid_fill(result.style(sum_row, 5), SUM_FILL)?;
    result.set_style(sum_row, 5, filled)?;
    for column in 1..=5 {
        let border = Border::medium(column == 1, column == 5, false, true);
        let xf = styles.with_border(result.style(sum_row, column), border)?;
        result.set_style(sum_row, column, xf)?;
    }

    // Template note below the table
    result.clear(POINT_TEMPLATE_LAST_ROW..=POINT_TEMPLATE_LAST_ROW, 6..=6)?;
    if sum_row != POINT_TEMPLATE_LAST_ROW {
        for row in sum_row + 1..=POINT_TEMPLATE_LAST_ROW {
            for column in 1..=5 {
                let xf = result.style(row, column);
                if result.cell(row, column).is_some() && xf != 0 {
                    let plain = styles.plain(xf)?;
                    result.set_style(row, column, plain)?;
                }
            }
        }
        result.clear(sum_row + 1..=POINT_TEMPLATE_LAST_ROW, 1..=5)?;
    }
    workbook.store(&result)?;
    log::debug!("Point report: {} clients, total in row {}", point.len(), sum_row);
    Ok(())
}

fn require_file(path: &Path) -> Result<(), ReportError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RunError::MissingInput(path.display().to_string()))?
    }
}

fn open_template(path: &Path) -> Result<Workbook, ReportError> {
    if !path.is_file() {
        Err(ConfigError::MissingTemplate(path.display().to_string()))?;
    }
    Workbook::open(path).with_prefix(&format!("Open template '{}'", path.display()))
}

fn load_input(path: &Path) -> Result<Table, ReportError> {
    tabular::load(path).with_prefix(&format!("Load '{}'", path.display()))
}

/// Moves a file, copying across file systems when a rename is not possible
fn move_file(source: &Path, target: &Path) -> Result<(), ReportError> {
    if std::fs::rename(source, target).is_err() {
        std::fs::copy(source, target)?;
        std::fs::remove_file(source)?;
    }
    Ok(())
}

/// Generates the monthly reports whose inputs are available.
///
/// # Arguments
/// * `config` - Monthly report settings
/// * `request` - Target month plus explicit inputs and output directory
///
/// # Returns
/// * `Result<MonthlyOutcome, ReportError>` - Written reports, skipped reports and moved inputs
pub fn run_monthly(config: &MonthlyConfig, request: &MonthlyRequest) -> Result<MonthlyOutcome, ReportError> {
    let patterns = vec![
        ("campaign".to_owned(), config.campaign_keywords.clone()),
        ("discount".to_owned(), config.discount_keywords.clone()),
        ("point".to_owned(), config.point_keywords.clone()),
    ];
    let detected = detect_files(&config.input_dir, &patterns, &INPUT_EXTENSIONS)?;
    let pick = |explicit: &Option<PathBuf>, role: &str| explicit.clone().or_else(|| detected.get(role).map(Path::to_path_buf));
    let campaign = pick(&request.campaign, "campaign");
    let discount = pick(&request.discount, "discount");
    let point = pick(&request.point, "point");

    let output_dir = request
        .output
        .clone()
        .unwrap_or_else(|| config.output_dir.join(&request.period));
    std::fs::create_dir_all(&output_dir)?;

    let mut outcome = MonthlyOutcome::default();
    let mut consumed: Vec<PathBuf> = Vec::new();

    match (&campaign, &discount) {
        (Some(campaign), Some(discount)) => {
            require_file(campaign)?;
            require_file(discount)?;
            log::info!("Campaign data: {}", campaign.display());
            log::info!("Discount rates: {}", discount.display());
            let mut workbook = open_template(&config.campaign_template)?;
            fill_campaign(&mut workbook, &load_input(campaign)?, &load_input(discount)?)?;
            let output = output_dir.join(config.campaign_output_name.replace("{period}", &request.period));
            workbook.save(&output)?;
            log::info!("Campaign promotion cost: {}", output.display());
            outcome.outputs.push(output);
            consumed.extend([campaign.to_owned(), discount.to_owned()]);
        }
        _ => {
            let missing: Vec<&str> = [("campaign items", &campaign), ("discount rates", &discount)]
                .iter()
                .filter(|(_, path)| path.is_none())
                .map(|(name, _)| *name)
                .collect();
            log::warn!("Skipped campaign promotion cost: no {}", missing.join(", "));
            outcome.skipped.push(format!("campaign ({})", missing.join(", ")));
        }
    }

    match &point {
        Some(point) => {
            require_file(point)?;
            log::info!("Point data: {}", point.display());
            let mut workbook = open_template(&config.point_template)?;
            fill_point(&mut workbook, &load_input(point)?)?;
            let output = output_dir.join(config.point_output_name.replace("{period}", &request.period));
            workbook.save(&output)?;
            log::info!("Point usage: {}", output.display());
            outcome.outputs.push(output);
            consumed.push(point.to_owned());
        }
        None => {
            log::warn!("Skipped point usage: no point data");
            outcome.skipped.push("point (point usage)".to_owned());
        }
    }

    if outcome.outputs.is_empty() {
        Err(RunError::NothingGenerated(config.input_dir.display().to_string()))?;
    }

    let backup = output_dir.join("input");
    for path in consumed {
        if path.parent() != Some(config.input_dir.as_path()) || !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name() {
            std::fs::create_dir_all(&backup)?;
            let target = backup.join(name);
            move_file(&path, &target).with_prefix(&format!("Move input '{}'", path.display()))?;
            log::info!("Moved {} to {}", path.display(), backup.display());
            outcome.moved.push(target);
        }
    }
    Ok(outcome)
}
