//! Structural Validator: compares the table geometry of every slide of an output deck
//! with the table of the template's first slide.
use crate::deck::shape;
use crate::deck::shape::Geometry;
use crate::deck::Deck;
use crate::deck::DeckError;
use crate::deck::Slide;
use crate::error::ReportError;
use std::fmt;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One structural difference, `slide` counted from 1
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub slide: usize,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide {}: {}", self.slide, self.message)
    }
}

/// Measurements of the first table on a slide
#[derive(Clone, Debug, PartialEq)]
struct TableMetrics {
    geometry: Geometry,
    row_heights: Vec<i64>,
    column_widths: Vec<i64>,
    paragraph_counts: Vec<Vec<usize>>,
}

fn table_metrics(slide: &Slide) -> Result<Option<TableMetrics>, ReportError> {
    let frame = slide
        .shape_tree()?
        .elements()
        .find(|element| element.is("graphicFrame") && element.find("tbl").is_some());
    let frame = match frame {
        Some(frame) => frame,
        None => return Ok(None),
    };
    let table = match frame.find("tbl") {
        Some(table) => table,
        None => return Ok(None),
    };
    let column_widths = table
        .child("tblGrid")
        .map(|grid| {
            grid.children_named("gridCol")
                .map(|column| column.parse_attribute::<i64>("w").unwrap_or(0))
                .collect()
        })
        .unwrap_or_default();
    let rows: Vec<_> = table.children_named("tr").collect();
    let row_heights = rows.iter().map(|row| row.parse_attribute::<i64>("h").unwrap_or(0)).collect();
    // A cell without a text body still renders one empty paragraph
    let paragraph_counts = rows
        .iter()
        .map(|row| {
            row.children_named("tc")
                .map(|cell| cell.child("txBody").map(|body| body.children_named("p").count()).unwrap_or(1))
                .collect()
        })
        .collect();
    Ok(Some(TableMetrics {
        geometry: shape::geometry(frame).unwrap_or_default(),
        row_heights,
        column_widths,
        paragraph_counts,
    }))
}

/// Compares one slide's table against the template's, appending every difference
fn compare(slide: usize, expected: &TableMetrics, actual: &TableMetrics, issues: &mut Vec<Issue>) {
    let mut report = |severity: Severity, message: String| {
        issues.push(Issue { slide, severity, message });
    };

    if actual.row_heights.len() != expected.row_heights.len() {
        report(
            Severity::Error,
            format!("row count mismatch: template={}, output={}", expected.row_heights.len(), actual.row_heights.len()),
        );
    }
    if actual.column_widths.len() != expected.column_widths.len() {
        report(
            Severity::Error,
            format!("column count mismatch: template={}, output={}", expected.column_widths.len(), actual.column_widths.len()),
        );
    }
    for (index, (template, output)) in expected.row_heights.iter().zip(&actual.row_heights).enumerate() {
        if template != output {
            report(
                Severity::Warning,
                format!("row {index} height mismatch: template={template}, output={output}"),
            );
        }
    }
    for (index, (template, output)) in expected.column_widths.iter().zip(&actual.column_widths).enumerate() {
        if template != output {
            report(
                Severity::Error,
                format!("column {index} width mismatch: template={template}, output={output}"),
            );
        }
    }

    let (template, output) = (expected.geometry, actual.geometry);
    if (template.x, template.y) != (output.x, output.y) {
        report(
            Severity::Warning,
            format!(
                "table moved: template=({},{}), output=({},{})",
                template.x, template.y, output.x, output.y
            ),
        );
    }
    if (template.cx, template.cy) != (output.cx, output.cy) {
        report(
            Severity::Error,
            format!(
                "table size mismatch: template=({}x{}), output=({}x{})",
                template.cx, template.cy, output.cx, output.cy
            ),
        );
    }

    for (row, counts) in actual.paragraph_counts.iter().enumerate() {
        for (column, count) in counts.iter().enumerate() {
            if *count > 1 {
                report(
                    Severity::Error,
                    format!("row {row} column {column}: {count} paragraphs, expected 1"),
                );
            }
        }
    }
}

/// Checks every slide of `output` against the table of the first slide of `template`.
/// Never stops at the first problem.
pub fn validate(output: &Deck, template: &Deck) -> Result<Vec<Issue>, ReportError> {
    let expected = table_metrics(&template.slide(0)?)?.ok_or(DeckError::TemplateWithoutTable)?;
    let mut issues = Vec::new();
    for index in 0..output.slide_count()? {
        let slide = index + 1;
        match table_metrics(&output.slide(index)?)? {
            Some(actual) => compare(slide, &expected, &actual, &mut issues),
            None => issues.push(Issue {
                slide,
                severity: Severity::Error,
                message: "table not found".to_owned(),
            }),
        }
    }
    Ok(issues)
}

/// [`validate`] over decks on disk
pub fn validate_files(output: &Path, template: &Path) -> Result<Vec<Issue>, ReportError> {
    validate(&Deck::open(output)?, &Deck::open(template)?)
}

pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(|issue| issue.severity == Severity::Error)
}

/// Logs issues grouped by severity, errors first
pub fn report(issues: &[Issue]) {
    if issues.is_empty() {
        log::info!("OK: table structure matches the template");
        return;
    }
    let errors: Vec<&Issue> = issues.iter().filter(|issue| issue.severity == Severity::Error).collect();
    let warnings: Vec<&Issue> = issues.iter().filter(|issue| issue.severity == Severity::Warning).collect();
    if !errors.is_empty() {
        log::error!("{} structural problem(s) found", errors.len());
        for issue in errors {
            log::error!("  {}", issue);
        }
    }
    if !warnings.is_empty() {
        log::warn!("{} structural warning(s)", warnings.len());
        for issue in warnings {
            log::warn!("  {}", issue);
        }
    }
}
