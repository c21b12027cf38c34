//! # Workbook templates
//!
//! In-place editing of SpreadsheetML packages: cell values, formulas and cell
//! formats are rewritten while everything else in the template is kept as is.
use crate::error::ReportError;
use crate::helpers::xml::XmlDocument;
use crate::helpers::xml::XmlElement;
use crate::package::relationships::resolve_target;
use crate::package::relationships::REL_OFFICE_DOCUMENT;
use crate::package::Package;
use crate::tabular::reference::index_to_reference;
use crate::tabular::reference::reference_to_index;
use crate::tabular::Value;
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;

pub mod styles;

#[cfg(test)]
pub(crate) mod fixtures;

pub use styles::Border;
pub use styles::Styles;

const REL_CALC_CHAIN: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain";

/// Elements that precede `calcPr` in `workbook.xml`
const BEFORE_CALC_PR: [&str; 9] = [
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
];

/// Errors raised while editing workbook templates
#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("Sheet '{0}' has no sheetData")]
    MissingSheetData(String),

    #[error("Cell format {0} not found in styles")]
    MissingFormat(u32),

    #[error("Styles have no '{0}' collection")]
    MissingStyleCollection(String),
}

/// Value written into a cell
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    /// Formula text, with or without the leading `=`
    Formula(String),
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Empty => CellValue::Empty,
            Value::Number(number) => CellValue::Number(*number),
            Value::Text(text) => CellValue::Text(text.to_owned()),
        }
    }
}

/// Number text as stored in `<v>`
fn number_text(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        (number as i64).to_string()
    } else {
        number.to_string()
    }
}

/// Qualified name for `local` using the namespace prefix of `sibling`
fn qualified(sibling: &XmlElement, local: &str) -> String {
    match sibling.name.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{local}"),
        None => local.to_owned(),
    }
}

fn row_number(row: &XmlElement) -> Option<u32> {
    row.parse_attribute("r")
}

fn column_number(cell: &XmlElement) -> Option<u32> {
    cell.attribute("r")
        .and_then(reference_to_index)
        .map(|(_, column)| column as u32 + 1)
}

fn write_value(cell: &mut XmlElement, value: &CellValue) {
    cell.remove_attribute("t");
    cell.remove_elements(|child| matches!(child.local_name(), "f" | "v" | "is"));
    let element = |local: &str| XmlElement::new(&qualified(cell, local));
    let child = match value {
        CellValue::Empty => None,
        CellValue::Number(number) => Some(element("v").with_text(&number_text(*number))),
        CellValue::Formula(formula) => {
            Some(element("f").with_text(formula.strip_prefix('=').unwrap_or(formula)))
        }
        CellValue::Text(text) => {
            let mut t = element("t").with_text(text);
            if text.trim() != text.as_str() {
                t.set_attribute("xml:space", "preserve");
            }
            Some(element("is").with_child(t))
        }
    };
    if let Some(child) = child {
        if matches!(value, CellValue::Text(_)) {
            cell.set_attribute("t", "inlineStr");
        }
        cell.insert_element(0, child);
    }
}

/// One worksheet part, edited as a tree. Rows and columns are 1-based.
#[derive(Clone, Debug)]
pub struct Worksheet {
    pub name: String,
    part: String,
    document: XmlDocument,
}

impl Worksheet {
    fn sheet_data(&self) -> Option<&XmlElement> {
        self.document.root.child("sheetData")
    }

    fn sheet_data_mut(&mut self) -> Result<&mut XmlElement, ReportError> {
        let name = self.name.to_owned();
        self.document
            .root
            .child_mut("sheetData")
            .ok_or_else(|| WorkbookError::MissingSheetData(name).into())
    }

    /// Highest row number holding a row element, 0 for an empty sheet
    pub fn max_row(&self) -> u32 {
        self.sheet_data()
            .map(|data| data.children_named("row").filter_map(row_number).max().unwrap_or(0))
            .unwrap_or(0)
    }

    pub(crate) fn cell(&self, row: u32, column: u32) -> Option<&XmlElement> {
        self.sheet_data()?
            .children_named("row")
            .find(|element| row_number(element) == Some(row))?
            .children_named("c")
            .find(|cell| column_number(cell) == Some(column))
    }

    /// Gets a cell, creating its row and the cell itself in sorted position
    fn cell_mut(&mut self, row: u32, column: u32) -> Result<&mut XmlElement, ReportError> {
        let data = self.sheet_data_mut()?;
        let row_name = qualified(data, "row");
        let rows: Vec<Option<u32>> = data.children_named("row").map(row_number).collect();
        let row_index = match rows.iter().position(|number| *number == Some(row)) {
            Some(index) => index,
            None => {
                let index = rows.iter().position(|number| number.map(|number| number > row).unwrap_or(false)).unwrap_or(rows.len());
                let element = XmlElement::new(&row_name).with_attribute("r", &row.to_string());
                data.insert_element(index, element);
                index
            }
        };
        let row_element = data
            .children_named_mut("row")
            .nth(row_index)
            .ok_or_else(|| WorkbookError::MissingSheetData(row.to_string()))?;
        // Cached column spans would go stale
        row_element.remove_attribute("spans");

        let cell_name = qualified(row_element, "c");
        let columns: Vec<Option<u32>> = row_element.children_named("c").map(column_number).collect();
        let cell_index = match columns.iter().position(|number| *number == Some(column)) {
            Some(index) => index,
            None => {
                let index = columns
                    .iter()
                    .position(|number| number.map(|number| number > column).unwrap_or(false))
                    .unwrap_or(columns.len());
                let reference = index_to_reference(row as usize - 1, column as usize - 1);
                row_element.insert_element(index, XmlElement::new(&cell_name).with_attribute("r", &reference));
                index
            }
        };
        row_element
            .children_named_mut("c")
            .nth(cell_index)
            .ok_or_else(|| WorkbookError::MissingSheetData(column.to_string()).into())
    }

    /// Writes a value, keeping the cell's format
    pub fn set(&mut self, row: u32, column: u32, value: CellValue) -> Result<(), ReportError> {
        write_value(self.cell_mut(row, column)?, &value);
        Ok(())
    }

    /// Empties the values of existing cells in a block, keeping their formats
    pub fn clear(&mut self, rows: RangeInclusive<u32>, columns: RangeInclusive<u32>) -> Result<(), ReportError> {
        let data = self.sheet_data_mut()?;
        for row in data.children_named_mut("row") {
            if !row_number(row).map(|number| rows.contains(&number)).unwrap_or(false) {
                continue;
            }
            for cell in row.children_named_mut("c") {
                if column_number(cell).map(|number| columns.contains(&number)).unwrap_or(false) {
                    write_value(cell, &CellValue::Empty);
                }
            }
        }
        Ok(())
    }

    /// Cell format index of a cell, 0 when the cell does not exist
    pub fn style(&self, row: u32, column: u32) -> u32 {
        self.cell(row, column)
            .and_then(|cell| cell.parse_attribute("s"))
            .unwrap_or(0)
    }

    pub fn set_style(&mut self, row: u32, column: u32, xf: u32) -> Result<(), ReportError> {
        let cell = self.cell_mut(row, column)?;
        if xf == 0 {
            cell.remove_attribute("s");
        } else {
            cell.set_attribute("s", &xf.to_string());
        }
        Ok(())
    }

    /// The value of a cell as written by [`Worksheet::set`]; shared strings are not resolved
    pub fn value(&self, row: u32, column: u32) -> CellValue {
        let cell = match self.cell(row, column) {
            Some(cell) => cell,
            None => return CellValue::Empty,
        };
        if let Some(formula) = cell.child("f") {
            return CellValue::Formula(formula.text());
        }
        if let Some(inline) = cell.child("is") {
            return CellValue::Text(inline.text());
        }
        match cell.child("v").map(XmlElement::text) {
            Some(text) if cell.attribute("t").is_none() || cell.attribute("t") == Some("n") => {
                text.parse().map(CellValue::Number).unwrap_or(CellValue::Text(text))
            }
            Some(text) => CellValue::Text(text),
            None => CellValue::Empty,
        }
    }
}

/// A workbook template opened for editing
#[derive(Clone, Debug)]
pub struct Workbook {
    package: Package,
    workbook_part: String,
    sheets: Vec<(String, String)>,
    styles_part: Option<String>,
    styles: Option<Styles>,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Workbook, ReportError> {
        Workbook::from_package(Package::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Workbook, ReportError> {
        Workbook::from_package(Package::from_bytes(bytes)?)
    }

    fn from_package(package: Package) -> Result<Workbook, ReportError> {
        let workbook_part = package
            .related_part("", REL_OFFICE_DOCUMENT)?
            .unwrap_or_else(|| "xl/workbook.xml".to_owned());
        let document = package.xml(&workbook_part)?;
        let relationships = package.relationships(&workbook_part)?;
        let mut sheets = Vec::new();
        if let Some(list) = document.root.child("sheets") {
            for sheet in list.children_named("sheet") {
                let name = sheet.attribute("name").unwrap_or_default();
                let target = crate::deck::relationship_attribute(sheet, "id").and_then(|id| relationships.get(id));
                if let Some(relationship) = target {
                    sheets.push((name.to_owned(), resolve_target(&workbook_part, &relationship.target)));
                }
            }
        }
        let styles_part = relationships
            .items
            .iter()
            .find(|item| item.kind.ends_with("/styles"))
            .map(|item| resolve_target(&workbook_part, &item.target));
        let styles = match &styles_part {
            Some(part) => Some(Styles::parse(package.require_part(part)?)?),
            None => None,
        };
        Ok(Workbook {
            package,
            workbook_part,
            sheets,
            styles_part,
            styles,
        })
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(name, _)| name.as_str())
    }

    pub fn worksheet(&self, name: &str) -> Result<Worksheet, ReportError> {
        let part = self
            .sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, part)| part.to_owned())
            .ok_or_else(|| WorkbookError::MissingSheet(name.to_owned()))?;
        Ok(Worksheet {
            name: name.to_owned(),
            document: self.package.xml(&part)?,
            part,
        })
    }

    /// Writes an edited worksheet back into the package
    pub fn store(&mut self, sheet: &Worksheet) -> Result<(), ReportError> {
        self.package.set_xml(&sheet.part, &sheet.document)
    }

    pub fn styles_mut(&mut self) -> Result<&mut Styles, ReportError> {
        self.styles
            .as_mut()
            .ok_or_else(|| WorkbookError::MissingStyleCollection("styleSheet".to_owned()).into())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), ReportError> {
        self.finish()?;
        self.package.save(path)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, ReportError> {
        self.finish()?;
        self.package.to_bytes()
    }

    /// Stores the styles, drops the calculation chain and asks Excel to recalculate
    /// every formula on open
    fn finish(&mut self) -> Result<(), ReportError> {
        if let (Some(part), Some(styles)) = (&self.styles_part, &self.styles) {
            self.package.set_part(part, styles.to_bytes()?);
        }

        let mut relationships = self.package.relationships(&self.workbook_part)?;
        let chains: Vec<(String, String)> = relationships
            .items
            .iter()
            .filter(|item| item.kind == REL_CALC_CHAIN)
            .map(|item| (item.id.to_owned(), resolve_target(&self.workbook_part, &item.target)))
            .collect();
        for (id, part) in &chains {
            relationships.remove(id);
            self.package.remove_part(part);
            self.package.remove_override_content_type(part)?;
            log::debug!("Dropped calculation chain '{}'", part);
        }
        if !chains.is_empty() {
            self.package.set_relationships(&self.workbook_part, &relationships)?;
        }

        let mut document = self.package.xml(&self.workbook_part)?;
        let name = qualified(&document.root, "calcPr");
        let position = document
            .root
            .elements()
            .filter(|element| BEFORE_CALC_PR.contains(&element.local_name()))
            .count();
        document.root.ensure_child(&name, position).set_attribute("fullCalcOnLoad", "1");
        self.package.set_xml(&self.workbook_part, &document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::fixtures;

    #[test]
    fn writes_values_in_sorted_positions() {
        let workbook = fixtures::workbook();
        let mut sheet = workbook.worksheet("Data").unwrap();
        sheet.set(5, 3, CellValue::Number(1234.0)).unwrap();
        sheet.set(2, 2, CellValue::Text(" 商品 ".to_owned())).unwrap();
        sheet.set(2, 1, CellValue::Formula("=SUM(E2:E3)".to_owned())).unwrap();
        sheet.set(2, 3, CellValue::Number(0.25)).unwrap();

        let data = sheet.sheet_data().unwrap();
        let rows: Vec<u32> = data.children_named("row").filter_map(row_number).collect();
        assert_eq!(rows, vec![1, 2, 3, 5]);
        let row = data.children_named("row").nth(1).unwrap();
        let cells: Vec<&str> = row.children_named("c").filter_map(|cell| cell.attribute("r")).collect();
        assert_eq!(cells, vec!["A2", "B2", "C2"]);
        assert!(row.attribute("spans").is_none());

        assert_eq!(sheet.value(2, 1), CellValue::Formula("SUM(E2:E3)".to_owned()));
        assert_eq!(sheet.value(2, 2), CellValue::Text(" 商品 ".to_owned()));
        assert_eq!(sheet.value(2, 3), CellValue::Number(0.25));
        assert_eq!(sheet.value(5, 3), CellValue::Number(1234.0));
        assert_eq!(sheet.cell(2, 2).unwrap().attribute("t"), Some("inlineStr"));
        // Template format of B2 survives the write
        assert_eq!(sheet.style(2, 2), 1);
        assert_eq!(sheet.max_row(), 5);
    }

    #[test]
    fn clear_keeps_formats_and_leaves_other_columns() {
        let workbook = fixtures::workbook();
        let mut sheet = workbook.worksheet("Data").unwrap();
        sheet.clear(2..=10, 1..=2).unwrap();
        assert_eq!(sheet.value(2, 1), CellValue::Empty);
        assert_eq!(sheet.value(3, 2), CellValue::Empty);
        assert_eq!(sheet.style(2, 2), 1);
        assert_eq!(sheet.value(3, 3), CellValue::Number(7.0));
        assert_eq!(sheet.value(1, 1), CellValue::Text("ブランド".to_owned()));
    }

    #[test]
    fn saving_drops_calc_chain_and_requests_recalculation() {
        let mut workbook = fixtures::workbook();
        assert_eq!(workbook.sheet_names().collect::<Vec<_>>(), vec!["Data", "集計結果"]);
        assert!(matches!(
            workbook.worksheet("Missing").unwrap_err(),
            ReportError::WorkbookError(WorkbookError::MissingSheet(_))
        ));
        let mut sheet = workbook.worksheet("集計結果").unwrap();
        let xf = workbook.styles_mut().unwrap().with_solid_fill(sheet.style(1, 1), "FFFF00").unwrap();
        sheet.set_style(1, 1, xf).unwrap();
        workbook.store(&sheet).unwrap();

        let bytes = workbook.to_bytes().unwrap();
        let reopened = Workbook::from_bytes(&bytes).unwrap();
        assert!(!reopened.package.has_part("xl/calcChain.xml"));
        let types = String::from_utf8(reopened.package.part("[Content_Types].xml").unwrap().to_vec()).unwrap();
        assert!(!types.contains("calcChain"));
        let document = reopened.package.xml("xl/workbook.xml").unwrap();
        let names: Vec<&str> = document.root.elements().map(|element| element.local_name()).collect();
        assert_eq!(names, vec!["workbookPr", "sheets", "calcPr"]);
        assert_eq!(document.root.child("calcPr").unwrap().attribute("fullCalcOnLoad"), Some("1"));
        let sheet = reopened.worksheet("集計結果").unwrap();
        assert_eq!(sheet.style(1, 1), xf);
        assert_eq!(reopened.styles.as_ref().unwrap().format_count(), 3);
    }
}
