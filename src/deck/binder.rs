//! Field Binder: writes report values into located regions in place.
//!
//! Formatting lives in the template. Text is written into existing runs so run
//! properties survive, tables are filled without adding or removing rows, and
//! pictures are swapped for new ones at the same offset and extent.
use crate::config::TableConfig;
use crate::deck::locator::locate;
use crate::deck::locator::ImageRule;
use crate::deck::locator::TextRule;
use crate::deck::shape;
use crate::deck::Deck;
use crate::deck::DeckError;
use crate::deck::RegionMap;
use crate::deck::Role;
use crate::deck::Slide;
use crate::error::ReportError;
use crate::helpers::string::estimate_text_width;
use crate::helpers::string::format_thousands;
use crate::helpers::xml::XmlElement;
use crate::tabular::Table;
use crate::tabular::Value;

pub(crate) const EMU_PER_POINT: f64 = 12700.0;

/// Result of rewriting a composite chart label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelOutcome {
    Replaced,
    /// The label's first paragraph has fewer runs than the 6-run layout
    Malformed { runs: usize },
}

/// Qualified name for `local` using the namespace prefix of `sibling`
fn qualified(sibling: &str, local: &str) -> String {
    match sibling.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{local}"),
        None => local.to_owned(),
    }
}

fn set_run_text(run: &mut XmlElement, text: &str) {
    match run.child_mut("t") {
        Some(element) => element.set_text(text),
        None => {
            let name = qualified(&run.name, "t");
            run.push(XmlElement::new(&name).with_text(text));
        }
    }
}

fn set_font_size(run: &mut XmlElement, size: f64) {
    let name = qualified(&run.name, "rPr");
    let properties = run.ensure_child(&name, 0);
    properties.set_attribute("sz", &((size * 100.0).round() as i64).to_string());
}

/// Sets 100% line spacing and zero space before/after, in schema order at the head of `a:pPr`
pub(crate) fn normalize_spacing(paragraph: &mut XmlElement) {
    let name = qualified(&paragraph.name, "pPr");
    let element = |local: &str| XmlElement::new(&qualified(&name, local));
    let properties = paragraph.ensure_child(&name, 0);
    properties.remove_elements(|child| matches!(child.local_name(), "lnSpc" | "spcBef" | "spcAft"));
    properties.insert_element(0, element("lnSpc").with_child(element("spcPct").with_attribute("val", "100000")));
    properties.insert_element(1, element("spcBef").with_child(element("spcPts").with_attribute("val", "0")));
    properties.insert_element(2, element("spcAft").with_child(element("spcPts").with_attribute("val", "0")));
}

/// Writes `text` into the first run of the first paragraph that has runs and blanks
/// the other runs of that paragraph. Returns false when no paragraph has a run.
fn write_first_run(body: &mut XmlElement, text: &str, font_size: Option<f64>) -> bool {
    for paragraph in body.children_named_mut("p") {
        let mut written = false;
        for run in paragraph.children_named_mut("r") {
            if written {
                set_run_text(run, "");
            } else {
                set_run_text(run, text);
                if let Some(size) = font_size {
                    set_font_size(run, size);
                }
                written = true;
            }
        }
        if written {
            normalize_spacing(paragraph);
            return true;
        }
    }
    false
}

/// Appends a run to the first paragraph, formatted like the paragraph's end-run properties
fn append_run(body: &mut XmlElement, text: &str, font_size: Option<f64>) {
    let paragraph = body.ensure_child("a:p", usize::MAX);
    let mut run = XmlElement::new(&qualified(&paragraph.name, "r"));
    if let Some(end) = paragraph.child("endParaRPr") {
        let mut properties = end.clone();
        properties.name = qualified(&paragraph.name, "rPr");
        run.push(properties);
    }
    run.push(XmlElement::new(&qualified(&paragraph.name, "t")).with_text(text));
    if let Some(size) = font_size {
        set_font_size(&mut run, size);
    }
    let position = paragraph
        .elements()
        .position(|element| element.is("endParaRPr"))
        .unwrap_or_else(|| paragraph.elements().count());
    paragraph.insert_element(position, run);
    normalize_spacing(paragraph);
}

/// Replaces the text of a shape while keeping its run formatting.
/// Returns false when the shape has no text body.
pub(crate) fn replace_shape_text(shape: &mut XmlElement, text: &str) -> bool {
    let body = match shape.child_mut("txBody") {
        Some(body) => body,
        None => return false,
    };
    if !write_first_run(body, text, None) && !text.is_empty() {
        append_run(body, text, None);
    }
    true
}

/// Rewrites runs 2, 3 and 5 of a 6-run chart label:
/// `prefix`, `（`, `year`, `/month`, `middle`, `：value unit）`
pub(crate) fn replace_label_runs(shape: &mut XmlElement, year: &str, month: &str, value: &str, unit: &str) -> LabelOutcome {
    let paragraph = match shape.child_mut("txBody").and_then(|body| body.child_mut("p")) {
        Some(paragraph) => paragraph,
        None => return LabelOutcome::Malformed { runs: 0 },
    };
    let mut runs: Vec<&mut XmlElement> = paragraph.children_named_mut("r").collect();
    if runs.len() < 6 {
        return LabelOutcome::Malformed { runs: runs.len() };
    }
    set_run_text(&mut *runs[2], year);
    set_run_text(&mut *runs[3], &format!("/{month}"));
    set_run_text(&mut *runs[5], &format!("：{value}{unit}）"));
    normalize_spacing(paragraph);
    LabelOutcome::Replaced
}

/// Writes one table cell, keeping the formatting of its first run
pub(crate) fn set_cell_text(cell: &mut XmlElement, text: &str, font_size: Option<f64>) {
    if cell.child("txBody").is_none() {
        if text.is_empty() {
            return;
        }
        let element = |local: &str| XmlElement::new(&qualified(&cell.name, local));
        let body = element("txBody")
            .with_child(element("bodyPr"))
            .with_child(element("lstStyle"))
            .with_child(element("p"));
        cell.insert_element(0, body);
    }
    if let Some(body) = cell.child_mut("txBody") {
        if !write_first_run(body, text, font_size) && !text.is_empty() {
            append_run(body, text, font_size);
        }
    }
}

/// Font size (pt) that fits `text` on one line of a cell, searched in 0.5pt steps.
///
/// # Arguments
/// * `text` - Cell text, measured with full-width = 1.0 em and half-width = 0.5 em
/// * `column_width` - Grid column width in EMU
/// * `base_size` - Template font size; `None` is returned when it already fits
/// * `min_size` - Floor returned when no size fits
/// * `cell_margin` - Left and right cell margin in EMU
pub fn font_size_for_cell(text: &str, column_width: i64, base_size: f64, min_size: f64, cell_margin: i64) -> Option<f64> {
    let available = (column_width - cell_margin * 2) as f64;
    let width = estimate_text_width(text);
    if width == 0.0 {
        return None;
    }
    let fits = |size: f64| width * size * EMU_PER_POINT <= available;
    if fits(base_size) {
        return None;
    }
    let mut size = base_size - 0.5;
    while size >= min_size {
        if fits(size) {
            return Some(size);
        }
        size -= 0.5;
    }
    Some(min_size)
}

/// Display text of a table value: numbers outside the first column get thousands
/// separators, non-empty text gets the column's unit
fn cell_value_text(value: Option<&Value>, column_index: usize, unit: &str) -> String {
    let text = match value {
        Some(Value::Number(number)) if column_index > 0 => format_thousands(number.trunc() as i64),
        Some(value) => value.to_string(),
        None => String::new(),
    };
    if text.is_empty() {
        text
    } else {
        format!("{text}{unit}")
    }
}

/// Fills the data rows of a table graphic frame. Rows past the data are blanked,
/// data past `max_rows` or the template's rows is dropped, geometry is untouched.
pub(crate) fn fill_table_frame(frame: &mut XmlElement, data: &Table, layout: &TableConfig) -> bool {
    let table = match frame.find_mut("tbl") {
        Some(table) => table,
        None => return false,
    };
    let first_width = table
        .child("tblGrid")
        .and_then(|grid| grid.child("gridCol"))
        .and_then(|column| column.parse_attribute::<i64>("w"))
        .unwrap_or(0);
    let mut rows: Vec<&mut XmlElement> = table.children_named_mut("tr").collect();
    let budget = layout.max_rows.min(rows.len().saturating_sub(1));
    for (index, row) in rows.iter_mut().skip(1).take(budget).enumerate() {
        for (column_index, cell) in row.children_named_mut("tc").enumerate() {
            let text = match layout.columns.get(column_index) {
                Some(column) if index < data.len() => {
                    cell_value_text(data.get(index, &column.name), column_index, &column.unit)
                }
                _ => String::new(),
            };
            let font_size = if column_index == 0 && !text.is_empty() {
                font_size_for_cell(&text, first_width, layout.base_font_size, layout.min_font_size, layout.cell_margin)
            } else {
                None
            };
            set_cell_text(cell, &text, font_size);
        }
    }
    if data.len() > budget {
        log::info!("Table holds {} rows, dropping {} rows", budget, data.len() - budget);
    }
    true
}

/// Binds report values into the regions of one slide of a deck
pub struct Binder<'a> {
    deck: &'a mut Deck,
    slide: Slide,
    regions: RegionMap,
}

impl<'a> Binder<'a> {
    /// Opens the first slide of `deck` and locates its regions
    pub fn new(deck: &'a mut Deck, text_rules: &[TextRule], image_rules: &[ImageRule]) -> Result<Binder<'a>, ReportError> {
        let slide = deck.slide(0)?;
        let regions = locate(&slide, text_rules, image_rules)?;
        Ok(Binder { deck, slide, regions })
    }

    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    fn region(&self, role: Role) -> Result<u32, ReportError> {
        self.regions
            .get(role)
            .ok_or_else(|| DeckError::MissingRegion(role).into())
    }

    fn region_shape(&mut self, role: Role) -> Result<&mut XmlElement, ReportError> {
        let id = self.region(role)?;
        self.slide.shape_mut(id)
    }

    /// Replaces the text of a region, keeping the first run's formatting
    pub fn replace_text(&mut self, role: Role, text: &str) -> Result<(), ReportError> {
        if !replace_shape_text(self.region_shape(role)?, text) {
            log::warn!("Region '{}' has no text body", role);
        }
        Ok(())
    }

    /// Rewrites the period and value runs of a composite chart label
    pub fn replace_chart_label(&mut self, role: Role, year: &str, month: &str, value: &str, unit: &str) -> Result<LabelOutcome, ReportError> {
        let outcome = replace_label_runs(self.region_shape(role)?, year, month, value, unit);
        if let LabelOutcome::Malformed { runs } = outcome {
            log::warn!("Chart label '{}' has {} runs instead of 6, left unchanged", role, runs);
        }
        Ok(outcome)
    }

    /// Fills the table region with the rows of `data`
    pub fn fill_table(&mut self, role: Role, data: &Table, layout: &TableConfig) -> Result<(), ReportError> {
        if !fill_table_frame(self.region_shape(role)?, data, layout) {
            Err(DeckError::NotATable(role))?;
        }
        Ok(())
    }

    /// Swaps the picture of a region for a new image at the same offset and extent
    pub fn replace_picture(&mut self, role: Role, bytes: Vec<u8>, extension: &str) -> Result<(), ReportError> {
        let id = self.region(role)?;
        let index = self.slide.shape_index(id)?;
        let geometry = shape::geometry(self.slide.shape(id)?).unwrap_or_default();
        self.slide.remove_shape(id)?;
        let new_id = self.deck.insert_picture(&mut self.slide, index, geometry, bytes, extension)?;
        log::debug!("Replaced picture {} of '{}' with picture {}", id, role, new_id);
        Ok(())
    }

    /// Removes the shape of a region; a region that was never found is left alone
    pub fn remove_shape(&mut self, role: Role) -> Result<bool, ReportError> {
        match self.regions.get(role) {
            Some(id) => self.slide.remove_shape(id),
            None => Ok(false),
        }
    }

    /// Writes the edited slide back into the deck
    pub fn finish(self) -> Result<(), ReportError> {
        self.deck.store_slide(&self.slide)
    }
}
