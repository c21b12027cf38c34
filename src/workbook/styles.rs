//! Editing of `xl/styles.xml`: deriving cell formats with a different fill or border.
use crate::error::ReportError;
use crate::helpers::xml::XmlDocument;
use crate::helpers::xml::XmlElement;
use crate::workbook::WorkbookError;
use std::collections::HashMap;

/// Line styles of the four cell edges; `None` leaves the edge undrawn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Border {
    pub left: Option<&'static str>,
    pub right: Option<&'static str>,
    pub top: Option<&'static str>,
    pub bottom: Option<&'static str>,
}

impl Border {
    /// Medium lines on the chosen edges
    pub fn medium(left: bool, right: bool, top: bool, bottom: bool) -> Border {
        let edge = |on: bool| if on { Some("medium") } else { None };
        Border {
            left: edge(left),
            right: edge(right),
            top: edge(top),
            bottom: edge(bottom),
        }
    }

    fn to_element(self) -> XmlElement {
        let edge = |name: &str, style: Option<&str>| match style {
            Some(style) => XmlElement::new(name)
                .with_attribute("style", style)
                .with_child(XmlElement::new("color").with_attribute("indexed", "64")),
            None => XmlElement::new(name),
        };
        XmlElement::new("border")
            .with_child(edge("left", self.left))
            .with_child(edge("right", self.right))
            .with_child(edge("top", self.top))
            .with_child(edge("bottom", self.bottom))
            .with_child(XmlElement::new("diagonal"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Derivation {
    Fill(String),
    Border(Border),
    Plain,
}

/// The stylesheet of a workbook
#[derive(Clone, Debug)]
pub struct Styles {
    document: XmlDocument,
    derived: HashMap<(u32, Derivation), u32>,
}

impl Styles {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Styles, ReportError> {
        Ok(Styles {
            document: XmlDocument::parse(bytes)?,
            derived: HashMap::new(),
        })
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        self.document.to_bytes()
    }

    /// Number of cell formats in `cellXfs`
    pub fn format_count(&self) -> usize {
        self.document
            .root
            .child("cellXfs")
            .map(|formats| formats.children_named("xf").count())
            .unwrap_or(0)
    }

    pub(crate) fn format(&self, index: u32) -> Option<&XmlElement> {
        self.document
            .root
            .child("cellXfs")?
            .children_named("xf")
            .nth(index as usize)
    }

    /// Copy of cell format `xf` with a solid fill of `rgb` (e.g. `FFFF00`)
    pub fn with_solid_fill(&mut self, xf: u32, rgb: &str) -> Result<u32, ReportError> {
        self.derive(xf, Derivation::Fill(rgb.to_ascii_uppercase()))
    }

    /// Copy of cell format `xf` with the given border
    pub fn with_border(&mut self, xf: u32, border: Border) -> Result<u32, ReportError> {
        self.derive(xf, Derivation::Border(border))
    }

    /// Copy of cell format `xf` without fill and border
    pub fn plain(&mut self, xf: u32) -> Result<u32, ReportError> {
        self.derive(xf, Derivation::Plain)
    }

    fn derive(&mut self, xf: u32, derivation: Derivation) -> Result<u32, ReportError> {
        if let Some(index) = self.derived.get(&(xf, derivation.clone())) {
            return Ok(*index);
        }
        let mut format = self.format(xf).cloned().ok_or(WorkbookError::MissingFormat(xf))?;
        match &derivation {
            Derivation::Fill(rgb) => {
                let color = format!("FF{rgb}");
                let fill = XmlElement::new("fill").with_child(
                    XmlElement::new("patternFill")
                        .with_attribute("patternType", "solid")
                        .with_child(XmlElement::new("fgColor").with_attribute("rgb", &color))
                        .with_child(XmlElement::new("bgColor").with_attribute("rgb", &color)),
                );
                let id = self.append("fills", fill)?;
                format.set_attribute("fillId", &id.to_string());
                format.set_attribute("applyFill", "1");
            }
            Derivation::Border(border) => {
                let id = self.append("borders", border.to_element())?;
                format.set_attribute("borderId", &id.to_string());
                format.set_attribute("applyBorder", "1");
            }
            Derivation::Plain => {
                format.set_attribute("fillId", "0");
                format.set_attribute("borderId", "0");
            }
        }
        let index = self.append("cellXfs", format)?;
        self.derived.insert((xf, derivation), index);
        Ok(index)
    }

    /// Appends a child to a counted collection (`fills`, `borders`, `cellXfs`) and
    /// returns its index
    fn append(&mut self, collection: &str, element: XmlElement) -> Result<u32, ReportError> {
        let list = self
            .document
            .root
            .child_mut(collection)
            .ok_or_else(|| WorkbookError::MissingStyleCollection(collection.to_owned()))?;
        let index = list.elements().count();
        list.push(element);
        list.set_attribute("count", &(index + 1).to_string());
        Ok(index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::fixtures::STYLES;

    #[test]
    fn derived_formats_keep_the_number_format() {
        let mut styles = Styles::parse(STYLES.as_bytes()).unwrap();
        let filled = styles.with_solid_fill(1, "ffff00").unwrap();
        assert_eq!(filled, 2);
        let format = styles.format(filled).unwrap();
        assert_eq!(format.attribute("numFmtId"), Some("3"));
        assert_eq!(format.attribute("fillId"), Some("2"));
        assert_eq!(styles.with_solid_fill(1, "FFFF00").unwrap(), filled);

        let bordered = styles.with_border(filled, Border::medium(true, false, false, true)).unwrap();
        let format = styles.format(bordered).unwrap();
        assert_eq!(format.attribute("fillId"), Some("2"));
        assert_eq!(format.attribute("borderId"), Some("1"));
        let border = styles.document.root.child("borders").unwrap().elements().nth(1).unwrap();
        assert_eq!(border.child("left").unwrap().attribute("style"), Some("medium"));
        assert_eq!(border.child("right").unwrap().attribute("style"), None);

        let plain = styles.plain(bordered).unwrap();
        let format = styles.format(plain).unwrap();
        assert_eq!((format.attribute("fillId"), format.attribute("borderId")), (Some("0"), Some("0")));
        assert_eq!(styles.format_count(), 5);
        assert_eq!(styles.document.root.child("cellXfs").unwrap().attribute("count"), Some("5"));
        assert!(styles.plain(99).is_err());
    }
}
