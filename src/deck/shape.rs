//! Read-only views over the shape elements of a slide's `p:spTree`.
use crate::helpers::xml::XmlElement;

/// Local names of the drawing elements that are shapes
pub(crate) const SHAPE_TAGS: [&str; 5] = ["sp", "pic", "graphicFrame", "grpSp", "cxnSp"];

pub(crate) fn is_shape(element: &XmlElement) -> bool {
    SHAPE_TAGS.contains(&element.local_name())
}

/// What a shape holds, as far as region detection cares
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ShapeKind {
    Table,
    Picture,
    Text,
    Other,
}

/// Offset and extent of a shape in EMU
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub(crate) x: i64,
    pub(crate) y: i64,
    pub(crate) cx: i64,
    pub(crate) cy: i64,
}

impl Geometry {
    pub(crate) fn to_xfrm(self, name: &str) -> XmlElement {
        XmlElement::new(name)
            .with_child(
                XmlElement::new("a:off")
                    .with_attribute("x", &self.x.to_string())
                    .with_attribute("y", &self.y.to_string()),
            )
            .with_child(
                XmlElement::new("a:ext")
                    .with_attribute("cx", &self.cx.to_string())
                    .with_attribute("cy", &self.cy.to_string()),
            )
    }
}

/// Summary of one top-level shape
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ShapeInfo {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) kind: ShapeKind,
    pub(crate) geometry: Option<Geometry>,
    pub(crate) text: String,
}

pub(crate) fn describe(element: &XmlElement) -> Option<ShapeInfo> {
    if !is_shape(element) {
        return None;
    }
    Some(ShapeInfo {
        id: shape_id(element)?,
        name: non_visual_properties(element)
            .and_then(|properties| properties.attribute("name"))
            .unwrap_or_default()
            .to_owned(),
        kind: kind(element),
        geometry: geometry(element),
        text: shape_text(element),
    })
}

fn kind(element: &XmlElement) -> ShapeKind {
    match element.local_name() {
        "graphicFrame" if element.find("tbl").is_some() => ShapeKind::Table,
        "pic" => ShapeKind::Picture,
        "sp" if element.child("txBody").is_some() => ShapeKind::Text,
        _ => ShapeKind::Other,
    }
}

/// The `cNvPr` element inside the shape's `nv*Pr` block
fn non_visual_properties(element: &XmlElement) -> Option<&XmlElement> {
    element
        .elements()
        .find(|child| child.local_name().starts_with("nv"))
        .and_then(|properties| properties.child("cNvPr"))
}

/// Drawing id of a shape, unique within its slide
pub(crate) fn shape_id(element: &XmlElement) -> Option<u32> {
    non_visual_properties(element)?.parse_attribute("id")
}

pub(crate) fn set_shape_id(element: &mut XmlElement, id: u32) {
    let properties = element
        .elements_mut()
        .find(|child| child.local_name().starts_with("nv"))
        .and_then(|properties| properties.child_mut("cNvPr"));
    if let Some(properties) = properties {
        properties.set_attribute("id", &id.to_string());
    }
}

/// The transform element holding the shape's position and size
pub(crate) fn transform(element: &XmlElement) -> Option<&XmlElement> {
    match element.local_name() {
        "graphicFrame" => element.child("xfrm"),
        "grpSp" => element.path(&["grpSpPr", "xfrm"]),
        _ => element.path(&["spPr", "xfrm"]),
    }
}

pub(crate) fn geometry(element: &XmlElement) -> Option<Geometry> {
    let xfrm = transform(element)?;
    let offset = xfrm.child("off");
    let extent = xfrm.child("ext");
    let value = |part: Option<&XmlElement>, key: &str| {
        part.and_then(|part| part.parse_attribute::<i64>(key)).unwrap_or(0)
    };
    Some(Geometry {
        x: value(offset, "x"),
        y: value(offset, "y"),
        cx: value(extent, "cx"),
        cy: value(extent, "cy"),
    })
}

/// Text of a paragraph: run, field and break content in order
pub(crate) fn paragraph_text(paragraph: &XmlElement) -> String {
    let mut text = String::new();
    for child in paragraph.elements() {
        match child.local_name() {
            "r" | "fld" => text.push_str(&child.child("t").map(XmlElement::text).unwrap_or_default()),
            "br" => text.push('\u{b}'),
            _ => (),
        }
    }
    text
}

/// Text of a shape's text body, paragraphs joined by line feeds
pub(crate) fn shape_text(element: &XmlElement) -> String {
    match element.child("txBody") {
        Some(body) => body
            .children_named("p")
            .map(paragraph_text)
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    }
}
