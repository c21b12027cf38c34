//! # Presentation decks
//!
//! Template-driven editing of PresentationML packages:
//!
//! - [`locator`] classifies the shapes of a slide into semantic regions
//! - [`binder`] writes text, tables and pictures into those regions
//! - [`merge`] appends finished slides into one output deck
//! - [`validate`] compares the table geometry of an output deck with its template
use crate::error::ReportError;
use crate::helpers::xml::local_name;
use crate::helpers::xml::XmlDocument;
use crate::helpers::xml::XmlElement;
use crate::package::relationships::relative_target;
use crate::package::relationships::resolve_target;
use crate::package::relationships::Relationships;
use crate::package::relationships::REL_IMAGE;
use crate::package::relationships::REL_OFFICE_DOCUMENT;
use crate::package::relationships::REL_SLIDE;
use crate::package::Package;
use shape::Geometry;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

pub mod binder;
pub mod locator;
pub mod merge;
pub(crate) mod shape;
pub mod validate;

#[cfg(test)]
pub(crate) mod fixtures;

pub use locator::RegionMap;
pub use locator::Role;

pub(crate) const SLIDE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// Errors raised while reading or editing slides
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Region '{0}' was not found in the slide")]
    MissingRegion(Role),

    #[error("Region '{0}' does not hold a table")]
    NotATable(Role),

    #[error("Deck has no slides")]
    NoSlides,

    #[error("Slide part '{0}' has no shape tree")]
    MissingShapeTree(String),

    #[error("Shape {0} was not found in the slide")]
    MissingShape(u32),

    #[error("Picture {0} has no embedded image")]
    MissingImage(u32),

    #[error("Template has no table to compare against")]
    TemplateWithoutTable,
}

/// Gets the relationship id attribute (`r:id`, `r:embed`…) of an element by local name
pub(crate) fn relationship_attribute<'a>(element: &'a XmlElement, local: &str) -> Option<&'a str> {
    element
        .attributes
        .iter()
        .find(|(name, _)| name.contains(':') && local_name(name) == local)
        .map(|(_, value)| value.as_str())
}

/// Collects every namespaced `id`/`embed`/`link`/`pict` attribute value below an element
pub(crate) fn referenced_ids(element: &XmlElement, ids: &mut BTreeSet<String>) {
    for (name, value) in &element.attributes {
        if name.contains(':') && matches!(local_name(name), "id" | "embed" | "link" | "pict") {
            ids.insert(value.to_owned());
        }
    }
    for child in element.elements() {
        referenced_ids(child, ids);
    }
}

/// One slide part with its relationships
#[derive(Clone, Debug)]
pub struct Slide {
    pub(crate) part: String,
    pub(crate) document: XmlDocument,
    pub(crate) relationships: Relationships,
}

impl Slide {
    pub(crate) fn shape_tree(&self) -> Result<&XmlElement, ReportError> {
        self.document
            .root
            .path(&["cSld", "spTree"])
            .ok_or_else(|| DeckError::MissingShapeTree(self.part.to_owned()).into())
    }

    pub(crate) fn shape_tree_mut(&mut self) -> Result<&mut XmlElement, ReportError> {
        let part = self.part.to_owned();
        self.document
            .root
            .path_mut(&["cSld", "spTree"])
            .ok_or_else(|| DeckError::MissingShapeTree(part).into())
    }

    /// Position of a top-level shape among the shape tree's child elements
    pub(crate) fn shape_index(&self, id: u32) -> Result<usize, ReportError> {
        self.shape_tree()?
            .elements()
            .position(|element| shape::is_shape(element) && shape::shape_id(element) == Some(id))
            .ok_or_else(|| DeckError::MissingShape(id).into())
    }

    pub(crate) fn shape(&self, id: u32) -> Result<&XmlElement, ReportError> {
        let index = self.shape_index(id)?;
        self.shape_tree()?
            .elements()
            .nth(index)
            .ok_or_else(|| DeckError::MissingShape(id).into())
    }

    pub(crate) fn shape_mut(&mut self, id: u32) -> Result<&mut XmlElement, ReportError> {
        let index = self.shape_index(id)?;
        self.shape_tree_mut()?
            .elements_mut()
            .nth(index)
            .ok_or_else(|| DeckError::MissingShape(id).into())
    }

    /// Top-level shapes in document order
    pub(crate) fn shapes(&self) -> Result<Vec<shape::ShapeInfo>, ReportError> {
        Ok(self.shape_tree()?.elements().filter_map(shape::describe).collect())
    }

    /// Largest drawing id used anywhere in the slide
    pub(crate) fn max_shape_id(&self) -> u32 {
        let mut found = Vec::new();
        self.document.root.descendants("cNvPr", &mut found);
        found
            .iter()
            .filter_map(|element| element.parse_attribute::<u32>("id"))
            .max()
            .unwrap_or(1)
    }

    /// Removes a top-level shape and the image relationships nothing references any more
    pub(crate) fn remove_shape(&mut self, id: u32) -> Result<bool, ReportError> {
        let removed = self
            .shape_tree_mut()?
            .remove_elements(|element| shape::is_shape(element) && shape::shape_id(element) == Some(id));
        if removed > 0 {
            self.prune_image_relationships();
        }
        Ok(removed > 0)
    }

    fn prune_image_relationships(&mut self) {
        let mut ids = BTreeSet::new();
        referenced_ids(&self.document.root, &mut ids);
        self.relationships
            .items
            .retain(|item| item.kind != REL_IMAGE || ids.contains(&item.id));
    }
}

/// A presentation package
#[derive(Clone, Debug)]
pub struct Deck {
    pub(crate) package: Package,
    pub(crate) presentation: String,
}

impl Deck {
    pub fn open(path: &Path) -> Result<Deck, ReportError> {
        Deck::from_package(Package::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Deck, ReportError> {
        Deck::from_package(Package::from_bytes(bytes)?)
    }

    pub(crate) fn from_package(package: Package) -> Result<Deck, ReportError> {
        let presentation = package
            .related_part("", REL_OFFICE_DOCUMENT)?
            .unwrap_or_else(|| "ppt/presentation.xml".to_owned());
        package.require_part(&presentation)?;
        Ok(Deck { package, presentation })
    }

    /// Writes the deck after dropping media parts no relationship points at
    pub fn save(&mut self, path: &Path) -> Result<(), ReportError> {
        self.prune_media()?;
        self.package.save(path)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, ReportError> {
        self.prune_media()?;
        self.package.to_bytes()
    }

    /// Slide part names in presentation order
    pub(crate) fn slide_parts(&self) -> Result<Vec<String>, ReportError> {
        let presentation = self.package.xml(&self.presentation)?;
        let relationships = self.package.relationships(&self.presentation)?;
        let mut parts = Vec::new();
        if let Some(list) = presentation.root.child("sldIdLst") {
            for entry in list.children_named("sldId") {
                let target = relationship_attribute(entry, "id")
                    .and_then(|id| relationships.get(id))
                    .filter(|relationship| relationship.kind == REL_SLIDE);
                if let Some(relationship) = target {
                    parts.push(resolve_target(&self.presentation, &relationship.target));
                }
            }
        }
        Ok(parts)
    }

    pub fn slide_count(&self) -> Result<usize, ReportError> {
        Ok(self.slide_parts()?.len())
    }

    pub(crate) fn slide(&self, index: usize) -> Result<Slide, ReportError> {
        let part = self
            .slide_parts()?
            .into_iter()
            .nth(index)
            .ok_or(DeckError::NoSlides)?;
        Ok(Slide {
            document: self.package.xml(&part)?,
            relationships: self.package.relationships(&part)?,
            part,
        })
    }

    /// Writes a slide's document and relationships back into the package
    pub(crate) fn store_slide(&mut self, slide: &Slide) -> Result<(), ReportError> {
        self.package.set_xml(&slide.part, &slide.document)?;
        self.package.set_relationships(&slide.part, &slide.relationships)
    }

    /// Bytes and file extension of the image a picture shape embeds
    pub(crate) fn picture_image(&self, slide: &Slide, picture: &XmlElement) -> Result<(Vec<u8>, String), ReportError> {
        let id = shape::shape_id(picture).unwrap_or(0);
        let target = picture
            .find("blip")
            .and_then(|blip| relationship_attribute(blip, "embed"))
            .and_then(|embed| slide.relationships.get(embed))
            .filter(|relationship| !relationship.external)
            .ok_or(DeckError::MissingImage(id))?;
        let part = resolve_target(&slide.part, &target.target);
        let extension = part.rsplit_once('.').map(|(_, extension)| extension).unwrap_or("png").to_owned();
        Ok((self.package.require_part(&part)?.to_vec(), extension))
    }

    /// Stores an image as a new media part and relates it to the slide
    pub(crate) fn add_image(&mut self, slide: &mut Slide, bytes: Vec<u8>, extension: &str) -> Result<String, ReportError> {
        let part = self.package.add_media(bytes, extension)?;
        Ok(slide.relationships.add(REL_IMAGE, &relative_target(&slide.part, &part)))
    }

    /// Inserts a new picture at `index` of the shape tree with the given geometry.
    /// Returns the drawing id of the new shape.
    pub(crate) fn insert_picture(
        &mut self,
        slide: &mut Slide,
        index: usize,
        geometry: Geometry,
        bytes: Vec<u8>,
        extension: &str,
    ) -> Result<u32, ReportError> {
        let relationship = self.add_image(slide, bytes, extension)?;
        let id = slide.max_shape_id() + 1;
        let picture = picture_element(id, &relationship, geometry);
        slide.shape_tree_mut()?.insert_element(index, picture);
        Ok(id)
    }

    /// Drops media parts that no relationship of the package targets
    fn prune_media(&mut self) -> Result<(), ReportError> {
        let mut targets = BTreeSet::new();
        let sources: Vec<String> = self
            .package
            .part_names()
            .filter(|name| name.ends_with(".rels"))
            .map(str::to_owned)
            .collect();
        for rels in sources {
            let source = source_of_rels(&rels);
            let relationships = Relationships::parse(self.package.require_part(&rels)?)?;
            for item in relationships.items.iter().filter(|item| !item.external) {
                targets.insert(resolve_target(&source, &item.target).to_ascii_lowercase());
            }
        }
        let orphans: Vec<String> = self
            .package
            .part_names()
            .filter(|name| name.contains("/media/") && !targets.contains(&name.to_ascii_lowercase()))
            .map(str::to_owned)
            .collect();
        for orphan in orphans {
            log::debug!("Dropping unreferenced media part '{}'", orphan);
            self.package.remove_part(&orphan);
        }
        Ok(())
    }
}

/// Source part of a `.rels` part name (`ppt/slides/_rels/slide1.xml.rels` → `ppt/slides/slide1.xml`)
fn source_of_rels(rels: &str) -> String {
    let stripped = rels.strip_suffix(".rels").unwrap_or(rels);
    match stripped.rsplit_once("_rels/") {
        Some((directory, file)) => format!("{directory}{file}"),
        None => stripped.to_owned(),
    }
}

/// Builds a `p:pic` element embedding `relationship` at the given geometry
fn picture_element(id: u32, relationship: &str, geometry: Geometry) -> XmlElement {
    XmlElement::new("p:pic")
        .with_child(
            XmlElement::new("p:nvPicPr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attribute("id", &id.to_string())
                        .with_attribute("name", &format!("Picture {}", id - 1)),
                )
                .with_child(
                    XmlElement::new("p:cNvPicPr")
                        .with_child(XmlElement::new("a:picLocks").with_attribute("noChangeAspect", "1")),
                )
                .with_child(XmlElement::new("p:nvPr")),
        )
        .with_child(
            XmlElement::new("p:blipFill")
                .with_child(XmlElement::new("a:blip").with_attribute("r:embed", relationship))
                .with_child(XmlElement::new("a:stretch").with_child(XmlElement::new("a:fillRect"))),
        )
        .with_child(
            XmlElement::new("p:spPr")
                .with_child(geometry.to_xfrm("a:xfrm"))
                .with_child(
                    XmlElement::new("a:prstGeom")
                        .with_attribute("prst", "rect")
                        .with_child(XmlElement::new("a:avLst")),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::fixtures;

    #[test]
    fn reads_slides_in_presentation_order() {
        let deck = fixtures::template_deck();
        assert_eq!(deck.slide_parts().unwrap(), vec!["ppt/slides/slide1.xml"]);
        let slide = deck.slide(0).unwrap();
        assert!(slide.shapes().unwrap().len() >= 10);
        assert!(matches!(
            deck.slide(1).unwrap_err(),
            ReportError::DeckError(DeckError::NoSlides)
        ));
    }

    #[test]
    fn inserted_picture_keeps_geometry_and_unused_media_is_dropped() {
        let mut deck = fixtures::template_deck();
        let mut slide = deck.slide(0).unwrap();
        let geometry = Geometry { x: 1, y: 2, cx: 3, cy: 4 };
        let id = deck.insert_picture(&mut slide, 0, geometry, vec![9, 9], "png").unwrap();
        assert_eq!(shape::geometry(slide.shape(id).unwrap()), Some(geometry));
        let (bytes, extension) = deck.picture_image(&slide, slide.shape(id).unwrap()).unwrap();
        assert_eq!((bytes, extension.as_str()), (vec![9, 9], "png"));

        assert!(slide.remove_shape(id).unwrap());
        assert!(!slide.remove_shape(id).unwrap());
        deck.store_slide(&slide).unwrap();
        let bytes = deck.to_bytes().unwrap();
        let reopened = Deck::from_bytes(&bytes).unwrap();
        let media = reopened.package.part_names().filter(|name| name.contains("/media/")).count();
        assert_eq!(media, fixtures::TEMPLATE_PICTURES);
    }

    #[test]
    fn rels_names_map_back_to_their_source() {
        assert_eq!(source_of_rels("ppt/slides/_rels/slide1.xml.rels"), "ppt/slides/slide1.xml");
        assert_eq!(source_of_rels("_rels/.rels"), "");
    }
}
