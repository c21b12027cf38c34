//! Document Merger: appends finished single-slide decks into one output deck.
use crate::deck::referenced_ids;
use crate::deck::shape;
use crate::deck::Deck;
use crate::deck::DeckError;
use crate::deck::Slide;
use crate::deck::SLIDE_CONTENT_TYPE;
use crate::error::ReportError;
use crate::helpers::xml::local_name;
use crate::helpers::xml::XmlElement;
use crate::package::relationships::relative_target;
use crate::package::relationships::resolve_target;
use crate::package::relationships::Relationships;
use crate::package::relationships::REL_IMAGE;
use crate::package::relationships::REL_NOTES_SLIDE;
use crate::package::relationships::REL_SLIDE;
use crate::package::relationships::REL_SLIDE_LAYOUT;
use crate::package::PackageError;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Smallest id PowerPoint accepts in `p:sldId`
const FIRST_SLIDE_ID: u32 = 256;

/// Layout for the copied slide: the source's own layout when the target has that part,
/// otherwise the layout of the target's first slide
fn choose_layout(target: &Deck, source_slide: &Slide) -> Result<String, ReportError> {
    if let Some(relationship) = source_slide.relationships.first_of(REL_SLIDE_LAYOUT) {
        let layout = resolve_target(&source_slide.part, &relationship.target);
        if target.package.has_part(&layout) {
            return Ok(layout);
        }
        log::debug!("Layout '{}' is not in the target deck, using the first slide's layout", layout);
    }
    let first = target.slide(0)?;
    first
        .relationships
        .first_of(REL_SLIDE_LAYOUT)
        .map(|relationship| resolve_target(&first.part, &relationship.target))
        .ok_or_else(|| PackageError::MissingPart(format!("slide layout of '{}'", first.part)).into())
}

/// Carries relationship references of copied elements over to the new slide
struct ReferenceCopier<'a> {
    source: &'a Deck,
    source_slide: &'a Slide,
    copied: BTreeMap<String, String>,
}

impl<'a> ReferenceCopier<'a> {
    fn new(source: &'a Deck, source_slide: &'a Slide) -> ReferenceCopier<'a> {
        ReferenceCopier {
            source,
            source_slide,
            copied: BTreeMap::new(),
        }
    }

    /// Rewrites every relationship id below `element`. Images get a fresh media part in
    /// the target, external targets are re-related, other internal parts are dropped.
    fn copy(
        &mut self,
        target: &mut Deck,
        part: &str,
        relationships: &mut Relationships,
        element: &mut XmlElement,
    ) -> Result<(), ReportError> {
        let mut dropped = Vec::new();
        for (name, value) in element.attributes.iter_mut() {
            if !name.contains(':') || !matches!(local_name(name), "id" | "embed" | "link" | "pict") {
                continue;
            }
            if let Some(copied) = self.copied.get(value.as_str()) {
                *value = copied.to_owned();
                continue;
            }
            let relationship = match self.source_slide.relationships.get(value) {
                Some(relationship) => relationship,
                None => continue,
            };
            let new_id = if relationship.external {
                relationships.add_external(&relationship.kind, &relationship.target)
            } else if relationship.kind == REL_IMAGE {
                let media = resolve_target(&self.source_slide.part, &relationship.target);
                let bytes = self.source.package.require_part(&media)?.to_vec();
                let extension = media.rsplit_once('.').map(|(_, extension)| extension).unwrap_or("png");
                let new_media = target.package.add_media(bytes, extension)?;
                relationships.add(REL_IMAGE, &relative_target(part, &new_media))
            } else {
                log::warn!("Dropping reference '{}' to '{}' while copying slide", value, relationship.target);
                dropped.push(name.to_owned());
                continue;
            };
            self.copied.insert(value.to_owned(), new_id.to_owned());
            *value = new_id;
        }
        for name in dropped {
            element.remove_attribute(&name);
        }
        for child in element.elements_mut() {
            self.copy(target, part, relationships, child)?;
        }
        Ok(())
    }
}

/// Appends a copy of the first slide of `source` to the end of `target`.
/// Returns the part name of the new slide.
///
/// The slide skeleton is cloned, non-picture shapes are deep-copied and every picture is
/// inserted again with its image stored as a new media part of the target.
pub fn append_slide(target: &mut Deck, source: &Deck) -> Result<String, ReportError> {
    let source_slide = source.slide(0)?;
    let layout = choose_layout(target, &source_slide)?;
    let part = target.package.unique_part_name("ppt/slides/slide", ".xml");
    if source_slide.relationships.first_of(REL_NOTES_SLIDE).is_some() {
        log::debug!("Notes of '{}' are not copied", source_slide.part);
    }

    let mut document = source_slide.document.clone();
    let tree = document
        .root
        .path_mut(&["cSld", "spTree"])
        .ok_or_else(|| DeckError::MissingShapeTree(source_slide.part.to_owned()))?;
    let originals: Vec<XmlElement> = tree.elements().filter(|element| shape::is_shape(element)).cloned().collect();
    tree.remove_elements(shape::is_shape);

    let mut relationships = Relationships::default();
    relationships.add(REL_SLIDE_LAYOUT, &relative_target(&part, &layout));
    let mut slide = Slide {
        part,
        document,
        relationships,
    };
    let mut copier = ReferenceCopier::new(source, &source_slide);
    copier.copy(target, &slide.part, &mut slide.relationships, &mut slide.document.root)?;

    for original in originals {
        let index = slide.shape_tree()?.elements().count();
        let picture = match (original.is("pic"), shape::shape_id(&original)) {
            (true, Some(id)) => source.picture_image(&source_slide, &original).ok().map(|image| (id, image)),
            _ => None,
        };
        match picture {
            Some((id, (bytes, extension))) => {
                let geometry = shape::geometry(&original).unwrap_or_default();
                let new_id = target.insert_picture(&mut slide, index, geometry, bytes, &extension)?;
                shape::set_shape_id(slide.shape_mut(new_id)?, id);
            }
            None => {
                let mut copy = original;
                copier.copy(target, &slide.part, &mut slide.relationships, &mut copy)?;
                slide.shape_tree_mut()?.push(copy);
            }
        }
    }
    prune_unreferenced(&mut slide);

    target.store_slide(&slide)?;
    target.package.set_override_content_type(&slide.part, SLIDE_CONTENT_TYPE)?;
    register_slide(target, &slide.part)?;
    log::debug!("Appended '{}' as '{}'", source_slide.part, slide.part);
    Ok(slide.part)
}

/// Drops relationships (other than the layout) that nothing in the slide references
fn prune_unreferenced(slide: &mut Slide) {
    let mut ids = BTreeSet::new();
    referenced_ids(&slide.document.root, &mut ids);
    slide
        .relationships
        .items
        .retain(|item| item.kind == REL_SLIDE_LAYOUT || ids.contains(&item.id));
}

/// Relates a slide part to the presentation and appends it to `p:sldIdLst`
fn register_slide(target: &mut Deck, part: &str) -> Result<(), ReportError> {
    let mut relationships = target.package.relationships(&target.presentation)?;
    let relationship = relationships.add(REL_SLIDE, &relative_target(&target.presentation, part));
    target.package.set_relationships(&target.presentation, &relationships)?;

    let mut presentation = target.package.xml(&target.presentation)?;
    let prefix = presentation
        .root
        .name
        .split_once(':')
        .map(|(prefix, _)| format!("{prefix}:"))
        .unwrap_or_default();
    let position = presentation
        .root
        .elements()
        .filter(|element| matches!(element.local_name(), "sldMasterIdLst" | "notesMasterIdLst" | "handoutMasterIdLst"))
        .count();
    let list = presentation.root.ensure_child(&format!("{prefix}sldIdLst"), position);
    let next = list
        .children_named("sldId")
        .filter_map(|entry| entry.parse_attribute::<u32>("id"))
        .max()
        .map(|id| id + 1)
        .unwrap_or(FIRST_SLIDE_ID)
        .max(FIRST_SLIDE_ID);
    list.push(
        XmlElement::new(&format!("{prefix}sldId"))
            .with_attribute("id", &next.to_string())
            .with_attribute("r:id", &relationship),
    );
    target.package.set_xml(&target.presentation, &presentation)
}
