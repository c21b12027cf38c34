use crate::error::ReportError;
use crate::helpers::xml::XmlDocument;
use crate::helpers::xml::XmlElement;

pub(crate) const RELATIONSHIPS_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

// Relationship types used by presentation parts
pub(crate) const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub(crate) const REL_SLIDE_LAYOUT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub(crate) const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub(crate) const REL_NOTES_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

/// One entry of a `.rels` part
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Relationship {
    pub(crate) id: String,
    pub(crate) kind: String,
    pub(crate) target: String,
    pub(crate) external: bool,
}

/// The relationships of a single source part
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Relationships {
    pub(crate) items: Vec<Relationship>,
}

impl Relationships {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Relationships, ReportError> {
        let document = XmlDocument::parse(bytes)?;
        let items = document
            .root
            .children_named("Relationship")
            .filter_map(|element| {
                let id = element.attribute("Id")?;
                let kind = element.attribute("Type")?;
                let target = element.attribute("Target")?;
                Some(Relationship {
                    id: id.to_owned(),
                    kind: kind.to_owned(),
                    target: target.to_owned(),
                    external: element.attribute("TargetMode") == Some("External"),
                })
            })
            .collect();
        Ok(Relationships { items })
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let mut root = XmlElement::new("Relationships").with_attribute("xmlns", RELATIONSHIPS_NAMESPACE);
        for item in &self.items {
            let mut element = XmlElement::new("Relationship")
                .with_attribute("Id", &item.id)
                .with_attribute("Type", &item.kind)
                .with_attribute("Target", &item.target);
            if item.external {
                element.set_attribute("TargetMode", "External");
            }
            root.push(element);
        }
        XmlDocument::new(root).to_bytes()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|item| item.id == id)
    }

    /// First relationship of the given type
    pub(crate) fn first_of(&self, kind: &str) -> Option<&Relationship> {
        self.items.iter().find(|item| item.kind == kind)
    }

    /// Adds an internal relationship and returns its new id (`rId{max + 1}`)
    pub(crate) fn add(&mut self, kind: &str, target: &str) -> String {
        self.push(kind, target, false)
    }

    /// Adds a relationship whose target lives outside the package
    pub(crate) fn add_external(&mut self, kind: &str, target: &str) -> String {
        self.push(kind, target, true)
    }

    fn push(&mut self, kind: &str, target: &str, external: bool) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|item| item.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");
        self.items.push(Relationship {
            id: id.to_owned(),
            kind: kind.to_owned(),
            target: target.to_owned(),
            external,
        });
        id
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Relationship> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }
}

/// Path of the `.rels` part describing `part` (empty `part` means the package itself)
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((directory, file)) => format!("{directory}/_rels/{file}.rels"),
        None if part.is_empty() => "_rels/.rels".to_owned(),
        None => format!("_rels/{part}.rels"),
    }
}

/// Directory of a part name, without a trailing slash
fn directory_of(part: &str) -> &str {
    part.rsplit_once('/').map(|(directory, _)| directory).unwrap_or("")
}

/// Resolves a relationship target relative to its source part into a part name
pub(crate) fn resolve_target(source: &str, target: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let joined;
    let path = if let Some(absolute) = target.strip_prefix('/') {
        absolute
    } else {
        joined = format!("{}/{}", directory_of(source), target);
        joined.as_str()
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Builds the relative target that points from `source` to the part `target`
pub(crate) fn relative_target(source: &str, target: &str) -> String {
    let from: Vec<&str> = directory_of(source).split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(to.len().saturating_sub(1));
    let mut segments: Vec<&str> = vec![".."; from.len() - common];
    segments.extend_from_slice(&to[common..]);
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_between_parts() {
        assert_eq!(rels_path("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_path(""), "_rels/.rels");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt/presentation.xml", "slides/slide2.xml"), "ppt/slides/slide2.xml");
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "/ppt/media/a.png"), "ppt/media/a.png");
        assert_eq!(relative_target("ppt/slides/slide2.xml", "ppt/media/image3.png"), "../media/image3.png");
        assert_eq!(relative_target("ppt/presentation.xml", "ppt/slides/slide3.xml"), "slides/slide3.xml");
        assert_eq!(
            relative_target("ppt/slides/slide1.xml", "ppt/slideLayouts/slideLayout2.xml"),
            "../slideLayouts/slideLayout2.xml"
        );
    }

    #[test]
    fn add_allocates_next_id() {
        let xml = br#"<Relationships xmlns="urn:r"><Relationship Id="rId1" Type="t1" Target="a.xml"/><Relationship Id="rId7" Type="t2" Target="http://x" TargetMode="External"/></Relationships>"#;
        let mut relationships = Relationships::parse(xml).unwrap();
        assert!(relationships.get("rId7").unwrap().external);
        assert_eq!(relationships.add(REL_IMAGE, "../media/image1.png"), "rId8");
        assert_eq!(relationships.first_of(REL_IMAGE).unwrap().id, "rId8");
        let reparsed = Relationships::parse(&relationships.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed, relationships);
        assert!(relationships.remove("rId1").is_some());
        assert!(relationships.get("rId1").is_none());
    }
}
