//! # OPC package
//!
//! An Office Open XML package (`.pptx`, `.xlsx`) held fully in memory as an
//! ordered list of parts. Parts are edited as bytes or as [`XmlDocument`]s and the
//! package is written back as a new ZIP archive. Content types and relationships
//! are maintained here so the presentation and workbook editors never touch the
//! archive directly.
use crate::error::ReportError;
use crate::helpers::xml::XmlDocument;
use crate::helpers::xml::XmlElement;
use crate::helpers::zip::ZipHelper;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

pub(crate) mod relationships;

use relationships::rels_path;
use relationships::resolve_target;
use relationships::Relationships;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Errors raised while reading or editing package parts
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Missing part '{0}'")]
    MissingPart(String),

    #[error("Invalid part '{part}': {reason}")]
    InvalidPart { part: String, reason: String },

    #[error("Unsupported image format '{0}'")]
    UnsupportedImage(String),
}

/// An in-memory OPC package
#[derive(Clone, Debug, Default)]
pub(crate) struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    pub(crate) fn open(path: &Path) -> Result<Package, ReportError> {
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let parts = zip.read_all()?;
        log::debug!("Opened package '{}' with {} parts", path.display(), parts.len());
        Package::from_parts(parts)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Package, ReportError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        Package::from_parts(zip.read_all()?)
    }

    pub(crate) fn from_parts(parts: Vec<(String, Vec<u8>)>) -> Result<Package, ReportError> {
        let package = Package { parts };
        if !package.has_part(CONTENT_TYPES_PART) {
            Err(PackageError::MissingPart(CONTENT_TYPES_PART.to_owned()))?;
        }
        Ok(package)
    }

    /// Writes the package as a deflated ZIP archive
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // content types first, as Office writes them
        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|(name, _)| name != CONTENT_TYPES_PART));
        for (name, bytes) in ordered {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_bytes()?)?;
        log::debug!("Saved package '{}'", path.display());
        Ok(())
    }

    pub(crate) fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn has_part(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    pub(crate) fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(part, _)| part.eq_ignore_ascii_case(name))
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Like [`Package::part`] but a missing part is an error
    pub(crate) fn require_part(&self, name: &str) -> Result<&[u8], ReportError> {
        self.part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_owned()).into())
    }

    /// Replaces a part's bytes or appends a new part
    pub(crate) fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        match self.parts.iter_mut().find(|(part, _)| part.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = bytes,
            None => self.parts.push((name.to_owned(), bytes)),
        }
    }

    pub(crate) fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|(part, _)| !part.eq_ignore_ascii_case(name));
        before != self.parts.len()
    }

    pub(crate) fn xml(&self, name: &str) -> Result<XmlDocument, ReportError> {
        XmlDocument::parse(self.require_part(name)?)
    }

    pub(crate) fn set_xml(&mut self, name: &str, document: &XmlDocument) -> Result<(), ReportError> {
        let bytes = document.to_bytes()?;
        self.set_part(name, bytes);
        Ok(())
    }

    /// Relationships of a part; a part without a `.rels` part has none
    pub(crate) fn relationships(&self, part: &str) -> Result<Relationships, ReportError> {
        match self.part(&rels_path(part)) {
            Some(bytes) => Relationships::parse(bytes),
            None => Ok(Relationships::default()),
        }
    }

    pub(crate) fn set_relationships(&mut self, part: &str, relationships: &Relationships) -> Result<(), ReportError> {
        let bytes = relationships.to_bytes()?;
        self.set_part(&rels_path(part), bytes);
        Ok(())
    }

    /// Part name targeted by the first relationship of `kind` from `source`
    pub(crate) fn related_part(&self, source: &str, kind: &str) -> Result<Option<String>, ReportError> {
        Ok(self
            .relationships(source)?
            .first_of(kind)
            .map(|relationship| resolve_target(source, &relationship.target)))
    }

    /// First part name `{prefix}{N}{suffix}` not yet present, counting from 1
    pub(crate) fn unique_part_name(&self, prefix: &str, suffix: &str) -> String {
        (1..)
            .map(|index| format!("{prefix}{index}{suffix}"))
            .find(|name| !self.has_part(name))
            .unwrap_or_default()
    }

    /// Registers a content type for an extension unless one is already present
    pub(crate) fn ensure_default_content_type(&mut self, extension: &str, content_type: &str) -> Result<(), ReportError> {
        let mut types = self.xml(CONTENT_TYPES_PART)?;
        let exists = types
            .root
            .children_named("Default")
            .any(|element| element.attribute("Extension").map(|value| value.eq_ignore_ascii_case(extension)) == Some(true));
        if !exists {
            let position = types.root.children_named("Default").count();
            types.root.insert_element(
                position,
                XmlElement::new("Default")
                    .with_attribute("Extension", extension)
                    .with_attribute("ContentType", content_type),
            );
            self.set_xml(CONTENT_TYPES_PART, &types)?;
        }
        Ok(())
    }

    /// Adds (or replaces) the override entry of a part
    pub(crate) fn set_override_content_type(&mut self, part: &str, content_type: &str) -> Result<(), ReportError> {
        let mut types = self.xml(CONTENT_TYPES_PART)?;
        let part_name = format!("/{part}");
        types.root.remove_elements(|element| element.is("Override") && element.attribute("PartName") == Some(part_name.as_str()));
        types.root.push(
            XmlElement::new("Override")
                .with_attribute("PartName", &part_name)
                .with_attribute("ContentType", content_type),
        );
        self.set_xml(CONTENT_TYPES_PART, &types)
    }

    pub(crate) fn remove_override_content_type(&mut self, part: &str) -> Result<(), ReportError> {
        let mut types = self.xml(CONTENT_TYPES_PART)?;
        let part_name = format!("/{part}");
        let removed = types.root.remove_elements(|element| {
            element.is("Override") && element.attribute("PartName") == Some(part_name.as_str())
        });
        if removed > 0 {
            self.set_xml(CONTENT_TYPES_PART, &types)?;
        }
        Ok(())
    }

    /// Stores image bytes as a new media part and returns its part name
    pub(crate) fn add_media(&mut self, bytes: Vec<u8>, extension: &str) -> Result<String, ReportError> {
        let extension = extension.to_ascii_lowercase();
        let content_type = image_content_type(&extension)
            .ok_or_else(|| PackageError::UnsupportedImage(extension.to_owned()))?;
        let root = self.media_root();
        let name = self.unique_part_name(&format!("{root}/media/image"), &format!(".{extension}"));
        self.ensure_default_content_type(&extension, content_type)?;
        self.set_part(&name, bytes);
        Ok(name)
    }

    /// Top-level folder of the main document part (`ppt` or `xl`)
    fn media_root(&self) -> &'static str {
        if self.has_part("xl/workbook.xml") {
            "xl"
        } else {
            "ppt"
        }
    }
}

/// Content type of an image file extension
pub(crate) fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "svg" => Some("image/svg+xml"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Package {
        Package::from_parts(vec![
            (
                CONTENT_TYPES_PART.to_owned(),
                br#"<Types xmlns="urn:ct"><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_vec(),
            ),
            ("ppt/presentation.xml".to_owned(), b"<p:presentation xmlns:p=\"urn:p\"/>".to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn media_parts_get_unique_names_and_content_types() {
        let mut package = minimal();
        let first = package.add_media(vec![1, 2, 3], "PNG").unwrap();
        let second = package.add_media(vec![4], "png").unwrap();
        assert_eq!(first, "ppt/media/image1.png");
        assert_eq!(second, "ppt/media/image2.png");
        let types = package.xml(CONTENT_TYPES_PART).unwrap();
        assert_eq!(types.root.children_named("Default").count(), 2);
        assert!(package.add_media(vec![0], "xyz").is_err());
    }

    #[test]
    fn round_trips_through_zip() {
        let mut package = minimal();
        package.set_override_content_type("ppt/slides/slide1.xml", "application/slide").unwrap();
        package.set_part("ppt/slides/slide1.xml", b"<sld/>".to_vec());
        let reopened = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.part("ppt/slides/slide1.xml"), Some(&b"<sld/>"[..]));
        assert_eq!(reopened.part_names().next(), Some(CONTENT_TYPES_PART));
        let types = reopened.xml(CONTENT_TYPES_PART).unwrap();
        assert_eq!(types.root.children_named("Override").count(), 1);

        let mut reopened = reopened;
        reopened.remove_override_content_type("ppt/slides/slide1.xml").unwrap();
        assert!(reopened.remove_part("ppt/slides/slide1.xml"));
        assert_eq!(reopened.xml(CONTENT_TYPES_PART).unwrap().root.children_named("Override").count(), 0);
    }

    #[test]
    fn missing_content_types_is_rejected() {
        let error = Package::from_parts(vec![("a.xml".to_owned(), Vec::new())]).unwrap_err();
        assert!(error.to_string().contains("Content_Types"));
    }
}
