//! XML utilities shared by the presentation and workbook editors.
//! Provides the streaming reader wrapper, attribute/text helper traits and a small
//! owned element tree that can be edited in place and written back.

use crate::error::ReportError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),

    #[error("Unbalanced element '{0}'")]
    UnbalancedElementError(String),

    #[error("Document has no root element")]
    MissingRootError,
}

/// XML reader wrapper with the configuration used for all package parts
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a new XML reader; whitespace is kept because run text is significant
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, ReportError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(ReportError::XmlError(error)),
        }
    }
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, ReportError>;

    /// Parses the attribute value to the specified type
    fn parse_value<T: FromStr>(&self) -> Result<T, ReportError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, ReportError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, ReportError> {
        self.get_value()?
            .parse()
            .map_err(|_| match std::str::from_utf8(&self.value) {
                Ok(value) => ReportError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => ReportError::StringEncodingError(error),
            })
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ReportError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, ReportError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ReportError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, ReportError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesText event
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), ReportError>;

    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ReportError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), ReportError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ReportError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

/// Strips the namespace prefix from a qualified name
pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// A node of an owned XML tree
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An owned XML element with qualified names kept verbatim (e.g. `a:t`)
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct XmlElement {
    pub(crate) name: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) children: Vec<XmlNode>,
}

impl XmlElement {
    pub(crate) fn new(name: &str) -> XmlElement {
        XmlElement {
            name: name.to_owned(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub(crate) fn with_attribute(mut self, key: &str, value: &str) -> XmlElement {
        self.set_attribute(key, value);
        self
    }

    /// Builder-style child appender
    pub(crate) fn with_child(mut self, child: XmlElement) -> XmlElement {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder-style text appender
    pub(crate) fn with_text(mut self, text: &str) -> XmlElement {
        self.children.push(XmlNode::Text(text.to_owned()));
        self
    }

    pub(crate) fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub(crate) fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Gets an attribute by its qualified name, or by local name when no exact match exists
    pub(crate) fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .or_else(|| self.attributes.iter().find(|(name, _)| local_name(name) == key))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn parse_attribute<T: FromStr>(&self, key: &str) -> Option<T> {
        self.attribute(key).and_then(|value| value.parse().ok())
    }

    pub(crate) fn set_attribute(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => self.attributes.push((key.to_owned(), value.to_owned())),
        }
    }

    pub(crate) fn remove_attribute(&mut self, key: &str) {
        self.attributes.retain(|(name, _)| name != key);
    }

    /// Iterates over child elements, skipping text nodes
    pub(crate) fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child with the given local name
    pub(crate) fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.is(local))
    }

    pub(crate) fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|element| element.is(local))
    }

    /// Direct children with the given local name
    pub(crate) fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |element| element.is(local))
    }

    pub(crate) fn children_named_mut<'a>(&'a mut self, local: &'a str) -> impl Iterator<Item = &'a mut XmlElement> + 'a {
        self.elements_mut().filter(move |element| element.is(local))
    }

    /// Follows a path of local names through first-match children
    pub(crate) fn path(&self, locals: &[&str]) -> Option<&XmlElement> {
        locals.iter().try_fold(self, |element, local| element.child(local))
    }

    pub(crate) fn path_mut(&mut self, locals: &[&str]) -> Option<&mut XmlElement> {
        let mut element = self;
        for local in locals {
            element = element.child_mut(local)?;
        }
        Some(element)
    }

    /// Depth-first search for the first descendant with the given local name
    pub(crate) fn find(&self, local: &str) -> Option<&XmlElement> {
        for element in self.elements() {
            if element.is(local) {
                return Some(element);
            }
            if let Some(found) = element.find(local) {
                return Some(found);
            }
        }
        None
    }

    pub(crate) fn find_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        for element in self.elements_mut() {
            if element.is(local) {
                return Some(element);
            }
            if let Some(found) = element.find_mut(local) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given local name in document order
    pub(crate) fn descendants<'a>(&'a self, local: &str, found: &mut Vec<&'a XmlElement>) {
        for element in self.elements() {
            if element.is(local) {
                found.push(element);
            }
            element.descendants(local, found);
        }
    }

    /// Whether any descendant (or self) carries an attribute with the given local name
    pub(crate) fn any_attribute(&self, local: &str) -> bool {
        self.attributes.iter().any(|(name, _)| local_name(name) == local)
            || self.elements().any(|element| element.any_attribute(local))
    }

    /// Concatenated text of this element and all descendants
    pub(crate) fn text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(value) => text.push_str(value),
                XmlNode::Element(element) => element.collect_text(text),
            }
        }
    }

    /// Replaces all children with a single text node
    pub(crate) fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text.to_owned()));
        }
    }

    pub(crate) fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Inserts an element before the `index`-th child element (not node)
    pub(crate) fn insert_element(&mut self, index: usize, child: XmlElement) {
        let position = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, XmlNode::Element(_)))
            .nth(index)
            .map(|(position, _)| position)
            .unwrap_or(self.children.len());
        self.children.insert(position, XmlNode::Element(child));
    }

    /// Removes direct child elements matching the predicate, returning how many were removed
    pub(crate) fn remove_elements<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&XmlElement) -> bool,
    {
        let before = self.children.len();
        self.children.retain(|node| match node {
            XmlNode::Element(element) => !predicate(element),
            XmlNode::Text(_) => true,
        });
        before - self.children.len()
    }

    /// Gets the first child with the given local name, creating it at `index` when absent
    pub(crate) fn ensure_child(&mut self, qualified: &str, index: usize) -> &mut XmlElement {
        let local = local_name(qualified).to_owned();
        if self.child(&local).is_none() {
            self.insert_element(index, XmlElement::new(qualified));
        }
        self.child_mut(&local).expect("child inserted above")
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), ReportError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        for node in &self.children {
            match node {
                XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
                XmlNode::Element(element) => element.write(writer)?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// A whole XML part: declaration plus root element
#[derive(Clone, Debug)]
pub(crate) struct XmlDocument {
    pub(crate) root: XmlElement,
}

impl XmlDocument {
    pub(crate) fn new(root: XmlElement) -> XmlDocument {
        XmlDocument { root }
    }

    /// Parses a complete XML part into an owned tree
    pub(crate) fn parse(bytes: &[u8]) -> Result<XmlDocument, ReportError> {
        let mut reader = XmlReader::new(bytes);
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None::<XmlElement>;
        match_xml_events!(reader => {
            Event::Start(event) => {
                stack.push(to_element(&event)?);
            }
            Event::Empty(event) => {
                let element = to_element(&event)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(event) => {
                let element = stack.pop().ok_or_else(|| {
                    XmlError::UnbalancedElementError(String::from_utf8_lossy(event.name().as_ref()).to_string())
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(event) => {
                if let Some(parent) = stack.last_mut() {
                    let mut text = String::new();
                    text.push_bytes_text(&event)?;
                    push_text(parent, text);
                }
            }
            Event::CData(event) => {
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, event.xml_content()?.to_string());
                }
            }
            Event::GeneralRef(event) => {
                if let Some(parent) = stack.last_mut() {
                    let mut text = String::new();
                    text.push_bytes_ref(&event)?;
                    push_text(parent, text);
                }
            }
        });
        if let Some(element) = stack.pop() {
            Err(XmlError::UnbalancedElementError(element.name))?;
        }
        let root = root.ok_or(XmlError::MissingRootError)?;
        Ok(XmlDocument { root })
    }

    /// Serializes the tree with a standalone UTF-8 declaration
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\r\n")))?;
        self.root.write(&mut writer)?;
        Ok(writer.into_inner())
    }
}

fn to_element(event: &BytesStart) -> Result<XmlElement, ReportError> {
    let name = std::str::from_utf8(event.name().as_ref())?.to_owned();
    let mut element = XmlElement::new(&name);
    for attribute in event.attributes() {
        let attribute = attribute?;
        let key = std::str::from_utf8(attribute.key.as_ref())?.to_owned();
        let value = attribute.get_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(parent: &mut XmlElement, text: String) {
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(&text);
    } else {
        parent.children.push(XmlNode::Text(text));
    }
}
