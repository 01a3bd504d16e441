//! Small in-memory XML tree
//!
//! The interchange documents are small and read or written whole, so they
//! go through an owned element tree built on `quick-xml` events.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::ExportError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: append an attribute
    pub fn attr(mut self, key: &str, value: impl Display) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// Builder: append `x`, `y` and `z` attributes
    pub fn xyz<T: Display>(self, v: [T; 3]) -> Self {
        let [x, y, z] = v;
        self.attr("x", x).attr("y", y).attr("z", z)
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, ExportError> {
        self.get(key).ok_or_else(|| ExportError::MissingAttribute {
            element: self.name.clone(),
            attribute: key.to_string(),
        })
    }

    /// Required attribute parsed as `T`
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<T, ExportError> {
        let value = self.require(key)?;
        value
            .trim()
            .parse()
            .map_err(|_| ExportError::InvalidAttribute {
                element: self.name.clone(),
                attribute: key.to_string(),
                value: value.to_string(),
            })
    }

    /// First child named `name`
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn find_required(&self, name: &str) -> Result<&Element, ExportError> {
        self.find(name)
            .ok_or_else(|| ExportError::MissingElement(name.to_string()))
    }

    /// All children named `name`
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Parse a document and return its root element
    pub fn parse_document(text: &str) -> Result<Element> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack.pop().context("unbalanced end tag")?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !stack.is_empty() {
            anyhow::bail!("unclosed <{}> element", stack[stack.len() - 1].name);
        }
        root.context("empty XML document")
    }

    pub fn read_file(path: &Path) -> Result<Element> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::parse_document(&text).with_context(|| format!("Failed to parse XML: {:?}", path))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Element> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute?;
            element.attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                attribute.unescape_value()?.into_owned(),
            ));
        }
        Ok(element)
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &self.children {
                child.write_to(writer)?;
            }
            writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        }
        Ok(())
    }

    /// Indented document with an XML declaration
    pub fn to_document(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.write_to(&mut writer)?;
        let mut text = String::from_utf8(writer.into_inner())?;
        text.push('\n');
        Ok(text)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_document()?)
            .with_context(|| format!("Failed to write {:?}", path))
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_reads_back() {
        let doc = Element::new("mesh").child(
            Element::new("submesh")
                .attr("material", "a<b")
                .child(Element::new("face").attr("v1", 0).attr("v2", 1).attr("v3", 2)),
        );
        let text = doc.to_document().unwrap();
        assert!(text.starts_with("<?xml"));
        assert_eq!(Element::parse_document(&text).unwrap(), doc);
    }

    #[test]
    fn test_attribute_errors() {
        let e = Element::new("face").attr("v1", "x");
        assert_eq!(e.parse::<u32>("v1").unwrap_err().code(), "OX002");
        assert_eq!(e.parse::<u32>("v2").unwrap_err().code(), "OX001");
        assert_eq!(e.find_required("vertex").unwrap_err().code(), "OX003");
    }

    #[test]
    fn test_unclosed_document() {
        assert!(Element::parse_document("<mesh><submeshes>").is_err());
        assert!(Element::parse_document("").is_err());
    }
}
