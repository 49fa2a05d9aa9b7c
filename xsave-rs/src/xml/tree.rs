//! Provides a small in-memory representation of an XML subtree.
//!
//! Fragments are small compared to the whole savegame, therefore they are materialized as a
//! plain tree of [XmlNode] before being processed. The same representation is handed to the
//! **ExpandTree** handlers while streaming.
use anyhow::{bail, Context};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Represents an element along with its attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
    text: String,
}

impl XmlNode {
    /// Creates a new and empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        XmlNode {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds the given attribute and returns the element itself for fluent calls.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Adds the given child and returns the element itself for fluent calls.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Creates an element (without children) for the given start tag.
    ///
    /// Attributes which cannot be decoded are kept as raw text or skipped (see
    /// [attributes_of](crate::xml::attributes_of)).
    pub fn from_start(element: &BytesStart) -> XmlNode {
        XmlNode {
            name: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
            attributes: crate::xml::attributes_of(element),
            ..Default::default()
        }
    }

    /// Reads the subtree of the given (already consumed) start tag from the reader.
    ///
    /// Returns once the matching end tag has been consumed, so that the reader is positioned
    /// right behind the subtree.
    pub fn read_subtree<B: BufRead>(
        reader: &mut Reader<B>,
        element: &BytesStart,
        buffer: &mut Vec<u8>,
    ) -> anyhow::Result<XmlNode> {
        let mut stack = vec![XmlNode::from_start(element)];
        loop {
            match reader.read_event_into(buffer)? {
                Event::Start(child) => stack.push(XmlNode::from_start(&child)),
                Event::End(_) => {
                    let node = stack.pop().context("Unbalanced end tag")?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        match text.unescape() {
                            Ok(text) => node.text.push_str(&text),
                            Err(error) => {
                                log::warn!("Keeping raw text in <{}>: {}", node.name, error);
                                node.text.push_str(&String::from_utf8_lossy(&text));
                            }
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => bail!(
                    "Unexpected end of document within <{}>",
                    stack.first().map(|node| node.name()).unwrap_or_default()
                ),
                _ => (),
            }
            buffer.clear();
        }
    }

    /// Parses the first element (including all children) of the given input.
    pub fn parse<B: BufRead>(input: B) -> anyhow::Result<XmlNode> {
        let mut reader = crate::xml::reader(input);
        let mut buffer = Vec::new();
        let mut scratch = Vec::new();
        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Start(element) => {
                    return XmlNode::read_subtree(&mut reader, &element, &mut scratch)
                }
                Event::Eof => bail!("The document doesn't contain any element"),
                _ => (),
            }
            buffer.clear();
        }
    }

    /// Parses the given string.
    ///
    /// # Example
    /// ```
    /// # use xsave::xml::tree::XmlNode;
    /// let node = XmlNode::parse_str(r#"<log><entry title="A"/><entry title="B"/></log>"#).unwrap();
    /// assert_eq!(node.name(), "log");
    /// assert_eq!(node.children_named("entry").count(), 2);
    /// assert_eq!(node.children()[1].attr("title"), Some("B"));
    /// ```
    pub fn parse_str(data: &str) -> anyhow::Result<XmlNode> {
        XmlNode::parse(data.as_bytes())
    }

    /// Parses the given file.
    pub fn parse_file(file: &Path) -> anyhow::Result<XmlNode> {
        let input = File::open(file)
            .with_context(|| format!("Cannot open fragment {}", file.display()))?;
        XmlNode::parse(BufReader::new(input))
            .with_context(|| format!("Cannot parse fragment {}", file.display()))
    }

    /// Returns the element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of the given attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of the given attribute or an empty string if it is absent.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or_default()
    }

    /// Returns all attributes in document order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Returns all child elements.
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Returns the first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Iterates over all child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Returns the text contents of this element.
    pub fn text(&self) -> &str {
        &self.text
    }
}
