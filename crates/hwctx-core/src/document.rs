//! In-memory XML document tree
//!
//! A small DOM built on top of the `quick-xml` pull parser. The builders in
//! [`crate::builder`] walk this tree; they never see the tokenizer directly.
//! The tree keeps properties in document order (including repeated names)
//! and keeps whitespace text between elements, so callers decide what to
//! skip.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML syntax error at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("Invalid text encoding: {0}")]
    Encoding(String),
    #[error("Document has no root element")]
    NoRootElement,
    #[error("Document has more than one root element (second is <{0}>)")]
    MultipleRoots(String),
    #[error("Element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("End tag </{0}> has no matching start tag")]
    UnmatchedEndTag(String),
    #[error("Unexpected content outside the root element: {0:?}")]
    TrailingContent(String),
}

/// Parser behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Require every end tag to name the element it closes
    pub check_end_names: bool,
}

impl ParseOptions {
    /// Full well-formedness checking. Used by the context entry points.
    pub fn strict() -> Self {
        Self {
            check_end_names: true,
        }
    }

    /// Accept mismatched end tag names; nesting is still tracked by depth.
    pub fn lenient() -> Self {
        Self {
            check_end_names: false,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::strict()
    }
}

/// A child of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, including whitespace between tags and CDATA sections
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An XML element with its properties and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    properties: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Tag name, exactly as written (no namespace processing)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties in document order. Repeated names are all yielded.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of a property; the last occurrence wins when a name repeats
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements only, in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text of the direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A fully parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse a document held in memory
    pub fn parse(data: &[u8], options: ParseOptions) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(data);
        reader.config_mut().check_end_names = options.check_end_names;

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event_into(&mut buf).map_err(|e| DocumentError::Xml {
                position: position as u64,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(ref e) => {
                    let element = start_element(&reader, e)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(DocumentError::MultipleRoots(element.name));
                    }
                    stack.push(element);
                }
                Event::Empty(ref e) => {
                    let element = start_element(&reader, e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(ref e) => {
                    let element = match stack.pop() {
                        Some(element) => element,
                        None => {
                            let name = decode(&reader, e.name().as_ref())?;
                            return Err(DocumentError::UnmatchedEndTag(name));
                        }
                    };
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| DocumentError::Encoding(e.to_string()))?
                        .into_owned();
                    push_text(&mut stack, text)?;
                }
                Event::CData(ref c) => {
                    let text = decode(&reader, c)?;
                    push_text(&mut stack, text)?;
                }
                Event::Comment(ref c) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = decode(&reader, c)?;
                        parent.children.push(Node::Comment(text));
                    }
                }
                Event::Eof => break,
                // Declaration, doctype and processing instructions carry nothing
                // the tree needs.
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::UnclosedElement(open.name));
        }

        root.map(|root| Self { root })
            .ok_or(DocumentError::NoRootElement)
    }

    /// Parse a UTF-8 string
    pub fn parse_str(xml: &str, options: ParseOptions) -> Result<Self, DocumentError> {
        Self::parse(xml.as_bytes(), options)
    }

    /// Read and parse a file
    pub fn from_file(path: &Path, options: ParseOptions) -> Result<Self, DocumentError> {
        let content = std::fs::read(path)?;
        Self::parse(&content, options)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }
}

fn decode(reader: &Reader<&[u8]>, bytes: &[u8]) -> Result<String, DocumentError> {
    reader
        .decoder()
        .decode(bytes)
        .map(|s| s.into_owned())
        .map_err(|e| DocumentError::Encoding(e.to_string()))
}

fn start_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(decode(reader, start.name().as_ref())?);

    // Repeated property names are kept; the builders resolve them last-wins.
    let mut attributes = start.attributes();
    attributes.with_checks(false);
    for attr in attributes {
        let attr = attr.map_err(|e| DocumentError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        let key = decode(reader, attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::Encoding(e.to_string()))?
            .into_owned();
        element.properties.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_some() => return Err(DocumentError::MultipleRoots(element.name)),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Text(text)),
        None if text.trim().is_empty() => {}
        None => return Err(DocumentError::TrailingContent(text)),
    }
    Ok(())
}
