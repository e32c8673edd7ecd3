//! A small in-memory XML element tree.
//!
//! The signing and canonicalization code needs full control over attribute
//! order, namespace declarations and comment nodes, which rules out serde
//! deserialization. This tree is built from quick-xml events and keeps
//! attributes exactly as they appeared in the document.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors raised while parsing or inspecting XML documents.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("XML document contains invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("XML document has no root element")]
    NoRootElement,
    #[error("expected element '{0}' not found")]
    MissingElement(&'static str),
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::Malformed(err.to_string())
    }
}

/// A single attribute, unescaped, with its name exactly as written
/// (including any `xmlns` / `xmlns:prefix` declarations).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An XML element with ordered attributes and child nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Tag name as written, possibly prefixed (`tns:Racun`).
    pub tag: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The tag name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.tag.split_once(':') {
            Some((_, local)) => local,
            None => &self.tag,
        }
    }

    /// The namespace prefix of the tag, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.tag.split_once(':').map(|(p, _)| p)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute, replacing an existing one with the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attr { name, value }),
        }
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Direct child elements, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child element with the given local name.
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.local_name() == local_name)
    }

    /// Depth-first search for a descendant (or self) by local name.
    pub fn find(&self, local_name: &str) -> Option<&Element> {
        if self.local_name() == local_name {
            return Some(self);
        }
        self.child_elements().find_map(|el| el.find(local_name))
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Removes direct child elements with the given local name, returning
    /// how many were removed.
    pub fn remove_children(&mut self, local_name: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|n| match n {
            Node::Element(el) => el.local_name() != local_name,
            _ => true,
        });
        before - self.children.len()
    }

    /// Serializes the element with canonical-form escaping: explicit end
    /// tags, text escaping of `&`, `<`, `>` and CR, attribute escaping of
    /// `&`, `<`, `"`, TAB, LF and CR.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        self.write(&mut out);
        out.into_bytes()
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for attr in &self.attrs {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            escape_attr(&attr.value, out);
            out.push('"');
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(el) => el.write(out),
                Node::Text(t) => escape_text(t, out),
                Node::Comment(c) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let tag = String::from_utf8(start.name().as_ref().to_vec())?;
    let mut element = Element::new(tag);
    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let name = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .into_owned();
        element.attrs.push(Attr { name, value });
    }
    Ok(element)
}

/// Parses a complete XML document into its root [`Element`]. Comments are
/// preserved; the XML declaration, processing instructions and DOCTYPE are
/// dropped.
pub fn parse(input: &[u8]) -> Result<Element, XmlError> {
    let mut reader = Reader::from_reader(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref start) => {
                stack.push(element_from_start(start)?);
            }
            Event::Empty(ref start) => {
                let element = element_from_start(start)?;
                match stack.last_mut() {
                    Some(parent) => parent.push_element(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(XmlError::Malformed(
                            "multiple root elements".to_string(),
                        ))
                    }
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    XmlError::Malformed("unexpected end tag".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.push_element(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(XmlError::Malformed(
                            "multiple root elements".to_string(),
                        ))
                    }
                }
            }
            Event::Text(ref text) => {
                if let Some(parent) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    parent.push_text(unescaped.into_owned());
                }
            }
            Event::CData(ref data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8(data.clone().into_inner().into_owned())?;
                    parent.push_text(text);
                }
            }
            Event::Comment(ref comment) => {
                let text = String::from_utf8(comment.clone().into_inner().into_owned())?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Comment(text));
                }
                // Comments outside the root element are dropped.
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unclosed element".to_string()));
    }
    root.ok_or(XmlError::NoRootElement)
}
