//! Owned, mutable XML document tree.
//!
//! Pipeline handlers receive documents they may rewrite in place, so the
//! crate needs a tree representation rather than a streaming view. Parsing
//! and serialization are built on quick-xml, which is safe against XXE by
//! default (it does not expand entities); DOCTYPE and entity declarations
//! are rejected outright on top of that.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

use crate::error::SoapError;

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with its (possibly prefixed) name, attributes and children.
///
/// Attribute order and child order are preserved across a parse/serialize
/// round trip. Namespace declarations are ordinary `xmlns`/`xmlns:p`
/// attributes; [`XmlDocument::find_element`] resolves them lexically.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `soap:Envelope`.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element holding a single text child.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(XmlNode::Text(text.into()));
        element
    }

    /// Local part of the element name (`Envelope` for `soap:Envelope`).
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Namespace prefix, if the name carries one.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Look up an attribute by its literal name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Namespace URI declared for `prefix` on this element itself.
    /// `None` prefix looks up the default `xmlns` declaration.
    pub fn declared_namespace(&self, prefix: Option<&str>) -> Option<&str> {
        match prefix {
            Some(prefix) => self.attr(&format!("xmlns:{prefix}")),
            None => self.attr("xmlns"),
        }
    }

    /// Append a child element.
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Iterate over child elements, skipping text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element with the given local name.
    pub fn find_child(&self, local_name: &str) -> Option<&XmlElement> {
        self.child_elements()
            .find(|element| element.local_name() == local_name)
    }

    /// Mutable variant of [`find_child`](Self::find_child).
    pub fn find_child_mut(&mut self, local_name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(element) if element.local_name() == local_name => Some(element),
            _ => None,
        })
    }

    /// Concatenated direct text and CDATA content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
                _ => {}
            }
        }
        out
    }
}

/// A parsed XML document owning its element tree.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// The single root element.
    pub root: XmlElement,
}

impl XmlDocument {
    /// Wrap a root element into a document.
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse XML text into a document tree.
    ///
    /// Rejects DOCTYPE and entity declarations before handing the text to
    /// quick-xml, and requires exactly one root element.
    pub fn parse(xml: &str) -> Result<Self, SoapError> {
        check_entity_patterns(xml)?;

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(element_from_start(e));
                }
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e);
                    attach(&mut stack, &mut root, XmlNode::Element(element))?;
                }
                Ok(Event::End(_)) => match stack.pop() {
                    Some(element) => {
                        attach(&mut stack, &mut root, XmlNode::Element(element))?;
                    }
                    None => {
                        return Err(SoapError::Xml("unexpected closing tag".to_string()));
                    }
                },
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Ok(Event::CData(ref e)) => {
                    let text = String::from_utf8_lossy(e).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Ok(Event::Comment(ref e)) => {
                    let text = String::from_utf8_lossy(e).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Ok(Event::DocType(_)) => {
                    return Err(SoapError::Xml(
                        "DOCTYPE declarations are not allowed".to_string(),
                    ));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SoapError::Xml(format!("XML parse error: {e}")));
                }
                _ => {}
            }

            buf.clear();
        }

        if !stack.is_empty() {
            return Err(SoapError::Xml("unexpected end of document".to_string()));
        }

        root.map(Self::new)
            .ok_or_else(|| SoapError::Xml("document has no root element".to_string()))
    }

    /// Serialize the tree back to XML text with a standard declaration.
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        // Writing into a Vec cannot fail.
        if write_document(&mut writer, &self.root).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    /// Find the first element matching `(namespace_uri, local_name)`,
    /// resolving prefix bindings lexically from the root down.
    pub fn find_element(&self, namespace_uri: &str, local_name: &str) -> Option<&XmlElement> {
        find_in(&self.root, namespace_uri, local_name, &HashMap::new())
    }
}

fn element_from_start(e: &BytesStart) -> XmlElement {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut element = XmlElement::new(name);
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        element.attributes.push((key, value));
    }
    element
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    node: XmlNode,
) -> Result<(), SoapError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    match node {
        XmlNode::Element(element) => {
            if root.is_some() {
                return Err(SoapError::Xml(
                    "document has more than one root element".to_string(),
                ));
            }
            *root = Some(element);
            Ok(())
        }
        // Stray text outside the root is ignored.
        _ => Ok(()),
    }
}

fn write_document(writer: &mut Writer<Vec<u8>>, root: &XmlElement) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(writer, root)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            XmlNode::CData(text) => {
                writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
            }
            XmlNode::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::new(text)))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

fn find_in<'a>(
    element: &'a XmlElement,
    namespace_uri: &str,
    local_name: &str,
    scope: &HashMap<String, String>,
) -> Option<&'a XmlElement> {
    let mut scope = scope.clone();
    for (key, value) in &element.attributes {
        if key == "xmlns" {
            scope.insert(String::new(), value.clone());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value.clone());
        }
    }

    let prefix = element.prefix().unwrap_or("");
    if element.local_name() == local_name
        && scope.get(prefix).map(String::as_str) == Some(namespace_uri)
    {
        return Some(element);
    }

    element
        .child_elements()
        .find_map(|child| find_in(child, namespace_uri, local_name, &scope))
}

/// Reject entity declaration patterns before parsing.
fn check_entity_patterns(xml: &str) -> Result<(), SoapError> {
    if xml.contains("<!DOCTYPE") || xml.contains("<!doctype") {
        return Err(SoapError::Xml(
            "DOCTYPE declarations are not allowed".to_string(),
        ));
    }
    if xml.contains("<!ENTITY") || xml.contains("<!entity") {
        return Err(SoapError::Xml(
            "entity declarations are not allowed".to_string(),
        ));
    }
    Ok(())
}
