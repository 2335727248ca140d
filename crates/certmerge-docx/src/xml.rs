//! Owned XML tree for OOXML part rewriting.
//!
//! quick-xml is event-based; placeholder substitution needs to mutate
//! paragraphs in place and serialize the whole part back. This module
//! builds a small owned tree from the event stream and writes it out
//! again. Attribute values are kept in their raw (still-escaped) form so
//! untouched markup round-trips byte-for-byte; text nodes are unescaped on
//! read and re-escaped on write.
//!
//! Namespaces are not resolved: element names are matched as literal
//! prefixed strings (`w:p`, `w:r`), which is how Word writes its parts.

use certmerge_core::{CertMergeError, Result};
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One node of a parsed part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// An element with its attributes and children.
    Element(XmlElement),
    /// Character data, unescaped.
    Text(String),
    /// Comments, processing instructions, CDATA, DOCTYPE -- kept verbatim
    /// in serialized form and written back untouched.
    Raw(String),
}

/// An element with verbatim attributes and owned children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, prefix included (e.g. `w:p`).
    pub name: String,
    /// (key, raw escaped value) pairs in document order.
    attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
    /// Whether the source used the `<a/>` form. Only honored while the
    /// element stays childless.
    self_closing: bool,
}

impl XmlElement {
    /// New childless element (serialized self-closing while empty).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Whether this element has the given qualified name.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Attribute value by key, unescaped.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<String> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, raw)| {
            unescape(raw).map_or_else(|_| raw.clone(), |cow| cow.into_owned())
        })
    }

    /// Set (or append) an attribute; the value is escaped on write.
    pub fn set_attr(&mut self, key: impl Into<String>, value: &str) {
        let key = key.into();
        let raw = escape(value).into_owned();
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = raw;
        } else {
            self.attrs.push((key, raw));
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr).
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder: append a child node.
    #[must_use]
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Direct element children.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child element with the given name.
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.is(name))
    }

    /// Concatenated text of direct [`XmlNode::Text`] children.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, raw) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(raw);
            out.push('"');
        }
        if self.children.is_empty() && self.self_closing {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl XmlNode {
    /// The element inside this node, if it is one.
    #[must_use]
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            Self::Element(el) => Some(el),
            _ => None,
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            Self::Element(el) => el.write(out),
            Self::Text(t) => out.push_str(&escape(t)),
            Self::Raw(raw) => out.push_str(raw),
        }
    }
}

/// A fully parsed XML part: declaration plus top-level nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlPart {
    decl: Option<String>,
    /// Top-level nodes; for OOXML parts this is the single root element,
    /// possibly surrounded by comments.
    pub nodes: Vec<XmlNode>,
}

impl XmlPart {
    /// Parse a part from its XML source.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut buf = Vec::new();
        let mut decl = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut top: Vec<XmlNode> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    stack.push(element_from_start(&e, false)?);
                }
                Ok(Event::Empty(e)) => {
                    let el = element_from_start(&e, true)?;
                    attach(&mut stack, &mut top, XmlNode::Element(el));
                }
                Ok(Event::End(_)) => {
                    let el = stack.pop().ok_or_else(|| {
                        CertMergeError::Package("unbalanced closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut top, XmlNode::Element(el));
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| CertMergeError::Package(format!("bad character data: {e}")))?
                        .into_owned();
                    attach(&mut stack, &mut top, XmlNode::Text(text));
                }
                Ok(Event::CData(t)) => {
                    let raw = format!("<![CDATA[{}]]>", String::from_utf8_lossy(&t.into_inner()));
                    attach(&mut stack, &mut top, XmlNode::Raw(raw));
                }
                Ok(Event::Comment(t)) => {
                    let raw = format!("<!--{}-->", String::from_utf8_lossy(t.as_ref()));
                    attach(&mut stack, &mut top, XmlNode::Raw(raw));
                }
                Ok(Event::PI(t)) => {
                    let raw = format!("<?{}?>", String::from_utf8_lossy(t.as_ref()));
                    attach(&mut stack, &mut top, XmlNode::Raw(raw));
                }
                Ok(Event::DocType(t)) => {
                    let raw = format!("<!DOCTYPE {}>", String::from_utf8_lossy(t.as_ref()));
                    attach(&mut stack, &mut top, XmlNode::Raw(raw));
                }
                Ok(Event::Decl(d)) => {
                    decl = Some(declaration_text(&d));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CertMergeError::Package(format!("XML parse error: {e}")));
                }
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(CertMergeError::Package(
                "unexpected end of part, element left open".to_string(),
            ));
        }

        Ok(Self { decl, nodes: top })
    }

    /// Serialize back to XML source.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(decl) = &self.decl {
            out.push_str(decl);
        }
        for node in &self.nodes {
            node.write(&mut out);
        }
        out
    }

    /// Node at a child-index path; the first index addresses the top-level
    /// node list, every following index a child of the previous element.
    #[must_use]
    pub fn node(&self, path: &[usize]) -> Option<&XmlNode> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.nodes.get(first)?;
        for &idx in rest {
            node = node.as_element()?.children.get(idx)?;
        }
        Some(node)
    }

    /// Mutable element at a child-index path.
    pub fn element_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.nodes.get_mut(first)?;
        for &idx in rest {
            match node {
                XmlNode::Element(el) => node = el.children.get_mut(idx)?,
                _ => return None,
            }
        }
        match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

fn attach(stack: &mut [XmlElement], top: &mut Vec<XmlNode>, node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else {
        top.push(node);
    }
}

fn element_from_start(
    e: &quick_xml::events::BytesStart<'_>,
    self_closing: bool,
) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr =
            attr.map_err(|e| CertMergeError::Package(format!("invalid attribute: {e}")))?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
        self_closing,
    })
}

fn declaration_text(d: &quick_xml::events::BytesDecl<'_>) -> String {
    let mut out = String::from("<?xml");
    if let Ok(version) = d.version() {
        out.push_str(&format!(" version=\"{}\"", String::from_utf8_lossy(&version)));
    }
    if let Some(Ok(encoding)) = d.encoding() {
        out.push_str(&format!(" encoding=\"{}\"", String::from_utf8_lossy(&encoding)));
    }
    if let Some(Ok(standalone)) = d.standalone() {
        out.push_str(&format!(
            " standalone=\"{}\"",
            String::from_utf8_lossy(&standalone)
        ));
    }
    out.push_str("?>");
    out
}
