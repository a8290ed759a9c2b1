// src/document/tree.rs
//! Owned element tree shared by the strict (XML) and lenient (HTML5) parsers.
//!
//! Both parsers borrow from their input, so the loader converts whatever it
//! managed to parse into this small owned form. Names keep the prefix and the
//! resolved namespace separately; the lenient parser lowercases element and
//! attribute names, so every name comparison here is ASCII-case-insensitive.

use scraper::node::Node as HtmlNode;
use scraper::{ElementRef, Html};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    /// `prefix:local`, or the bare local name.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

/// Attribute list in document order, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn local_is(&self, local: &str) -> bool {
        self.name.local.eq_ignore_ascii_case(local)
    }

    /// True when the element lives in `namespace`. Elements whose prefix was never
    /// declared fall back to matching on the conventional prefix.
    pub fn in_namespace(&self, namespaces: &[&str], conventional_prefix: &str) -> bool {
        match &self.name.namespace {
            Some(ns) => namespaces.iter().any(|candidate| candidate == ns),
            None => self
                .name
                .prefix
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(conventional_prefix)),
        }
    }

    pub fn is(&self, namespaces: &[&str], conventional_prefix: &str, local: &str) -> bool {
        self.local_is(local) && self.in_namespace(namespaces, conventional_prefix)
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Pre-order walk over this element and everything below it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// First element below this one satisfying `predicate`.
    pub fn find<P>(&self, predicate: P) -> Option<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        self.descendants().skip(1).find(|&el| predicate(el))
    }

    /// Text that precedes the first child element.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => text.push_str(t),
                Node::Element(_) => break,
            }
        }
        text
    }

    /// All descendant text, concatenated in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Serializes the sub-tree back to markup. Used for marker scans, not round-tripping.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_markup(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(el, out),
        }
    }
}

fn write_markup(element: &Element, out: &mut String) {
    let name = element.name.qualified();
    out.push('<');
    out.push_str(&name);
    for (key, value) in element.attributes.iter() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value).replace('"', "&quot;"));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(&escape(t)),
            Node::Element(el) => write_markup(el, out),
        }
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        for child in current.children.iter().rev() {
            if let Node::Element(el) = child {
                self.stack.push(el);
            }
        }
        Some(current)
    }
}

// --- Strict XML ---

pub fn parse_strict(text: &str) -> Result<Element, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(text, options)?;
    Ok(convert_xml(document.root_element()))
}

fn convert_xml(node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let namespace = tag.namespace().map(str::to_string);
    let prefix = tag
        .namespace()
        .and_then(|ns| node.lookup_prefix(ns))
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let attributes = node
        .attributes()
        .map(|attr| (attr.name().to_string(), attr.value().to_string()))
        .collect();

    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(Node::Element(convert_xml(child)))
            } else if child.is_text() {
                child.text().map(|t| Node::Text(t.to_string()))
            } else {
                None
            }
        })
        .collect();

    Element {
        name: QName {
            namespace,
            prefix,
            local: tag.name().to_string(),
        },
        attributes: Attributes::new(attributes),
        children,
    }
}

// --- Lenient HTML5 ---

/// Never fails: html5ever recovers from anything.
pub fn parse_lenient(text: &str) -> Element {
    let html = Html::parse_document(text);
    let mut scopes: Vec<(String, String)> = Vec::new();
    convert_html(html.root_element(), &mut scopes)
}

fn convert_html(element: ElementRef<'_>, scopes: &mut Vec<(String, String)>) -> Element {
    let value = element.value();
    let mark = scopes.len();

    // Namespace declarations survive as plain `xmlns:p` attributes
    for (name, uri) in value.attrs() {
        if let Some(prefix) = name.strip_prefix("xmlns:") {
            scopes.push((prefix.to_string(), uri.to_string()));
        }
    }

    let raw_name = value.name();
    let (prefix, local) = match raw_name.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, raw_name.to_string()),
    };
    let namespace = prefix.as_deref().and_then(|p| {
        scopes
            .iter()
            .rev()
            .find(|(declared, _)| declared.eq_ignore_ascii_case(p))
            .map(|(_, uri)| uri.clone())
    });

    let attributes = value
        .attrs()
        .filter(|(name, _)| *name != "xmlns" && !name.starts_with("xmlns:"))
        .map(|(name, v)| (name.to_string(), v.to_string()))
        .collect();

    let mut children = Vec::new();
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            children.push(Node::Element(convert_html(child_el, scopes)));
        } else if let HtmlNode::Text(text_node) = child.value() {
            children.push(Node::Text(text_node.text.to_string()));
        }
    }

    scopes.truncate(mark);

    Element {
        name: QName {
            namespace,
            prefix,
            local,
        },
        attributes: Attributes::new(attributes),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse_keeps_namespaces() {
        let xml = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:a="urn:a"><a:Item contextRef="C1">10</a:Item></xbrli:xbrl>"#;
        let root = parse_strict(xml).expect("well-formed");

        assert!(root.local_is("xbrl"));
        assert_eq!(root.name.prefix.as_deref(), Some("xbrli"));
        let item = root.elements().next().expect("child");
        assert_eq!(item.name.namespace.as_deref(), Some("urn:a"));
        assert_eq!(item.attributes.get("contextref"), Some("C1"));
        assert_eq!(item.text(), "10");
    }

    #[test]
    fn test_strict_parse_rejects_broken_markup() {
        assert!(parse_strict("<a><b></a>").is_err());
    }

    #[test]
    fn test_lenient_parse_resolves_declared_prefixes() {
        let html = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"><body><p><ix:nonFraction name="x:Y" contextRef="C1">1<b>2</b></ix:nonFraction></body></html>"#;
        let root = parse_lenient(html);

        let fact = root
            .descendants()
            .find(|el| el.local_is("nonFraction"))
            .expect("inline fact survives lenient parse");
        assert_eq!(fact.name.prefix.as_deref(), Some("ix"));
        assert_eq!(
            fact.name.namespace.as_deref(),
            Some("http://www.xbrl.org/2013/inlineXBRL")
        );
        assert_eq!(fact.attributes.get("contextRef"), Some("C1"));
        assert_eq!(fact.text_content(), "12");
        assert_eq!(fact.text(), "1");
    }

    #[test]
    fn test_markup_serialization_includes_nested_text() {
        let xml = r#"<seg><m dimension="d">jppfs_cor:NonConsolidatedMember</m></seg>"#;
        let root = parse_strict(xml).expect("well-formed");
        let markup = root.to_markup();
        assert!(markup.contains("NonConsolidatedMember"));
        assert!(markup.starts_with("<seg>"));
    }
}
