// src/extractors/facts.rs
//! Fact enumeration over the two document shapes: inline pages and generic
//! instance documents. Both produce the same `Fact` triples lazily.

use crate::document::tree::Descendants;
use crate::document::{Attributes, Element, INLINE_NAMESPACES, XBRLI_NAMESPACES};

/// A raw observation: tag identity, trimmed text, and the element's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact<'a> {
    pub name: String,
    pub text: String,
    pub attributes: &'a Attributes,
}

impl<'a> Fact<'a> {
    pub fn context_ref(&self) -> Option<&'a str> {
        self.attributes.get("contextRef")
    }

    pub fn unit_ref(&self) -> Option<&'a str> {
        self.attributes.get("unitRef")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    Inline,
    Instance,
}

impl DocumentShape {
    pub fn of(root: &Element) -> Self {
        if root.local_is("html") || root.local_is("xhtml") {
            DocumentShape::Inline
        } else {
            DocumentShape::Instance
        }
    }
}

/// Lazy fact sequence for one document, dispatched on its shape.
pub enum Facts<'a> {
    Inline(InlineFacts<'a>),
    Instance(InstanceFacts<'a>),
}

pub fn enumerate(root: &Element) -> Facts<'_> {
    match DocumentShape::of(root) {
        DocumentShape::Inline => Facts::Inline(InlineFacts::new(root)),
        DocumentShape::Instance => Facts::Instance(InstanceFacts {
            nodes: root.descendants(),
        }),
    }
}

impl<'a> Iterator for Facts<'a> {
    type Item = Fact<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Facts::Inline(facts) => facts.next(),
            Facts::Instance(facts) => facts.next(),
        }
    }
}

/// Every `ix:nonFraction`, then every `ix:nonNumeric`, each in document order.
/// Selection keeps the first-seen value on ties, so numeric facts come first.
pub struct InlineFacts<'a> {
    root: &'a Element,
    nodes: Descendants<'a>,
    pass: InlinePass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlinePass {
    NonFraction,
    NonNumeric,
}

impl InlinePass {
    fn local_name(self) -> &'static str {
        match self {
            InlinePass::NonFraction => "nonFraction",
            InlinePass::NonNumeric => "nonNumeric",
        }
    }
}

impl<'a> InlineFacts<'a> {
    fn new(root: &'a Element) -> Self {
        Self {
            root,
            nodes: root.descendants(),
            pass: InlinePass::NonFraction,
        }
    }
}

impl<'a> Iterator for InlineFacts<'a> {
    type Item = Fact<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let local = self.pass.local_name();
            if let Some(el) = self
                .nodes
                .find(|el| el.local_is(local) && el.in_namespace(INLINE_NAMESPACES, "ix"))
            {
                return Some(Fact {
                    name: el.attributes.get("name").unwrap_or_default().to_string(),
                    text: el.text_content().trim().to_string(),
                    attributes: &el.attributes,
                });
            }
            match self.pass {
                InlinePass::NonFraction => {
                    self.pass = InlinePass::NonNumeric;
                    self.nodes = self.root.descendants();
                }
                InlinePass::NonNumeric => return None,
            }
        }
    }
}

/// Every non-structural element with direct text.
pub struct InstanceFacts<'a> {
    nodes: Descendants<'a>,
}

impl<'a> Iterator for InstanceFacts<'a> {
    type Item = Fact<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for el in self.nodes.by_ref() {
            if el.in_namespace(XBRLI_NAMESPACES, "xbrli") || el.local_is("schemaRef") {
                continue;
            }
            let text = el.text();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            return Some(Fact {
                name: instance_name(el),
                text: text.to_string(),
                attributes: &el.attributes,
            });
        }
        None
    }
}

// `{namespace tail}:{local}`, e.g. ".../jppfs/2023-12-01/jppfs_cor" -> "jppfs_cor:NetSales"
fn instance_name(el: &Element) -> String {
    let local = &el.name.local;
    match (&el.name.namespace, &el.name.prefix) {
        (Some(ns), _) => {
            let tail = ns.trim_end_matches('/').rsplit('/').next().unwrap_or(ns);
            format!("{}:{}", tail, local)
        }
        (None, Some(prefix)) => format!("{}:{}", prefix, local),
        (None, None) => local.clone(),
    }
}
