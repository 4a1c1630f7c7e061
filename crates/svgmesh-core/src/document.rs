//! Owned SVG element tree
//!
//! The markup is parsed once with `roxmltree` and copied into plain owned
//! [`Element`]s. Every later stage works on this tree; expansion builds new
//! trees rather than editing one in place.

use crate::preprocess::UseExpansion;
use crate::{Error, Result};
use std::fmt::{self, Write};

/// Elements whose subtrees are definitions and never render directly
pub const NON_RENDERING: &[&str] = &[
    "defs",
    "symbol",
    "mask",
    "clipPath",
    "linearGradient",
    "radialGradient",
    "pattern",
    "marker",
    "filter",
    "style",
    "title",
    "desc",
    "metadata",
];

/// A single markup element with its attributes and element children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Local tag name (`path`, `linearGradient`, ...)
    pub name: String,
    /// Attributes in document order, keyed by local name
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Set on the root of every concrete copy produced by `<use>` expansion
    pub expansion: Option<UseExpansion>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter, mostly for tests
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute parsed as a plain number, ignoring unit suffixes
    pub fn number_attr(&self, name: &str) -> Option<f32> {
        self.attr(name).and_then(crate::style::parse_number)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value.to_string();
        } else {
            self.attributes.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Depth-first iterator over this element and all descendants
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Element children with the given tag
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();
        let children = node
            .children()
            .filter(|child| child.is_element())
            .map(Self::from_node)
            .collect();
        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            children,
            expansion: None,
        }
    }

    fn write_markup(&self, out: &mut String, indent: usize) -> fmt::Result {
        write!(out, "{:indent$}<{}", "", self.name, indent = indent)?;
        for (key, value) in &self.attributes {
            write!(out, " {}=\"{}\"", key, escape(value))?;
        }
        if let Some(exp) = &self.expansion {
            write!(
                out,
                " data-use-instance=\"true\" data-use-depth=\"{}\" data-use-target=\"{}\"",
                exp.depth,
                escape(&exp.target_id)
            )?;
        }
        if self.children.is_empty() {
            return writeln!(out, "/>");
        }
        writeln!(out, ">")?;
        for child in &self.children {
            child.write_markup(out, indent + 2)?;
        }
        writeln!(out, "{:indent$}</{}>", "", self.name, indent = indent)
    }
}

/// Iterator returned by [`Element::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// A parsed SVG document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Parse SVG markup. Anything that is not well-formed XML with an `<svg>`
    /// root is a fatal [`Error::Parse`].
    pub fn parse(text: &str) -> Result<Self> {
        let xml = roxmltree::Document::parse(text)?;
        let root = xml.root_element();
        if root.tag_name().name() != "svg" {
            return Err(Error::Parse(format!(
                "expected <svg> root element, found <{}>",
                root.tag_name().name()
            )));
        }
        Ok(Self {
            root: Element::from_node(root),
        })
    }

    /// First element carrying `id`, in document order
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.root.descendants().find(|el| el.id() == Some(id))
    }

    /// All elements with the given tag, in document order
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.root.descendants().filter(move |el| el.name == name)
    }

    /// Serialize back to markup. Use-instance metadata is written as
    /// `data-use-*` attributes.
    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.root.write_markup(&mut out, 0);
        out
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_svg_string())
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
