//! `<use>` expansion
//!
//! Every `<use>` is replaced by a concrete copy of the element it references.
//! References found inside a copy are expanded one level deeper and placed
//! next to it, until `max_depth` is exceeded.

use crate::diagnostics::{Diagnostics, Warning};
use crate::document::{Document, Element};
use crate::transform::concat_transforms;
use std::collections::HashMap;
use tracing::debug;

/// Presentation attributes a `<use>` passes on to its copy when the copy
/// does not set them itself
pub const INHERITED_USE_ATTRIBUTES: &[&str] = &[
    "style",
    "class",
    "fill",
    "stroke",
    "stroke-width",
    "opacity",
    "mask",
];

/// Metadata attached to the root of every expanded copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseExpansion {
    /// Id of the referenced element
    pub target_id: String,
    /// 0 for a `<use>` in the source document, +1 per nesting level
    pub depth: usize,
    /// Full transform list written onto the copy
    pub transform: String,
}

type Registry<'a> = HashMap<&'a str, &'a Element>;

/// Expand all `<use>` references of `doc` into a new document.
///
/// The source document is left untouched. Unresolvable references are
/// dropped with a [`Warning`]; each branch that runs past `max_depth`
/// records one [`Warning::DepthLimit`].
pub fn expand_uses(doc: &Document, max_depth: usize, diagnostics: &mut Diagnostics) -> Document {
    let mut registry = Registry::new();
    for el in doc.root.descendants() {
        if let Some(id) = el.id() {
            // First definition wins, like getElementById
            registry.entry(id).or_insert(el);
        }
    }
    debug!(ids = registry.len(), "built element registry");

    let mut expander = Expander {
        registry,
        max_depth,
        diagnostics,
        expanded: 0,
    };
    let root = expander.rebuild(&doc.root);
    debug!(copies = expander.expanded, "expanded <use> references");
    Document { root }
}

struct Expander<'a, 'd> {
    registry: Registry<'a>,
    max_depth: usize,
    diagnostics: &'d mut Diagnostics,
    expanded: usize,
}

impl Expander<'_, '_> {
    /// Copy `el`, replacing every `<use>` child with its expansion
    fn rebuild(&mut self, el: &Element) -> Element {
        let mut out = Element {
            name: el.name.clone(),
            attributes: el.attributes.clone(),
            children: Vec::with_capacity(el.children.len()),
            expansion: el.expansion.clone(),
        };
        for child in &el.children {
            if child.is("use") {
                let copies = self.expand(child);
                out.children.extend(copies);
            } else {
                out.children.push(self.rebuild(child));
            }
        }
        out
    }

    /// Expand one `<use>` of the source document.
    ///
    /// Chains and nested references are driven from a work stack, so the
    /// depth bound never turns into call depth. Copies come out in document
    /// order.
    fn expand(&mut self, use_el: &Element) -> Vec<Element> {
        let mut results = Vec::new();
        let mut pending = vec![(use_el.clone(), 0, String::new())];
        while let Some((use_el, depth, parent_transform)) = pending.pop() {
            match self.step(&use_el, depth, &parent_transform) {
                Step::Dropped => {}
                Step::Chain(next, transform) => pending.push((next, depth + 1, transform)),
                Step::Copy(copy, nested) => {
                    results.push(copy);
                    pending.extend(
                        nested
                            .into_iter()
                            .rev()
                            .map(|(el, transform)| (el, depth + 1, transform)),
                    );
                }
            }
        }
        results
    }

    fn step(&mut self, use_el: &Element, depth: usize, parent_transform: &str) -> Step {
        let Some(href) = use_el.attr("href") else {
            self.diagnostics.push(Warning::MissingHref);
            return Step::Dropped;
        };
        let target_id = href.trim().trim_start_matches('#');
        if depth > self.max_depth {
            self.diagnostics.push(Warning::DepthLimit {
                target: target_id.to_string(),
                max_depth: self.max_depth,
            });
            return Step::Dropped;
        }
        let Some(&target) = self.registry.get(target_id) else {
            self.diagnostics.push(Warning::UnresolvedUse {
                target: target_id.to_string(),
            });
            return Step::Dropped;
        };

        let x = use_el.number_attr("x").unwrap_or(0.0);
        let y = use_el.number_attr("y").unwrap_or(0.0);
        let offset = if x != 0.0 || y != 0.0 {
            format!("translate({x}, {y})")
        } else {
            String::new()
        };
        let combined = concat_transforms([
            parent_transform,
            offset.as_str(),
            use_el.attr("transform").unwrap_or_default(),
        ]);

        let mut copy = target.clone();
        strip_ids(&mut copy);
        inherit_attributes(&mut copy, use_el);

        // A reference to another reference continues the chain one level down
        if copy.is("use") {
            return Step::Chain(copy, combined);
        }

        let transform = concat_transforms([
            combined.as_str(),
            copy.attr("transform").unwrap_or_default(),
        ]);
        if transform.is_empty() {
            copy.remove_attr("transform");
        } else {
            copy.set_attr("transform", &transform);
        }
        if target.is("symbol") {
            for dim in ["width", "height"] {
                if let Some(value) = use_el.attr(dim) {
                    copy.set_attr(dim, value);
                }
            }
        }
        copy.expansion = Some(UseExpansion {
            target_id: target_id.to_string(),
            depth,
            transform: transform.clone(),
        });

        let mut nested = Vec::new();
        take_nested_uses(&mut copy, &transform, &[], &mut nested);

        self.expanded += 1;
        debug!(target = target_id, depth, "expanded <use>");
        Step::Copy(copy, nested)
    }
}

/// Outcome of resolving a single `<use>`
enum Step {
    /// Warned and skipped
    Dropped,
    /// The target is itself a `<use>`; follow it with the composed transform
    Chain(Element, String),
    /// A concrete copy plus the references detached from inside it
    Copy(Element, Vec<(Element, String)>),
}

fn strip_ids(el: &mut Element) {
    el.remove_attr("id");
    for child in &mut el.children {
        strip_ids(child);
    }
}

/// Non-overriding merge of the inheritable attributes of `from` into `into`
fn inherit_attributes(into: &mut Element, from: &Element) {
    for &name in INHERITED_USE_ATTRIBUTES {
        if let Some(value) = from.attr(name) {
            if !value.is_empty() && into.attr(name).is_none_or(str::is_empty) {
                into.set_attr(name, value);
            }
        }
    }
}

/// Remove `<use>` elements below `el`, collecting each with the transform
/// accumulated on the way down to it.
///
/// The collected copies also inherit presentation attributes from the
/// ancestors they were detached from, nearest first.
fn take_nested_uses(
    el: &mut Element,
    transform: &str,
    ancestors: &[&Element],
    out: &mut Vec<(Element, String)>,
) {
    let children = std::mem::take(&mut el.children);
    let mut kept = Vec::with_capacity(children.len());
    let mut found = Vec::new();
    for child in children {
        if child.is("use") {
            found.push(child);
        } else {
            kept.push(child);
        }
    }
    el.children = kept;

    if !found.is_empty() {
        let snapshot = Element {
            name: el.name.clone(),
            attributes: el.attributes.clone(),
            ..Element::default()
        };
        for mut nested in found {
            inherit_attributes(&mut nested, &snapshot);
            for ancestor in ancestors.iter().rev() {
                inherit_attributes(&mut nested, ancestor);
            }
            out.push((nested, transform.to_string()));
        }
    }

    let snapshot = Element {
        name: el.name.clone(),
        attributes: el.attributes.clone(),
        ..Element::default()
    };
    let mut chain: Vec<&Element> = ancestors.to_vec();
    chain.push(&snapshot);
    for child in &mut el.children {
        let child_transform = concat_transforms([
            transform,
            child.attr("transform").unwrap_or_default(),
        ]);
        take_nested_uses(child, &child_transform, &chain, out);
    }
}
