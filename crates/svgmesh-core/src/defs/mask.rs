//! `<mask>` definitions

use crate::diagnostics::{Diagnostics, Warning};
use crate::document::{Document, Element};
use crate::style::{parse_fraction, parse_number, parse_number_list, property};
use crate::transform::parse_transform;
use glam::Vec2;
use kurbo::Affine;
use std::collections::BTreeMap;
use tracing::debug;

/// Children of a mask that carry no geometry and are ignored silently
const IGNORED_MASK_CHILDREN: &[&str] = &["title", "desc", "metadata"];

/// Coordinate system of mask content or of the mask region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskUnits {
    /// Fractions of the masked geometry's bounding box
    ObjectBoundingBox,
    /// The user coordinate system the masked geometry is drawn in
    #[default]
    UserSpaceOnUse,
}

impl MaskUnits {
    pub fn parse(value: Option<&str>, default: Self) -> Self {
        match value.map(str::trim) {
            Some("objectBoundingBox") => Self::ObjectBoundingBox,
            Some("userSpaceOnUse") => Self::UserSpaceOnUse,
            _ => default,
        }
    }
}

/// Axis-aligned rectangle `x, y, width, height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub origin: Vec2,
    pub size: Vec2,
}

/// Geometry of a single mask shape
#[derive(Debug, Clone, PartialEq)]
pub enum MaskGeometry {
    Rect { origin: Vec2, size: Vec2 },
    Circle { center: Vec2, radius: f32 },
    Ellipse { center: Vec2, radii: Vec2 },
    Polygon { points: Vec<Vec2> },
    /// Raw path data
    Path { d: String },
    Group { children: Vec<MaskShape> },
}

/// A drawable mask child with its resolved opacity
#[derive(Debug, Clone, PartialEq)]
pub struct MaskShape {
    pub geometry: MaskGeometry,
    /// `opacity × fill-opacity`, clamped to `[0, 1]`
    pub opacity: f32,
    /// The shape's own `transform`
    pub transform: Affine,
}

impl MaskShape {
    pub fn kind(&self) -> &'static str {
        match self.geometry {
            MaskGeometry::Rect { .. } => "rect",
            MaskGeometry::Circle { .. } => "circle",
            MaskGeometry::Ellipse { .. } => "ellipse",
            MaskGeometry::Polygon { .. } => "polygon",
            MaskGeometry::Path { .. } => "path",
            MaskGeometry::Group { .. } => "g",
        }
    }
}

/// A parsed `<mask>`
#[derive(Debug, Clone, PartialEq)]
pub struct MaskDefinition {
    pub id: String,
    /// Units of the mask content; decides how shapes are scaled into the texture
    pub content_units: MaskUnits,
    /// Units of [`MaskDefinition::region`]
    pub region_units: MaskUnits,
    /// Area outside of which everything is masked; `None` never clips
    pub region: Option<Region>,
    pub shapes: Vec<MaskShape>,
}

/// Parse every `<mask>` in the document, keyed by id
pub fn parse_masks(doc: &Document, diagnostics: &mut Diagnostics) -> BTreeMap<String, MaskDefinition> {
    let mut masks = BTreeMap::new();
    for el in doc.elements_named("mask") {
        let Some(id) = el.id() else {
            continue;
        };
        if masks.contains_key(id) {
            continue;
        }
        let region_units = MaskUnits::parse(el.attr("maskUnits"), MaskUnits::ObjectBoundingBox);
        let content_units =
            MaskUnits::parse(el.attr("maskContentUnits"), MaskUnits::UserSpaceOnUse);
        let region = parse_region(el, region_units);
        let shapes = parse_shapes(id, &el.children, diagnostics);
        debug!(id, shapes = shapes.len(), ?content_units, "parsed mask");
        masks.insert(
            id.to_string(),
            MaskDefinition {
                id: id.to_string(),
                content_units,
                region_units,
                region,
                shapes,
            },
        );
    }
    masks
}

/// Bounding-box regions default to the whole box. A user-space region needs
/// an explicit size, otherwise the mask is left unclipped.
fn parse_region(el: &Element, units: MaskUnits) -> Option<Region> {
    let length = |name: &str| el.attr(name).and_then(parse_fraction);
    let size = match (units, length("width"), length("height")) {
        (_, Some(w), Some(h)) => Vec2::new(w, h),
        (MaskUnits::ObjectBoundingBox, w, h) => Vec2::new(w.unwrap_or(1.0), h.unwrap_or(1.0)),
        (MaskUnits::UserSpaceOnUse, ..) => return None,
    };
    Some(Region {
        origin: Vec2::new(length("x").unwrap_or(0.0), length("y").unwrap_or(0.0)),
        size,
    })
}

fn parse_shapes(mask_id: &str, children: &[Element], diagnostics: &mut Diagnostics) -> Vec<MaskShape> {
    children
        .iter()
        .filter_map(|child| parse_shape(mask_id, child, diagnostics))
        .collect()
}

fn parse_shape(mask_id: &str, el: &Element, diagnostics: &mut Diagnostics) -> Option<MaskShape> {
    let num = |name: &str| el.number_attr(name).unwrap_or(0.0);
    let geometry = match el.name.as_str() {
        "rect" => MaskGeometry::Rect {
            origin: Vec2::new(num("x"), num("y")),
            size: Vec2::new(num("width"), num("height")),
        },
        "circle" => MaskGeometry::Circle {
            center: Vec2::new(num("cx"), num("cy")),
            radius: num("r"),
        },
        "ellipse" => MaskGeometry::Ellipse {
            center: Vec2::new(num("cx"), num("cy")),
            radii: Vec2::new(num("rx"), num("ry")),
        },
        "polygon" => MaskGeometry::Polygon {
            points: parse_number_list(el.attr("points").unwrap_or_default())
                .chunks_exact(2)
                .map(|p| Vec2::new(p[0], p[1]))
                .collect(),
        },
        "path" => MaskGeometry::Path {
            d: el.attr("d").unwrap_or_default().to_string(),
        },
        "g" => MaskGeometry::Group {
            children: parse_shapes(mask_id, &el.children, diagnostics),
        },
        name if IGNORED_MASK_CHILDREN.contains(&name) => return None,
        name => {
            diagnostics.push(Warning::UnsupportedMaskShape {
                mask: mask_id.to_string(),
                kind: name.to_string(),
            });
            return None;
        }
    };
    if property(el, "fill") == Some("none") && !matches!(geometry, MaskGeometry::Group { .. }) {
        return None;
    }
    let fraction = |name: &str| property(el, name).and_then(parse_number).unwrap_or(1.0);
    Some(MaskShape {
        geometry,
        opacity: (fraction("opacity") * fraction("fill-opacity")).clamp(0.0, 1.0),
        transform: el.attr("transform").map_or(Affine::IDENTITY, parse_transform),
    })
}
