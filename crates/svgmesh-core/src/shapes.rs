//! Drawable shape extraction
//!
//! Walks the expanded document and turns every filled shape element into a
//! path plus the paint, mask and `<use>` metadata the later stages need.

use crate::config::ConvertConfig;
use crate::defs::{GradientDefinition, MaskDefinition};
use crate::diagnostics::{Diagnostics, Warning};
use crate::document::{Document, Element, NON_RENDERING};
use crate::style::{Paint, parse_number, parse_number_list, parse_url_ref, property};
use crate::transform::{RecoveredTransform, parse_transform};
use crate::{Error, Result};
use kurbo::{Affine, BezPath, Circle, Ellipse, Point, Rect, RoundedRect, Shape};
use std::collections::BTreeMap;
use tracing::debug;

/// What a shape is filled with
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// RGBA in `[0, 1]`
    Color([f32; 4]),
    /// A parsed linear gradient, faded by the inherited opacity
    Gradient { id: String, alpha: f32 },
}

/// Provenance of a shape that came out of `<use>` expansion
#[derive(Debug, Clone, PartialEq)]
pub struct UseInstance {
    pub depth: usize,
    pub target_id: String,
    /// Transform lifted off the geometry onto the mesh, if any
    pub transform: Option<RecoveredTransform>,
}

/// A filled shape ready for extrusion
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSource {
    /// Tag of the element the shape came from
    pub tag: String,
    /// Outline in the space the mesh is built in
    pub path: BezPath,
    pub fill: Fill,
    /// Resolved mask id
    pub mask_id: Option<String>,
    pub use_instance: Option<UseInstance>,
}

impl ShapeSource {
    pub fn gradient_id(&self) -> Option<&str> {
        match &self.fill {
            Fill::Gradient { id, .. } => Some(id),
            Fill::Color(_) => None,
        }
    }

    /// Transform to apply on the mesh rather than the geometry
    pub fn local_transform(&self) -> RecoveredTransform {
        self.use_instance
            .as_ref()
            .and_then(|u| u.transform)
            .unwrap_or_default()
    }
}

/// Inherited state while descending the tree
#[derive(Clone)]
struct Context<'a> {
    /// Transform up to and including the nearest `<use>` copy
    instance_transform: Affine,
    /// Transform below the nearest `<use>` copy
    local_transform: Affine,
    fill: Option<&'a str>,
    opacity: f32,
    mask: Option<&'a str>,
    instance: Option<(usize, &'a str)>,
}

/// Collect the drawable shapes of `doc` in document order
pub fn extract_shapes(
    doc: &Document,
    config: &ConvertConfig,
    gradients: &BTreeMap<String, GradientDefinition>,
    masks: &BTreeMap<String, MaskDefinition>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ShapeSource>> {
    let mut extractor = Extractor {
        doc,
        config,
        gradients,
        masks,
        diagnostics,
        shapes: Vec::new(),
    };
    let root = Context {
        instance_transform: Affine::IDENTITY,
        local_transform: Affine::IDENTITY,
        fill: None,
        opacity: 1.0,
        mask: None,
        instance: None,
    };
    extractor.visit(&doc.root, root)?;
    debug!(shapes = extractor.shapes.len(), "extracted shapes");
    Ok(extractor.shapes)
}

struct Extractor<'a, 'd> {
    doc: &'a Document,
    config: &'a ConvertConfig,
    gradients: &'a BTreeMap<String, GradientDefinition>,
    masks: &'a BTreeMap<String, MaskDefinition>,
    diagnostics: &'d mut Diagnostics,
    shapes: Vec<ShapeSource>,
}

impl<'a> Extractor<'a, '_> {
    fn visit(&mut self, el: &'a Element, parent: Context<'a>) -> Result<()> {
        if el.is("use") || property(el, "display") == Some("none") {
            return Ok(());
        }
        // A copied <symbol> renders like a group; other definitions never do
        let is_copy = el.expansion.is_some();
        if NON_RENDERING.contains(&el.name.as_str()) && !(is_copy && el.is("symbol")) {
            return Ok(());
        }

        let mut ctx = parent;
        let own = el.attr("transform").map_or(Affine::IDENTITY, parse_transform);
        if let Some(exp) = &el.expansion {
            ctx.instance_transform = ctx.instance_transform * ctx.local_transform * own;
            ctx.local_transform = Affine::IDENTITY;
            ctx.instance = Some((exp.depth, exp.target_id.as_str()));
        } else {
            ctx.local_transform = ctx.local_transform * own;
        }
        if let Some(fill) = property(el, "fill") {
            ctx.fill = Some(fill);
        }
        if let Some(opacity) = property(el, "opacity").and_then(parse_number) {
            ctx.opacity *= opacity.clamp(0.0, 1.0);
        }
        if let Some(mask) = property(el, "mask") {
            ctx.mask = Some(mask);
        }

        if let Some(path) = element_path(el, self.config.curve_tolerance)? {
            self.push_shape(el, &ctx, path);
        }
        for child in &el.children {
            self.visit(child, ctx.clone())?;
        }
        Ok(())
    }

    fn push_shape(&mut self, el: &Element, ctx: &Context<'_>, mut path: BezPath) {
        let Some(fill) = self.resolve_fill(el, ctx) else {
            return;
        };

        let recovered = ctx
            .instance
            .filter(|_| self.config.inherit_transforms)
            .and_then(|_| RecoveredTransform::from_affine(ctx.instance_transform));
        let baked = if recovered.is_some() {
            ctx.local_transform
        } else {
            ctx.instance_transform * ctx.local_transform
        };
        path.apply_affine(baked);

        let mask_id = self.resolve_mask(ctx);
        let use_instance = ctx.instance.map(|(depth, target)| UseInstance {
            depth,
            target_id: target.to_string(),
            transform: recovered,
        });
        self.shapes.push(ShapeSource {
            tag: el.name.clone(),
            path,
            fill,
            mask_id,
            use_instance,
        });
    }

    /// `None` when the shape is not filled at all
    fn resolve_fill(&mut self, el: &Element, ctx: &Context<'_>) -> Option<Fill> {
        let base = self.config.base_color;
        let fill_opacity = property(el, "fill-opacity")
            .and_then(parse_number)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        let alpha = ctx.opacity * fill_opacity;
        let fallback = Fill::Color([base[0], base[1], base[2], base[3] * alpha]);
        let paint = ctx.fill.map_or(Paint::Unresolved, Paint::parse);
        match paint {
            Paint::None => None,
            Paint::Color([r, g, b]) => Some(Fill::Color([r, g, b, alpha])),
            Paint::Unresolved => Some(fallback),
            Paint::Reference(id) => {
                if self.gradients.contains_key(&id) {
                    return Some(Fill::Gradient { id, alpha });
                }
                let warning = match self.doc.find_by_id(&id) {
                    Some(target) => Warning::UnsupportedGradient {
                        id,
                        kind: target.name.clone(),
                    },
                    None => Warning::DanglingGradient { id },
                };
                self.diagnostics.push(warning);
                Some(fallback)
            }
        }
    }

    fn resolve_mask(&mut self, ctx: &Context<'_>) -> Option<String> {
        if !self.config.enable_masks {
            return None;
        }
        let id = parse_url_ref(ctx.mask?)?;
        if self.masks.contains_key(id) {
            Some(id.to_string())
        } else {
            self.diagnostics.push(Warning::DanglingMask { id: id.to_string() });
            None
        }
    }
}

/// Outline of a basic shape element in its own coordinate system
fn element_path(el: &Element, tolerance: f32) -> Result<Option<BezPath>> {
    let tolerance = f64::from(tolerance);
    let num = |name: &str| f64::from(el.number_attr(name).unwrap_or(0.0));
    let path = match el.name.as_str() {
        "path" => {
            let Some(d) = el.attr("d").filter(|d| !d.trim().is_empty()) else {
                return Ok(None);
            };
            BezPath::from_svg(d)
                .map_err(|err| Error::Parse(format!("invalid path data {d:?}: {err}")))?
        }
        "rect" => {
            let (w, h) = (num("width"), num("height"));
            if w <= 0.0 || h <= 0.0 {
                return Ok(None);
            }
            let rect = Rect::new(num("x"), num("y"), num("x") + w, num("y") + h);
            // A single radius applies to both axes
            let rx = el.number_attr("rx").or_else(|| el.number_attr("ry"));
            match rx.map(f64::from) {
                Some(r) if r > 0.0 => RoundedRect::from_rect(rect, r.min(w / 2.0).min(h / 2.0))
                    .to_path(tolerance),
                _ => rect.to_path(tolerance),
            }
        }
        "circle" => {
            let r = num("r");
            if r <= 0.0 {
                return Ok(None);
            }
            Circle::new(Point::new(num("cx"), num("cy")), r).to_path(tolerance)
        }
        "ellipse" => {
            let (rx, ry) = (num("rx"), num("ry"));
            if rx <= 0.0 || ry <= 0.0 {
                return Ok(None);
            }
            Ellipse::new(Point::new(num("cx"), num("cy")), (rx, ry), 0.0).to_path(tolerance)
        }
        "polygon" | "polyline" => {
            let coords = parse_number_list(el.attr("points").unwrap_or_default());
            let mut points = coords
                .chunks_exact(2)
                .map(|p| Point::new(f64::from(p[0]), f64::from(p[1])));
            let Some(first) = points.next() else {
                return Ok(None);
            };
            let mut path = BezPath::new();
            path.move_to(first);
            for p in points {
                path.line_to(p);
            }
            // Filled polylines close implicitly
            path.close_path();
            path
        }
        _ => return Ok(None),
    };
    Ok(Some(path))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::defs::{parse_gradients, parse_masks};
    use crate::diagnostics::WarningKind;
    use crate::preprocess::expand_uses;
    use approx::assert_relative_eq;

    fn extract(svg: &str, config: &ConvertConfig) -> (Vec<ShapeSource>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let doc = expand_uses(&Document::parse(svg).unwrap(), config.max_use_depth, &mut diag);
        let gradients = parse_gradients(&doc);
        let masks = parse_masks(&doc, &mut diag);
        let shapes = extract_shapes(&doc, config, &gradients, &masks, &mut diag).unwrap();
        (shapes, diag)
    }

    #[test]
    fn resolves_inherited_fill_and_skips_definitions() {
        let (shapes, diag) = extract(
            r##"<svg>
                <defs><rect id="hidden" width="5" height="5"/></defs>
                <g fill="#ff0000" opacity="0.5"><circle r="2"/><rect width="1" height="1" fill="none"/></g>
                <line x2="5" y2="5"/>
            </svg>"##,
            &ConvertConfig::default(),
        );
        assert!(diag.is_empty());
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].tag, "circle");
        let Fill::Color(c) = shapes[0].fill else {
            panic!("expected flat color");
        };
        assert_eq!(c[..3], [1.0, 0.0, 0.0]);
        assert_relative_eq!(c[3], 0.5);
    }

    #[test]
    fn style_fill_wins_and_gradients_resolve() {
        let (shapes, diag) = extract(
            r##"<svg>
                <linearGradient id="g"/>
                <radialGradient id="r"/>
                <rect width="1" height="1" fill="red" style="fill: url(#g)"/>
                <rect width="1" height="1" fill="url(#r)"/>
                <rect width="1" height="1" fill="url(#missing)"/>
            </svg>"##,
            &ConvertConfig::default(),
        );
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].gradient_id(), Some("g"));
        assert_eq!(shapes[1].fill, Fill::Color([1.0; 4]));
        assert_eq!(diag.count(WarningKind::Reference), 2);
        assert!(matches!(diag.warnings()[0], Warning::UnsupportedGradient { .. }));
        assert!(matches!(diag.warnings()[1], Warning::DanglingGradient { .. }));
    }

    #[test]
    fn group_opacity_reaches_gradient_fills() {
        let (shapes, _) = extract(
            r##"<svg><linearGradient id="g"/><g opacity="0.5"><rect width="1" height="1" fill="url(#g)" fill-opacity="0.5"/></g></svg>"##,
            &ConvertConfig::default(),
        );
        let Fill::Gradient { id, alpha } = &shapes[0].fill else {
            panic!("expected gradient fill");
        };
        assert_eq!(id, "g");
        assert_relative_eq!(*alpha, 0.25);
    }

    #[test]
    fn mask_comes_from_nearest_ancestor() {
        let (shapes, diag) = extract(
            r##"<svg>
                <mask id="m"><rect width="1" height="1"/></mask>
                <g mask="url(#m)"><rect width="2" height="2"/></g>
                <rect width="1" height="1" mask="url(#gone)"/>
            </svg>"##,
            &ConvertConfig::default(),
        );
        assert_eq!(shapes[0].mask_id.as_deref(), Some("m"));
        assert_eq!(shapes[1].mask_id, None);
        assert_eq!(diag.len(), 1);

        let (shapes, _) = extract(
            r##"<svg><mask id="m"/><rect width="1" height="1" mask="url(#m)"/></svg>"##,
            &ConvertConfig::default().with_masks(false),
        );
        assert_eq!(shapes[0].mask_id, None);
    }

    #[test]
    fn use_transform_moves_to_mesh_when_inherited() {
        let svg = r##"<svg><g transform="translate(100 0)"><rect id="r" width="4" height="4"/></g><use href="#r" x="5" y="5"/></svg>"##;
        let (shapes, _) = extract(svg, &ConvertConfig::default());
        assert_eq!(shapes.len(), 2);
        let original = shapes[0].path.bounding_box();
        assert_relative_eq!(original.x0, 100.0);

        let instance = shapes[1].use_instance.as_ref().unwrap();
        assert_eq!(instance.depth, 0);
        assert_eq!(instance.target_id, "r");
        let t = instance.transform.unwrap();
        assert_relative_eq!(t.translation.x, 5.0);
        assert_relative_eq!(t.translation.y, 5.0);
        // Geometry stays at the target's own coordinates
        assert_relative_eq!(shapes[1].path.bounding_box().x0, 0.0);

        let (baked, _) = extract(svg, &ConvertConfig::default().with_inherit_transforms(false));
        let instance = baked[1].use_instance.as_ref().unwrap();
        assert!(instance.transform.is_none());
        assert_relative_eq!(baked[1].path.bounding_box().x0, 5.0);
    }

    #[test]
    fn skewed_instances_are_baked() {
        let (shapes, _) = extract(
            r##"<svg><rect id="r" width="4" height="4"/><use href="#r" transform="skewX(45)"/></svg>"##,
            &ConvertConfig::default(),
        );
        let instance = shapes[1].use_instance.as_ref().unwrap();
        assert!(instance.transform.is_none());
        assert_relative_eq!(shapes[1].path.bounding_box().x1, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn symbol_copies_render() {
        let (shapes, _) = extract(
            r##"<svg><symbol id="s"><circle r="1"/></symbol><use href="#s"/></svg>"##,
            &ConvertConfig::default(),
        );
        assert_eq!(shapes.len(), 1);
        assert!(shapes[0].use_instance.is_some());
    }

    #[test]
    fn invalid_path_data_is_a_parse_error() {
        let doc = Document::parse(r#"<svg><path d="M 0 0 L x y"/></svg>"#).unwrap();
        let mut diag = Diagnostics::new();
        let err = extract_shapes(
            &doc,
            &ConvertConfig::default(),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &mut diag,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
