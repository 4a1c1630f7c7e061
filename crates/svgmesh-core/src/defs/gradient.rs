//! `<linearGradient>` definitions

use crate::document::{Document, Element};
use crate::style::{parse_color, parse_fraction, parse_number, property};
use glam::Vec2;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Range normalized gradient coordinates are clamped to
const COORD_MIN: f32 = -1.0;
const COORD_MAX: f32 = 2.0;

/// One color anchor along a gradient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Position along the gradient axis, `[0, 1]`
    pub offset: f32,
    pub color: [f32; 3],
    /// `[0, 1]`
    pub opacity: f32,
}

impl ColorStop {
    pub const fn new(offset: f32, color: [f32; 3], opacity: f32) -> Self {
        Self {
            offset,
            color,
            opacity,
        }
    }

    pub fn rgba(&self) -> [f32; 4] {
        [self.color[0], self.color[1], self.color[2], self.opacity]
    }
}

/// Direction and length of a gradient axis in normalized bounding-box space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientAxis {
    pub start: Vec2,
    /// Unit vector from start to end; `+x` for a zero-length axis
    pub direction: Vec2,
    pub length: f32,
}

impl GradientAxis {
    pub fn between(start: Vec2, end: Vec2) -> Self {
        let delta = end - start;
        let length = delta.length();
        let direction = if length > 0.0 { delta / length } else { Vec2::X };
        Self {
            start,
            direction,
            length,
        }
    }

    /// Gradient parameter of a point in normalized bounding-box space
    pub fn parameter(&self, point: Vec2) -> f32 {
        if self.length <= f32::EPSILON {
            // Zero-length gradients paint the last stop
            return 1.0;
        }
        ((point - self.start).dot(self.direction) / self.length).clamp(0.0, 1.0)
    }
}

/// A parsed linear gradient
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDefinition {
    pub id: String,
    /// `(x1, y1)`, normalized and clamped to `[-1, 2]`
    pub start: Vec2,
    /// `(x2, y2)`, normalized and clamped to `[-1, 2]`
    pub end: Vec2,
    /// Sorted by offset, at least two, first at 0 and last at 1
    pub stops: Vec<ColorStop>,
    /// Recorded when the texture is synthesized
    pub axis: Option<GradientAxis>,
}

impl GradientDefinition {
    /// Build a definition from raw stops, repairing them into a usable ramp
    pub fn new(id: impl Into<String>, start: Vec2, end: Vec2, stops: Vec<ColorStop>) -> Self {
        Self {
            id: id.into(),
            start: start.clamp(Vec2::splat(COORD_MIN), Vec2::splat(COORD_MAX)),
            end: end.clamp(Vec2::splat(COORD_MIN), Vec2::splat(COORD_MAX)),
            stops: normalize_stops(stops),
            axis: None,
        }
    }

    /// The recorded axis, or the one implied by the end points
    pub fn axis(&self) -> GradientAxis {
        self.axis
            .unwrap_or_else(|| GradientAxis::between(self.start, self.end))
    }

    /// Interpolated RGBA at gradient parameter `t`
    pub fn color_at(&self, t: f32) -> [f32; 4] {
        let t = t.clamp(0.0, 1.0);
        let Some(upper) = self.stops.iter().position(|s| s.offset >= t) else {
            return self.stops.last().map_or([0.0; 4], ColorStop::rgba);
        };
        if upper == 0 {
            return self.stops[0].rgba();
        }
        let (a, b) = (self.stops[upper - 1], self.stops[upper]);
        let span = b.offset - a.offset;
        let f = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
        let (ca, cb) = (a.rgba(), b.rgba());
        std::array::from_fn(|i| ca[i] + (cb[i] - ca[i]) * f)
    }
}

/// Sort stops and pad them so interpolation is defined over all of `[0, 1]`
pub fn normalize_stops(mut stops: Vec<ColorStop>) -> Vec<ColorStop> {
    for stop in &mut stops {
        stop.offset = if stop.offset.is_nan() { 0.0 } else { stop.offset.clamp(0.0, 1.0) };
        stop.opacity = if stop.opacity.is_nan() { 1.0 } else { stop.opacity.clamp(0.0, 1.0) };
    }
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    if stops.is_empty() {
        stops.push(ColorStop::new(0.0, [0.0; 3], 1.0));
        stops.push(ColorStop::new(1.0, [1.0; 3], 1.0));
    } else if stops.len() == 1 {
        let single = stops[0];
        stops.push(ColorStop { offset: 1.0, ..single });
    }

    if let Some(&first) = stops.first() {
        if first.offset > 0.0 {
            stops.insert(0, ColorStop { offset: 0.0, ..first });
        }
    }
    if let Some(&last) = stops.last() {
        if last.offset < 1.0 {
            stops.push(ColorStop { offset: 1.0, ..last });
        }
    }
    stops
}

/// Parse every `<linearGradient>` in the document, keyed by id.
///
/// Gradients without their own stops inherit them through `href`.
pub fn parse_gradients(doc: &Document) -> BTreeMap<String, GradientDefinition> {
    let mut by_id: HashMap<&str, &Element> = HashMap::new();
    for el in doc.root.descendants() {
        if let Some(id) = el.id() {
            by_id.entry(id).or_insert(el);
        }
    }

    let mut gradients = BTreeMap::new();
    for el in doc.elements_named("linearGradient") {
        let Some(id) = el.id() else {
            continue;
        };
        if gradients.contains_key(id) {
            continue;
        }
        let chain = href_chain(el, &by_id);
        let coord = |name: &str, default: f32| {
            chain
                .iter()
                .find_map(|g| g.attr(name))
                .and_then(parse_coordinate)
                .unwrap_or(default)
        };
        let start = Vec2::new(coord("x1", 0.0), coord("y1", 0.0));
        let end = Vec2::new(coord("x2", 1.0), coord("y2", 0.0));
        let stops = chain
            .iter()
            .find(|g| g.children_named("stop").next().is_some())
            .map(|g| parse_stops(g))
            .unwrap_or_default();

        let def = GradientDefinition::new(id, start, end, stops);
        debug!(
            id,
            stops = def.stops.len(),
            start = ?def.start,
            end = ?def.end,
            "parsed gradient"
        );
        gradients.insert(id.to_string(), def);
    }
    gradients
}

/// The element followed by the gradients its `href` chain reaches
fn href_chain<'a>(el: &'a Element, by_id: &HashMap<&str, &'a Element>) -> Vec<&'a Element> {
    let mut chain = vec![el];
    let mut seen = HashSet::new();
    seen.insert(el as *const Element);
    let mut current = el;
    while let Some(next) = current
        .attr("href")
        .map(|href| href.trim().trim_start_matches('#'))
        .and_then(|id| by_id.get(id).copied())
    {
        if !next.name.ends_with("Gradient") || !seen.insert(next as *const Element) {
            break;
        }
        chain.push(next);
        current = next;
    }
    chain
}

/// Percentages map to fractions; absolute values above 2 are treated as user
/// units and scaled down by 100
fn parse_coordinate(text: &str) -> Option<f32> {
    let value = if text.contains('%') {
        parse_fraction(text)?
    } else {
        let v = parse_number(text)?;
        if v.abs() > 2.0 { v / 100.0 } else { v }
    };
    Some(value.clamp(COORD_MIN, COORD_MAX))
}

fn parse_stops(gradient: &Element) -> Vec<ColorStop> {
    let stops: Vec<&Element> = gradient.children_named("stop").collect();
    let count = stops.len();
    stops
        .iter()
        .enumerate()
        .map(|(index, stop)| {
            let offset = stop.attr("offset").and_then(parse_fraction).unwrap_or_else(|| {
                if count > 1 {
                    index as f32 / (count - 1) as f32
                } else {
                    0.0
                }
            });
            let color = property(stop, "stop-color")
                .and_then(parse_color)
                .unwrap_or([0.0; 3]);
            let opacity = property(stop, "stop-opacity")
                .and_then(parse_number)
                .unwrap_or(1.0);
            ColorStop::new(offset, color, opacity)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(svg: &str) -> BTreeMap<String, GradientDefinition> {
        parse_gradients(&Document::parse(svg).unwrap())
    }

    fn assert_well_formed(stops: &[ColorStop]) {
        assert!(stops.len() >= 2);
        assert_relative_eq!(stops[0].offset, 0.0);
        assert_relative_eq!(stops[stops.len() - 1].offset, 1.0);
        assert!(stops.windows(2).all(|w| w[0].offset <= w[1].offset));
    }

    #[test]
    fn synthesizes_stops_for_empty_and_single() {
        let empty = normalize_stops(Vec::new());
        assert_well_formed(&empty);
        assert_eq!(empty[0].color, [0.0; 3]);
        assert_eq!(empty[1].color, [1.0; 3]);

        let single = normalize_stops(vec![ColorStop::new(0.4, [1.0, 0.0, 0.0], 1.0)]);
        assert_well_formed(&single);
        assert!(single.iter().all(|s| s.color == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn sorts_clamps_and_pads() {
        let stops = normalize_stops(vec![
            ColorStop::new(0.8, [1.0; 3], 2.0),
            ColorStop::new(0.2, [0.0; 3], 1.0),
        ]);
        assert_well_formed(&stops);
        assert_eq!(stops.len(), 4);
        assert_relative_eq!(stops[1].offset, 0.2);
        assert_relative_eq!(stops[3].opacity, 1.0);
    }

    #[test]
    fn parses_coordinates_and_stops() {
        let gradients = parse(
            r##"<svg><defs>
                <linearGradient id="g" x1="10%" y1="0" x2="250" y2="50%">
                    <stop offset="0%" stop-color="#000"/>
                    <stop offset="1" style="stop-color: #fff; stop-opacity: 0.5"/>
                </linearGradient>
            </defs></svg>"##,
        );
        let g = &gradients["g"];
        assert_relative_eq!(g.start.x, 0.1);
        assert_relative_eq!(g.end.x, 2.0);
        assert_relative_eq!(g.end.y, 0.5);
        assert_eq!(g.stops.len(), 2);
        assert_relative_eq!(g.stops[1].opacity, 0.5);
        assert_eq!(g.stops[1].color, [1.0; 3]);
    }

    #[test]
    fn defaults_to_horizontal_axis() {
        let gradients = parse(r#"<svg><linearGradient id="g"/></svg>"#);
        let g = &gradients["g"];
        assert_eq!(g.start, Vec2::ZERO);
        assert_eq!(g.end, Vec2::X);
        assert_well_formed(&g.stops);
    }

    #[test]
    fn inherits_stops_through_href() {
        let gradients = parse(
            r##"<svg>
                <linearGradient id="base"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient>
                <linearGradient id="derived" href="#base" x2="0" y2="1"/>
                <linearGradient id="loop" href="#loop"/>
            </svg>"##,
        );
        let derived = &gradients["derived"];
        assert_eq!(derived.stops[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(derived.end, Vec2::Y);
        assert_well_formed(&gradients["loop"].stops);
    }

    #[test]
    fn interpolates_between_stops() {
        let g = GradientDefinition::new("g", Vec2::ZERO, Vec2::X, normalize_stops(Vec::new()));
        assert_relative_eq!(g.color_at(0.0)[0], 0.0);
        assert_relative_eq!(g.color_at(0.25)[0], 0.25);
        assert_relative_eq!(g.color_at(1.0)[0], 1.0);
    }

    #[test]
    fn axis_parameter() {
        let axis = GradientAxis::between(Vec2::ZERO, Vec2::new(0.0, 0.5));
        assert_relative_eq!(axis.parameter(Vec2::new(0.7, 0.25)), 0.5);
        assert_relative_eq!(axis.parameter(Vec2::new(0.0, 2.0)), 1.0);
        let degenerate = GradientAxis::between(Vec2::ONE, Vec2::ONE);
        assert_relative_eq!(degenerate.parameter(Vec2::ZERO), 1.0);
    }
}
