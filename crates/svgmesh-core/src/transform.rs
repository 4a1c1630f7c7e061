//! SVG `transform` attribute handling
//!
//! Transform lists are kept as text while `<use>` expansion composes them,
//! and only turned into matrices when geometry is built.

use crate::style::parse_number_list;
use glam::Vec2;
use kurbo::Affine;
use serde::Serialize;

/// One entry of a transform list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    Matrix([f64; 6]),
    Translate(f64, f64),
    Scale(f64, f64),
    /// Angle in degrees around `(cx, cy)`
    Rotate(f64, f64, f64),
    SkewX(f64),
    SkewY(f64),
}

impl TransformOp {
    pub fn to_affine(self) -> Affine {
        match self {
            Self::Matrix(m) => Affine::new(m),
            Self::Translate(x, y) => Affine::translate((x, y)),
            Self::Scale(x, y) => Affine::scale_non_uniform(x, y),
            Self::Rotate(deg, cx, cy) => {
                let rotation = Affine::rotate(deg.to_radians());
                if cx == 0.0 && cy == 0.0 {
                    rotation
                } else {
                    Affine::translate((cx, cy)) * rotation * Affine::translate((-cx, -cy))
                }
            }
            Self::SkewX(deg) => Affine::new([1.0, 0.0, deg.to_radians().tan(), 1.0, 0.0, 0.0]),
            Self::SkewY(deg) => Affine::new([1.0, deg.to_radians().tan(), 0.0, 1.0, 0.0, 0.0]),
        }
    }
}

/// Parse a transform list such as `translate(5, 5) rotate(45)`.
///
/// Unknown functions and malformed argument lists are skipped.
pub fn parse_transform_list(text: &str) -> Vec<TransformOp> {
    let mut ops = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')').map(|c| open + c) else {
            break;
        };
        let name = rest[..open]
            .trim_matches(|c: char| c.is_whitespace() || c == ',')
            .trim();
        let args: Vec<f64> = parse_number_list(&rest[open + 1..close])
            .into_iter()
            .map(f64::from)
            .collect();
        let op = match (name, args.as_slice()) {
            ("matrix", &[a, b, c, d, e, f]) => Some(TransformOp::Matrix([a, b, c, d, e, f])),
            ("translate", &[x]) => Some(TransformOp::Translate(x, 0.0)),
            ("translate", &[x, y]) => Some(TransformOp::Translate(x, y)),
            ("scale", &[s]) => Some(TransformOp::Scale(s, s)),
            ("scale", &[x, y]) => Some(TransformOp::Scale(x, y)),
            ("rotate", &[a]) => Some(TransformOp::Rotate(a, 0.0, 0.0)),
            ("rotate", &[a, cx, cy]) => Some(TransformOp::Rotate(a, cx, cy)),
            ("skewX", &[a]) => Some(TransformOp::SkewX(a)),
            ("skewY", &[a]) => Some(TransformOp::SkewY(a)),
            _ => None,
        };
        if let Some(op) = op {
            ops.push(op);
        }
        rest = &rest[close + 1..];
    }
    ops
}

/// Compose a transform list into one matrix (leftmost entry applied last)
pub fn parse_transform(text: &str) -> Affine {
    parse_transform_list(text)
        .into_iter()
        .fold(Affine::IDENTITY, |acc, op| acc * op.to_affine())
}

/// Textually concatenate transform lists, skipping empty parts
pub fn concat_transforms<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A 2D transform restricted to translation, non-uniform scale and a single
/// rotation about the depth axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecoveredTransform {
    pub translation: Vec2,
    pub scale: Vec2,
    /// Rotation about +z, radians
    pub rotation: f32,
}

impl Default for RecoveredTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RecoveredTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        scale: Vec2::ONE,
        rotation: 0.0,
    };

    /// Decompose an affine matrix as `T * R * S`.
    ///
    /// Returns `None` when the matrix carries skew (or is singular), which this
    /// form cannot represent.
    pub fn from_affine(affine: Affine) -> Option<Self> {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        let sx = a.hypot(b);
        if sx < 1e-12 {
            return None;
        }
        let det = a * d - b * c;
        let sy = det / sx;
        if sy.abs() < 1e-12 {
            return None;
        }
        let rotation = b.atan2(a);
        // Columns of R*S are (a, b) and (-sin*sy, cos*sy); anything else is skew
        let (sin, cos) = rotation.sin_cos();
        let expected_c = -sin * sy;
        let expected_d = cos * sy;
        let tolerance = 1e-6 * (1.0 + sx.abs().max(sy.abs()));
        if (c - expected_c).abs() > tolerance || (d - expected_d).abs() > tolerance {
            return None;
        }
        Some(Self {
            translation: Vec2::new(e as f32, f as f32),
            scale: Vec2::new(sx as f32, sy as f32),
            rotation: rotation as f32,
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn to_affine(self) -> Affine {
        Affine::translate((f64::from(self.translation.x), f64::from(self.translation.y)))
            * Affine::rotate(f64::from(self.rotation))
            * Affine::scale_non_uniform(f64::from(self.scale.x), f64::from(self.scale.y))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kurbo::Point;

    #[test]
    fn parses_common_functions() {
        let ops = parse_transform_list("translate(5,5) scale(2) rotate(90 1 1) skewX(10)");
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], TransformOp::Translate(5.0, 5.0));
        assert_eq!(ops[1], TransformOp::Scale(2.0, 2.0));
        assert_eq!(ops[2], TransformOp::Rotate(90.0, 1.0, 1.0));
        assert!(parse_transform_list("bogus(1) translate()").is_empty());
    }

    #[test]
    fn leftmost_applies_last() {
        let affine = parse_transform("translate(10, 0) scale(2)");
        let p = affine * Point::new(1.0, 1.0);
        assert_relative_eq!(p.x, 12.0);
        assert_relative_eq!(p.y, 2.0);
    }

    #[test]
    fn rotate_about_center() {
        let affine = parse_transform("rotate(180 5 5)");
        let p = affine * Point::new(0.0, 0.0);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn concat_skips_empty_parts() {
        assert_eq!(
            concat_transforms(["", "translate(1, 2)", "  ", "scale(3)"]),
            "translate(1, 2) scale(3)"
        );
    }

    #[test]
    fn recovers_translate_rotate_scale() {
        let affine = parse_transform("translate(3 4) rotate(30) scale(2 -1)");
        let rec = RecoveredTransform::from_affine(affine).unwrap();
        assert_relative_eq!(rec.translation.x, 3.0);
        assert_relative_eq!(rec.translation.y, 4.0);
        assert_relative_eq!(rec.rotation, 30f32.to_radians(), epsilon = 1e-5);
        assert_relative_eq!(rec.scale.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(rec.scale.y, -1.0, epsilon = 1e-5);

        let round_trip = rec.to_affine() * Point::new(1.0, 1.0);
        let direct = affine * Point::new(1.0, 1.0);
        assert_relative_eq!(round_trip.x, direct.x, epsilon = 1e-4);
        assert_relative_eq!(round_trip.y, direct.y, epsilon = 1e-4);
    }

    #[test]
    fn skew_is_not_recoverable() {
        assert!(RecoveredTransform::from_affine(parse_transform("skewX(30)")).is_none());
        assert!(RecoveredTransform::from_affine(parse_transform("scale(0)")).is_none());
        assert!(
            RecoveredTransform::from_affine(Affine::IDENTITY)
                .unwrap()
                .is_identity()
        );
    }
}
