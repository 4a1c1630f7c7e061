//! Texture coordinate generation
//!
//! Both mappings work in the normalized space of a bounding box, so they do
//! not change when the source shape is translated.

use crate::defs::GradientDefinition;
use crate::mesh::{Aabb, Mesh};

/// Project every vertex onto the gradient axis.
///
/// `u` is the clamped gradient parameter and `v` the texture midline.
/// Writes [`crate::mesh::Vertex::uv`].
pub fn apply_gradient_uvs(mesh: &mut Mesh, gradient: &GradientDefinition, bounds: &Aabb) {
    let axis = gradient.axis();
    for vertex in &mut mesh.vertices {
        let normalized = bounds.normalize_xy(vertex.pos());
        vertex.uv = [axis.parameter(normalized), 0.5];
    }
}

/// Map every vertex into the unit square of `bounds` with v inverted, so
/// the top edge of the box samples the first raster row.
///
/// Writes [`Mesh::mask_uvs`].
pub fn apply_mask_uvs(mesh: &mut Mesh, bounds: &Aabb) {
    mesh.mask_uvs = mesh
        .vertices
        .iter()
        .map(|vertex| {
            let n = bounds.normalize_xy(vertex.pos());
            [n.x.clamp(0.0, 1.0), (1.0 - n.y).clamp(0.0, 1.0)]
        })
        .collect();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::defs::normalize_stops;
    use crate::mesh::{extrude_outline, outlines_from_path};
    use approx::assert_relative_eq;
    use glam::Vec2;
    use kurbo::{Affine, BezPath};

    fn square_mesh(offset: (f64, f64)) -> Mesh {
        let mut path = BezPath::from_svg("M0 0 H10 V10 H0 Z").unwrap();
        path.apply_affine(Affine::translate(offset));
        let outline = &outlines_from_path(&path, 0.1).unwrap()[0];
        extrude_outline(outline, 2.0).unwrap()
    }

    fn horizontal() -> GradientDefinition {
        GradientDefinition::new("g", Vec2::ZERO, Vec2::X, normalize_stops(Vec::new()))
    }

    #[test]
    fn horizontal_gradient_spans_width() {
        let mut mesh = square_mesh((0.0, 0.0));
        let bounds = mesh.bounds().unwrap();
        apply_gradient_uvs(&mut mesh, &horizontal(), &bounds);
        for v in &mesh.vertices {
            assert_relative_eq!(v.uv[0], v.position[0] / 10.0);
            assert_relative_eq!(v.uv[1], 0.5);
        }
    }

    #[test]
    fn gradient_uvs_ignore_translation() {
        let mut a = square_mesh((0.0, 0.0));
        let mut b = square_mesh((123.0, -45.0));
        let (ba, bb) = (a.bounds().unwrap(), b.bounds().unwrap());
        let diagonal = GradientDefinition::new("d", Vec2::ZERO, Vec2::ONE, normalize_stops(Vec::new()));
        apply_gradient_uvs(&mut a, &diagonal, &ba);
        apply_gradient_uvs(&mut b, &diagonal, &bb);
        for vb in &b.vertices {
            let shifted = vb.pos() - glam::Vec3::new(123.0, -45.0, 0.0);
            let va = a
                .vertices
                .iter()
                .find(|va| va.pos().distance(shifted) < 1e-3)
                .unwrap();
            assert_relative_eq!(va.uv[0], vb.uv[0], epsilon = 1e-5);
        }
    }

    #[test]
    fn mask_uvs_flip_v() {
        let mut mesh = square_mesh((5.0, 5.0));
        let bounds = mesh.bounds().unwrap();
        apply_mask_uvs(&mut mesh, &bounds);
        assert!(mesh.has_mask_uvs());
        for (v, uv) in mesh.vertices.iter().zip(&mesh.mask_uvs) {
            assert_relative_eq!(uv[0], (v.position[0] - 5.0) / 10.0);
            assert_relative_eq!(uv[1], 1.0 - (v.position[1] - 5.0) / 10.0);
        }
        // Gradient channel untouched
        let before: Vec<_> = mesh.vertices.iter().map(|v| v.uv).collect();
        apply_mask_uvs(&mut mesh, &bounds);
        let after: Vec<_> = mesh.vertices.iter().map(|v| v.uv).collect();
        assert_eq!(before, after);
    }
}
