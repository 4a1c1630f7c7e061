//! Outline extraction and prism extrusion
//!
//! Curves are flattened into rings, rings are grouped into outer boundaries
//! with their holes, and each group is capped with a lyon tessellation and
//! closed with flat-shaded side walls.

use super::{Mesh, Vertex};
use crate::{Error, Result};
use glam::{Vec2, Vec3};
use kurbo::{BezPath, PathEl};
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, VertexBuffers,
};

const EPSILON: f32 = 1e-6;

/// A closed outer boundary with the holes cut into it.
///
/// The exterior winds counter-clockwise (positive signed area), holes wind
/// clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub exterior: Vec<Vec2>,
    pub holes: Vec<Vec<Vec2>>,
}

impl Outline {
    pub fn area(&self) -> f32 {
        signed_area(&self.exterior) + self.holes.iter().map(|h| signed_area(h)).sum::<f32>()
    }

    fn rings(&self) -> impl Iterator<Item = &Vec<Vec2>> {
        std::iter::once(&self.exterior).chain(&self.holes)
    }
}

/// Flatten a path and split it into outlines with holes.
///
/// Zero-area rings are dropped. A ring counts as a hole when it lies inside
/// an odd number of other rings; it is attached to the smallest ring that
/// contains it.
pub fn outlines_from_path(path: &BezPath, tolerance: f64) -> Result<Vec<Outline>> {
    let mut rings: Vec<Vec<Vec2>> = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    let mut non_finite = false;
    path.flatten(tolerance, |el| match el {
        PathEl::MoveTo(p) => {
            rings.push(std::mem::take(&mut current));
            current.push(Vec2::new(p.x as f32, p.y as f32));
        }
        PathEl::LineTo(p) => current.push(Vec2::new(p.x as f32, p.y as f32)),
        PathEl::ClosePath => rings.push(std::mem::take(&mut current)),
        // flatten only emits lines
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => non_finite = true,
    });
    rings.push(current);

    if non_finite || rings.iter().flatten().any(|p| !p.is_finite()) {
        return Err(Error::Geometry("outline contains non-finite coordinates".into()));
    }

    let rings: Vec<Vec<Vec2>> = rings
        .into_iter()
        .map(clean_ring)
        .filter(|ring| ring.len() >= 3 && signed_area(ring).abs() > EPSILON)
        .collect();

    let areas: Vec<f32> = rings.iter().map(|r| signed_area(r).abs()).collect();
    let containers: Vec<Vec<usize>> = rings
        .iter()
        .enumerate()
        .map(|(i, ring)| {
            (0..rings.len())
                .filter(|&j| j != i && areas[j] > areas[i] && contains(&rings[j], ring[0]))
                .collect()
        })
        .collect();

    let mut outlines: Vec<Outline> = Vec::new();
    let mut outline_of_ring = vec![None; rings.len()];
    for (i, ring) in rings.iter().enumerate() {
        if containers[i].len() % 2 == 0 {
            outline_of_ring[i] = Some(outlines.len());
            outlines.push(Outline {
                exterior: oriented(ring.clone(), true),
                holes: Vec::new(),
            });
        }
    }
    for (i, ring) in rings.iter().enumerate() {
        let depth = containers[i].len();
        if depth % 2 == 1 {
            let parent = containers[i]
                .iter()
                .copied()
                .filter(|&j| containers[j].len() + 1 == depth)
                .min_by(|&a, &b| areas[a].total_cmp(&areas[b]))
                .and_then(|j| outline_of_ring[j]);
            if let Some(parent) = parent {
                outlines[parent].holes.push(oriented(ring.clone(), false));
            }
        }
    }
    Ok(outlines)
}

/// Extrude an outline into a closed prism from `z = 0` to `z = depth`.
///
/// UVs are the vertex position normalized into the outline's bounding box,
/// with v pointing up (`v = 0` at the largest y).
pub fn extrude_outline(outline: &Outline, depth: f32) -> Result<Mesh> {
    let (cap_vertices, cap_indices) = tessellate(outline)?;
    if cap_indices.is_empty() {
        return Err(Error::Geometry(format!(
            "outline with area {} produced no triangles",
            outline.area()
        )));
    }

    let (min, max) = outline
        .exterior
        .iter()
        .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), p| {
            (lo.min(*p), hi.max(*p))
        });
    let size = max - min;
    let uv = |p: Vec2| {
        let u = if size.x > EPSILON { (p.x - min.x) / size.x } else { 0.0 };
        let v = if size.y > EPSILON { (p.y - min.y) / size.y } else { 0.0 };
        Vec2::new(u, 1.0 - v)
    };

    let mut mesh = Mesh::new();
    let caps: &[(f32, Vec3)] = if depth > 0.0 {
        &[(0.0, Vec3::NEG_Z), (depth, Vec3::Z)]
    } else {
        &[(0.0, Vec3::Z)]
    };
    for &(z, normal) in caps {
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(
            cap_vertices
                .iter()
                .map(|&p| Vertex::new(p.extend(z), normal, uv(p))),
        );
        for tri in cap_indices.chunks_exact(3) {
            push_facing(&mut mesh, [base + tri[0], base + tri[1], base + tri[2]], normal);
        }
    }

    if depth > 0.0 {
        for ring in outline.rings() {
            for (i, &a) in ring.iter().enumerate() {
                let b = ring[(i + 1) % ring.len()];
                let edge = b - a;
                if edge.length() <= EPSILON {
                    continue;
                }
                // Exterior is CCW and holes CW, so the right-hand side faces out
                let normal = Vec3::new(edge.y, -edge.x, 0.0).normalize();
                let base = mesh.vertices.len() as u32;
                mesh.vertices.extend([
                    Vertex::new(a.extend(0.0), normal, uv(a)),
                    Vertex::new(b.extend(0.0), normal, uv(b)),
                    Vertex::new(b.extend(depth), normal, uv(b)),
                    Vertex::new(a.extend(depth), normal, uv(a)),
                ]);
                push_facing(&mut mesh, [base, base + 1, base + 2], normal);
                push_facing(&mut mesh, [base, base + 2, base + 3], normal);
            }
        }
    }
    Ok(mesh)
}

fn tessellate(outline: &Outline) -> Result<(Vec<Vec2>, Vec<u32>)> {
    let mut builder = Path::builder();
    for ring in outline.rings() {
        let Some((first, rest)) = ring.split_first() else {
            continue;
        };
        builder.begin(point(first.x, first.y));
        for p in rest {
            builder.line_to(point(p.x, p.y));
        }
        builder.end(true);
    }
    let path = builder.build();

    let mut buffers: VertexBuffers<Vec2, u32> = VertexBuffers::new();
    FillTessellator::new()
        .tessellate_path(
            &path,
            &FillOptions::default().with_fill_rule(FillRule::EvenOdd),
            &mut BuffersBuilder::new(&mut buffers, |vertex: FillVertex| {
                Vec2::new(vertex.position().x, vertex.position().y)
            }),
        )
        .map_err(|err| Error::Geometry(format!("tessellation failed: {err:?}")))?;
    Ok((buffers.vertices, buffers.indices))
}

/// Push a triangle, flipping its winding if it does not face `normal`
fn push_facing(mesh: &mut Mesh, [a, b, c]: [u32; 3], normal: Vec3) {
    let p = |i: u32| mesh.vertices[i as usize].pos();
    let face = (p(b) - p(a)).cross(p(c) - p(a));
    if face.dot(normal) < 0.0 {
        mesh.indices.extend([a, c, b]);
    } else {
        mesh.indices.extend([a, b, c]);
    }
}

/// Drop repeated points, including a closing point equal to the first
fn clean_ring(mut ring: Vec<Vec2>) -> Vec<Vec2> {
    ring.dedup_by(|a, b| a.distance_squared(*b) <= EPSILON * EPSILON);
    while ring.len() > 1
        && ring
            .first()
            .zip(ring.last())
            .is_some_and(|(f, l)| f.distance_squared(*l) <= EPSILON * EPSILON)
    {
        ring.pop();
    }
    ring
}

fn oriented(mut ring: Vec<Vec2>, counter_clockwise: bool) -> Vec<Vec2> {
    if (signed_area(&ring) > 0.0) != counter_clockwise {
        ring.reverse();
    }
    ring
}

/// Shoelace area, positive for counter-clockwise rings (y up)
pub(crate) fn signed_area(ring: &[Vec2]) -> f32 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
        * 0.5
}

/// Even-odd point-in-polygon test
fn contains(ring: &[Vec2], p: Vec2) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn outlines(d: &str) -> Vec<Outline> {
        outlines_from_path(&BezPath::from_svg(d).unwrap(), 0.1).unwrap()
    }

    #[test]
    fn square_becomes_single_outline() {
        let out = outlines("M0 0 H10 V10 H0 Z");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].exterior.len(), 4);
        assert!(out[0].holes.is_empty());
        assert_relative_eq!(out[0].area(), 100.0);
    }

    #[test]
    fn inner_ring_is_a_hole_and_island_is_separate() {
        let out = outlines(
            "M0 0 H30 V30 H0 Z M5 5 H25 V25 H5 Z M10 10 H20 V20 H10 Z",
        );
        assert_eq!(out.len(), 2);
        let frame = out.iter().find(|o| !o.holes.is_empty()).unwrap();
        assert_relative_eq!(frame.area(), 900.0 - 400.0);
        assert!(signed_area(&frame.holes[0]) < 0.0);
    }

    #[test]
    fn degenerate_rings_are_skipped() {
        assert!(outlines("M0 0 L10 0 L20 0 Z").is_empty());
        assert!(outlines("M0 0 L5 5").is_empty());
    }

    #[test]
    fn curves_are_flattened() {
        let out = outlines("M0 0 C 0 10 10 10 10 0 Z");
        assert_eq!(out.len(), 1);
        assert!(out[0].exterior.len() > 4);
    }

    #[test]
    fn prism_is_closed_with_outward_normals() {
        let out = outlines("M0 0 H10 V10 H0 Z");
        let mesh = extrude_outline(&out[0], 5.0).unwrap();
        // Two caps of two triangles and four walls of two triangles
        assert_eq!(mesh.triangle_count(), 12);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(10.0, 10.0, 5.0));

        let center = bounds.center();
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].pos());
            let face = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face.dot(centroid - center) > 0.0, "inward facing triangle");
        }
    }

    #[test]
    fn hole_walls_face_into_the_hole() {
        let out = outlines("M0 0 H30 V30 H0 Z M10 10 H20 V20 H10 Z");
        let mesh = extrude_outline(&out[0], 1.0).unwrap();
        let hole_center = Vec3::new(15.0, 15.0, 0.0);
        let hole_walls: Vec<&Vertex> = mesh
            .vertices
            .iter()
            .filter(|v| {
                v.normal[2] == 0.0
                    && (10.0..=20.0).contains(&v.position[0])
                    && (10.0..=20.0).contains(&v.position[1])
            })
            .collect();
        assert_eq!(hole_walls.len(), 16);
        for v in hole_walls {
            let n = Vec3::from_array(v.normal);
            let to_center = (hole_center - v.pos()).with_z(0.0);
            assert!(n.dot(to_center) > 0.0);
        }
    }

    #[test]
    fn uvs_span_the_bounding_box() {
        let out = outlines("M2 2 H6 V4 H2 Z");
        let mesh = extrude_outline(&out[0], 1.0).unwrap();
        for v in &mesh.vertices {
            let expected_u = (v.position[0] - 2.0) / 4.0;
            let expected_v = 1.0 - (v.position[1] - 2.0) / 2.0;
            assert_relative_eq!(v.uv[0], expected_u);
            assert_relative_eq!(v.uv[1], expected_v);
        }
    }
}
