//! Extruded triangle meshes
//!
//! Geometry lives in SVG user space: x to the right, y down, and extrusion
//! along +z from `z = 0` to `z = depth`.

mod extrude;

pub use extrude::{Outline, extrude_outline, outlines_from_path};

use glam::{Mat4, Vec2, Vec3};
use serde::Serialize;

/// A vertex with position, normal, and UV coordinates
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Base-map coordinates; gradient UVs when the fill is a gradient
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn pos(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// A triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Alpha-map coordinates, one per vertex when the shape is masked
    pub mask_uvs: Vec<[f32; 2]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn has_mask_uvs(&self) -> bool {
        !self.mask_uvs.is_empty() && self.mask_uvs.len() == self.vertices.len()
    }

    /// Move the triangles of `other` into this mesh
    pub fn append(&mut self, mut other: Mesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.append(&mut other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
        self.mask_uvs.append(&mut other.mask_uvs);
    }

    /// Bounding box of all vertex positions
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(Vertex::pos))
    }

    /// Bounding box of the vertices after applying `transform`
    pub fn transformed_bounds(&self, transform: &Mat4) -> Option<Aabb> {
        Aabb::from_points(
            self.vertices
                .iter()
                .map(|v| transform.transform_point3(v.pos())),
        )
    }
}

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, `None` for no points
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self::new(p, p),
                Some(b) => Self::new(b.min.min(p), b.max.max(p)),
            })
        })
    }

    /// Merge two bounding boxes
    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Get the size of the bounding box
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Position of `p` within the box's x/y extent, `[0, 1]` inside.
    /// Flat axes map to 0.
    pub fn normalize_xy(&self, p: Vec3) -> Vec2 {
        let size = self.size();
        let axis = |value: f32, min: f32, extent: f32| {
            if extent > f32::EPSILON {
                (value - min) / extent
            } else {
                0.0
            }
        };
        Vec2::new(axis(p.x, self.min.x, size.x), axis(p.y, self.min.y, size.y))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bounds_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
        let b = Aabb::from_points([Vec3::new(1.0, 5.0, 0.0), Vec3::new(-1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 5.0, 3.0));
        assert_eq!(b.center(), Vec3::new(0.0, 3.5, 1.5));
    }

    #[test]
    fn append_offsets_indices() {
        let tri = |x: f32| Mesh {
            vertices: (0..3)
                .map(|i| Vertex::new(Vec3::new(x + i as f32, 0.0, 0.0), Vec3::Z, Vec2::ZERO))
                .collect(),
            indices: vec![0, 1, 2],
            mask_uvs: Vec::new(),
        };
        let mut mesh = tri(0.0);
        mesh.append(tri(10.0));
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_relative_eq!(mesh.bounds().unwrap().max.x, 12.0);
    }

    #[test]
    fn normalize_within_box() {
        let b = Aabb::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 4.0, 1.0));
        let n = b.normalize_xy(Vec3::new(15.0, 1.0, 0.5));
        assert_relative_eq!(n.x, 0.5);
        assert_relative_eq!(n.y, 0.25);
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(flat.normalize_xy(Vec3::new(0.5, 0.0, 0.0)).y, 0.0);
    }
}
