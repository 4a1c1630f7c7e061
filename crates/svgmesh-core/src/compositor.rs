//! Mesh group assembly
//!
//! Wraps every extruded shape into a [`MeshRecord`] with its own local
//! transform, then recenters the whole group and places it in the world.

use crate::config::ConvertConfig;
use crate::material::Material;
use crate::mesh::{Aabb, Mesh};
use crate::shapes::ShapeSource;
use crate::transform::RecoveredTransform;
use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

/// Placement of a single mesh inside its group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalTransform {
    pub translation: Vec3,
    /// Rotation about +z, radians
    pub rotation: f32,
    /// Depth axis stays at 1
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: 0.0,
            scale: Vec3::ONE,
        }
    }
}

impl LocalTransform {
    pub fn from_recovered(recovered: &RecoveredTransform) -> Self {
        Self {
            translation: recovered.translation.extend(0.0),
            rotation: recovered.rotation,
            scale: recovered.scale.extend(1.0),
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            Quat::from_rotation_z(self.rotation),
            self.translation,
        )
    }
}

/// Provenance attached to a mesh for inspection; never read by rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshMetadata {
    /// Tag of the source element
    pub source: String,
    pub has_gradient: bool,
    pub has_mask: bool,
    pub gradient_id: Option<String>,
    pub mask_id: Option<String>,
    pub is_use_instance: bool,
    pub use_depth: Option<usize>,
    pub use_target: Option<String>,
    pub recovered_transform: Option<RecoveredTransform>,
}

impl MeshMetadata {
    fn describe(shape: &ShapeSource, material: &Material) -> Self {
        let instance = shape.use_instance.as_ref();
        Self {
            source: shape.tag.clone(),
            has_gradient: material.has_gradient(),
            has_mask: material.alpha_map.is_some(),
            gradient_id: shape
                .gradient_id()
                .filter(|_| material.has_gradient())
                .map(str::to_string),
            mask_id: shape.mask_id.clone().filter(|_| material.alpha_map.is_some()),
            is_use_instance: instance.is_some(),
            use_depth: instance.map(|u| u.depth),
            use_target: instance.map(|u| u.target_id.clone()),
            recovered_transform: instance.and_then(|u| u.transform),
        }
    }
}

/// One renderable mesh of a group
#[derive(Debug, Clone)]
pub struct MeshRecord {
    pub mesh: Mesh,
    pub material: Material,
    pub transform: LocalTransform,
    /// Bounds of the untransformed geometry
    pub bounds: Aabb,
    pub metadata: MeshMetadata,
}

impl MeshRecord {
    /// Bounds after the local transform
    pub fn group_bounds(&self) -> Option<Aabb> {
        self.mesh.transformed_bounds(&self.transform.to_mat4())
    }
}

/// Placement of the whole group in the world
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupTransform {
    pub translation: Vec3,
    pub scale: Vec3,
}

impl GroupTransform {
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, Quat::IDENTITY, self.translation)
    }
}

/// The output of a conversion
#[derive(Debug, Clone)]
pub struct MeshGroup {
    pub meshes: Vec<MeshRecord>,
    /// Aggregate bounds before recentering, `None` for an empty group
    pub bounds: Option<Aabb>,
    pub transform: GroupTransform,
}

impl MeshGroup {
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.mesh.triangle_count()).sum()
    }

    /// Bounds of the group after recentering, scaling and positioning
    pub fn world_bounds(&self) -> Option<Aabb> {
        let bounds = self.bounds?;
        let m = self.transform.to_mat4();
        Aabb::from_points([m.transform_point3(bounds.min), m.transform_point3(bounds.max)])
    }
}

/// Assemble extruded shapes into a recentered, positioned group.
///
/// `parts` must be in document order; the depth stagger is keyed by index.
pub fn compose(parts: Vec<(ShapeSource, Mesh, Material)>, config: &ConvertConfig) -> MeshGroup {
    let meshes: Vec<MeshRecord> = parts
        .into_iter()
        .filter(|(_, mesh, _)| !mesh.is_empty())
        .enumerate()
        .filter_map(|(index, (shape, mesh, material))| {
            let bounds = mesh.bounds()?;
            let mut transform = match shape.use_instance.as_ref().and_then(|u| u.transform) {
                Some(recovered) => LocalTransform::from_recovered(&recovered),
                None => LocalTransform::default(),
            };
            transform.translation.z -= config.stagger_offset(index);
            let metadata = MeshMetadata::describe(&shape, &material);
            Some(MeshRecord {
                mesh,
                material,
                transform,
                bounds,
                metadata,
            })
        })
        .collect();

    let bounds = meshes
        .iter()
        .filter_map(MeshRecord::group_bounds)
        .reduce(|a, b| a.union(&b));

    let mut scale = Vec3::new(config.target_scale.x, config.target_scale.y, 1.0);
    if let (Some(size), Some(b)) = (config.target_size, bounds) {
        let extent = b.size().x.max(b.size().y);
        if extent > f32::EPSILON {
            let fit = size / extent;
            scale.x *= fit;
            scale.y *= fit;
        }
    }
    let center = bounds.map_or(Vec3::ZERO, |b| b.center());
    let transform = GroupTransform {
        translation: config.target_position - scale * center,
        scale,
    };

    MeshGroup {
        meshes,
        bounds,
        transform,
    }
}
