//! Materials for extruded shapes
//!
//! A shape gets a gradient-textured material when its fill resolves to a
//! parsed gradient, a flat color otherwise. A resolved mask turns either into
//! a transparent material whose alpha is driven by the mask texture.

use crate::config::ConvertConfig;
use crate::defs::GradientAxis;
use crate::shapes::{Fill, ShapeSource};
use crate::style::hsl_to_rgb;
use crate::texture::{TextureResource, to_u8};
use glam::Vec2;
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::Arc;

/// Which faces of a triangle are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Double,
}

/// A base color channel: constant or textured
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialChannel {
    Color([f32; 4]),
    /// Gradient ramp sampled with [`crate::mesh::Vertex::uv`]
    Gradient {
        texture: Arc<TextureResource>,
        axis: GradientAxis,
    },
}

impl MaterialChannel {
    /// Color at a point given in normalized bounding-box space
    pub fn sample_normalized(&self, point: Vec2) -> [f32; 4] {
        match self {
            Self::Color(c) => *c,
            Self::Gradient { texture, axis } => {
                let t = axis.parameter(point);
                texture
                    .sample(Vec2::new(t, 0.5))
                    .map(|c| f32::from(c) / 255.0)
            }
        }
    }
}

/// A standard PBR material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub albedo: MaterialChannel,
    pub metalness: f32,
    pub roughness: f32,
    pub env_map_intensity: f32,
    pub side: Side,
    /// Mask stencil sampled with [`crate::mesh::Mesh::mask_uvs`]
    pub alpha_map: Option<Arc<TextureResource>>,
    pub transparent: bool,
    pub opacity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: MaterialChannel::Color([1.0, 1.0, 1.0, 1.0]),
            metalness: 0.0,
            roughness: 0.5,
            env_map_intensity: 1.0,
            side: Side::Front,
            alpha_map: None,
            transparent: false,
            opacity: 1.0,
        }
    }
}

impl Material {
    /// Flat-colored material
    pub fn color(rgba: [f32; 4]) -> Self {
        let mut material = Self {
            albedo: MaterialChannel::Color([rgba[0], rgba[1], rgba[2], 1.0]),
            ..Self::default()
        };
        if rgba[3] < 1.0 {
            material.transparent = true;
            material.opacity = rgba[3].clamp(0.0, 1.0);
        }
        material
    }

    /// Gradient-textured material
    pub fn gradient(texture: Arc<TextureResource>, axis: GradientAxis) -> Self {
        Self {
            albedo: MaterialChannel::Gradient { texture, axis },
            ..Self::default()
        }
    }

    pub fn metalness(mut self, value: f32) -> Self {
        self.metalness = value;
        self
    }

    pub fn roughness(mut self, value: f32) -> Self {
        self.roughness = value;
        self
    }

    pub fn env_map_intensity(mut self, value: f32) -> Self {
        self.env_map_intensity = value;
        self
    }

    pub fn side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Scale overall opacity, turning on blending below 1
    pub fn faded(mut self, alpha: f32) -> Self {
        if alpha < 1.0 {
            self.transparent = true;
            self.opacity *= alpha.clamp(0.0, 1.0);
        }
        self
    }

    /// Drive alpha with a mask texture and scale overall opacity
    pub fn masked(mut self, mask: Arc<TextureResource>, opacity: f32) -> Self {
        self.alpha_map = Some(mask);
        self.transparent = true;
        self.opacity *= opacity;
        self
    }

    pub fn has_gradient(&self) -> bool {
        matches!(self.albedo, MaterialChannel::Gradient { .. })
    }

    pub fn gradient_texture(&self) -> Option<&Arc<TextureResource>> {
        match &self.albedo {
            MaterialChannel::Gradient { texture, .. } => Some(texture),
            MaterialChannel::Color(_) => None,
        }
    }

    /// Get base color factor (white for textured materials)
    pub fn base_color_factor(&self) -> [f32; 4] {
        let rgb = match &self.albedo {
            MaterialChannel::Color(c) => [c[0], c[1], c[2]],
            MaterialChannel::Gradient { .. } => [1.0, 1.0, 1.0],
        };
        [rgb[0], rgb[1], rgb[2], self.opacity]
    }

    /// Combine the albedo and the alpha map into one RGBA image laid out in
    /// mask UV space. `None` when the material is not masked.
    pub fn bake_masked(&self, size: u32) -> Option<RgbaImage> {
        let mask = self.alpha_map.as_ref()?;
        let extent = size.max(1) as f32;
        Some(RgbaImage::from_fn(size, size, |x, y| {
            // Row 0 is the top of the bounding box
            let uv = Vec2::new((x as f32 + 0.5) / extent, 1.0 - (y as f32 + 0.5) / extent);
            let normalized = Vec2::new(uv.x, 1.0 - uv.y);
            let [r, g, b, a] = self.albedo.sample_normalized(normalized);
            let coverage = mask.sample_luminance(uv);
            Rgba([to_u8(r), to_u8(g), to_u8(b), to_u8(a * coverage)])
        }))
    }
}

/// Textures built for one conversion, keyed by definition id
#[derive(Debug, Clone, Default)]
pub struct TextureCache {
    pub gradients: HashMap<String, (Arc<TextureResource>, GradientAxis)>,
    pub masks: HashMap<String, Arc<TextureResource>>,
}

/// Build the material for a shape from its fill, use-instance metadata and
/// the already synthesized textures
pub fn assemble_material(shape: &ShapeSource, config: &ConvertConfig, cache: &TextureCache) -> Material {
    let side = if config.double_sided {
        Side::Double
    } else {
        Side::Front
    };

    let gradient = match &shape.fill {
        Fill::Gradient { id, alpha } => cache.gradients.get(id).map(|entry| (entry, *alpha)),
        Fill::Color(_) => None,
    };
    let material = if let Some(((texture, axis), alpha)) = gradient {
        Material::gradient(Arc::clone(texture), *axis)
            .metalness(config.metalness)
            .roughness(config.roughness)
            .env_map_intensity(config.env_map_intensity)
            .faded(alpha)
    } else {
        let mut rgba = match shape.fill {
            Fill::Color(c) => c,
            Fill::Gradient { alpha, .. } => {
                let [r, g, b, a] = config.base_color;
                [r, g, b, a * alpha]
            }
        };
        if config.debug_use_colors {
            if let Some(instance) = &shape.use_instance {
                let hue = (instance.depth * 60 % 360) as f32 / 360.0;
                let [r, g, b] = hsl_to_rgb(hue, 0.7, 0.5);
                rgba = [r, g, b, rgba[3]];
            }
        }
        Material::color(rgba)
    };
    let material = material.side(side);

    match shape.mask_id.as_ref().and_then(|id| cache.masks.get(id)) {
        Some(mask) => material.masked(Arc::clone(mask), config.mask_opacity),
        None => material,
    }
}
