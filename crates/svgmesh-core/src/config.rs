//! Conversion configuration
//!
//! A [`ConvertConfig`] is built once per call and handed by reference to every
//! stage of the pipeline. Nothing reads tunables from anywhere else.

use crate::{Error, Result};
use glam::Vec3;
use serde::Deserialize;

/// Largest texture edge accepted for synthesized textures
pub const MAX_TEXTURE_RESOLUTION: u32 = 8192;

/// Options recognised by [`crate::svg_to_mesh`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertConfig {
    /// Extrusion distance along +z, in SVG user units
    pub extrusion_depth: f32,
    /// Fallback RGBA color for shapes whose fill cannot be resolved
    pub base_color: [f32; 4],
    /// World position of the recentered group
    pub target_position: Vec3,
    /// Group scale; only x and y are used, the depth axis stays at 1
    pub target_scale: Vec3,
    /// When set, x/y scale is multiplied so the larger side of the group
    /// measures this many world units
    pub target_size: Option<f32>,
    /// Maximum nesting depth for `<use>` expansion
    pub max_use_depth: usize,
    /// Expand `<use>` references before extracting shapes
    pub enable_use_expansion: bool,
    /// Put recovered `<use>` transforms on the mesh instead of the geometry
    pub inherit_transforms: bool,
    /// Parse and apply `<mask>` definitions
    pub enable_masks: bool,
    /// Edge length of gradient textures in pixels
    pub gradient_texture_resolution: u32,
    /// Edge length of mask textures in pixels
    pub mask_texture_resolution: u32,
    /// Overall opacity of masked materials
    pub mask_opacity: f32,
    /// Render both faces of every triangle
    pub double_sided: bool,
    /// Recolor flat-colored use-instances by expansion depth
    pub debug_use_colors: bool,
    /// Push each successive mesh slightly back along z
    pub depth_stagger: bool,
    /// Stagger for mesh `i` is `i / divisor²`
    pub depth_stagger_divisor: f32,
    /// Metalness of gradient-textured materials
    pub metalness: f32,
    /// Roughness of gradient-textured materials
    pub roughness: f32,
    /// Environment map intensity of gradient-textured materials
    pub env_map_intensity: f32,
    /// Maximum distance between a curve and its flattened polyline
    pub curve_tolerance: f32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            extrusion_depth: 50.0,
            base_color: [1.0, 1.0, 1.0, 1.0],
            target_position: Vec3::ZERO,
            target_scale: Vec3::ONE,
            target_size: None,
            max_use_depth: 5,
            enable_use_expansion: true,
            inherit_transforms: true,
            enable_masks: true,
            gradient_texture_resolution: 1024,
            mask_texture_resolution: 512,
            mask_opacity: 1.0,
            double_sided: false,
            debug_use_colors: false,
            depth_stagger: true,
            depth_stagger_divisor: 2.0,
            metalness: 0.1,
            roughness: 0.3,
            env_map_intensity: 0.2,
            curve_tolerance: 0.1,
        }
    }
}

impl ConvertConfig {
    pub fn with_extrusion_depth(mut self, depth: f32) -> Self {
        self.extrusion_depth = depth;
        self
    }

    pub fn with_base_color(mut self, color: [f32; 4]) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_target_position(mut self, position: Vec3) -> Self {
        self.target_position = position;
        self
    }

    pub fn with_target_scale(mut self, scale: Vec3) -> Self {
        self.target_scale = scale;
        self
    }

    pub fn with_target_size(mut self, size: Option<f32>) -> Self {
        self.target_size = size;
        self
    }

    pub fn with_max_use_depth(mut self, depth: usize) -> Self {
        self.max_use_depth = depth;
        self
    }

    pub fn with_use_expansion(mut self, enabled: bool) -> Self {
        self.enable_use_expansion = enabled;
        self
    }

    pub fn with_inherit_transforms(mut self, enabled: bool) -> Self {
        self.inherit_transforms = enabled;
        self
    }

    pub fn with_masks(mut self, enabled: bool) -> Self {
        self.enable_masks = enabled;
        self
    }

    pub fn with_gradient_resolution(mut self, resolution: u32) -> Self {
        self.gradient_texture_resolution = resolution;
        self
    }

    pub fn with_mask_resolution(mut self, resolution: u32) -> Self {
        self.mask_texture_resolution = resolution;
        self
    }

    pub fn with_mask_opacity(mut self, opacity: f32) -> Self {
        self.mask_opacity = opacity;
        self
    }

    pub fn with_double_sided(mut self, enabled: bool) -> Self {
        self.double_sided = enabled;
        self
    }

    pub fn with_debug_use_colors(mut self, enabled: bool) -> Self {
        self.debug_use_colors = enabled;
        self
    }

    pub fn with_depth_stagger(mut self, enabled: bool) -> Self {
        self.depth_stagger = enabled;
        self
    }

    pub fn with_depth_stagger_divisor(mut self, divisor: f32) -> Self {
        self.depth_stagger_divisor = divisor;
        self
    }

    pub fn with_curve_tolerance(mut self, tolerance: f32) -> Self {
        self.curve_tolerance = tolerance;
        self
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.extrusion_depth.is_finite() || self.extrusion_depth < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "extrusionDepth must be a finite, non-negative number (got {})",
                self.extrusion_depth
            )));
        }
        for (name, res) in [
            ("gradientTextureResolution", self.gradient_texture_resolution),
            ("maskTextureResolution", self.mask_texture_resolution),
        ] {
            if res == 0 || res > MAX_TEXTURE_RESOLUTION {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be between 1 and {MAX_TEXTURE_RESOLUTION} (got {res})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.mask_opacity) {
            return Err(Error::InvalidParameter(format!(
                "maskOpacity must be within [0, 1] (got {})",
                self.mask_opacity
            )));
        }
        if self.depth_stagger && !is_positive(self.depth_stagger_divisor) {
            return Err(Error::InvalidParameter(format!(
                "depthStaggerDivisor must be positive (got {})",
                self.depth_stagger_divisor
            )));
        }
        if !is_positive(self.curve_tolerance) {
            return Err(Error::InvalidParameter(format!(
                "curveTolerance must be positive (got {})",
                self.curve_tolerance
            )));
        }
        if let Some(size) = self.target_size {
            if !is_positive(size) {
                return Err(Error::InvalidParameter(format!(
                    "targetSize must be positive (got {size})"
                )));
            }
        }
        if !self.target_position.is_finite() || !self.target_scale.is_finite() {
            return Err(Error::InvalidParameter(
                "targetPosition and targetScale must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Stagger offset along z for the mesh at `index`
    pub fn stagger_offset(&self, index: usize) -> f32 {
        if self.depth_stagger {
            index as f32 / (self.depth_stagger_divisor * self.depth_stagger_divisor)
        } else {
            0.0
        }
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_are_valid() {
        let config = ConvertConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.extrusion_depth, 50.0);
        assert_eq!(config.max_use_depth, 5);
        assert_eq!(config.gradient_texture_resolution, 1024);
        assert_eq!(config.mask_texture_resolution, 512);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(ConvertConfig::default().with_mask_resolution(0).validate().is_err());
        assert!(ConvertConfig::default().with_mask_opacity(1.5).validate().is_err());
        assert!(ConvertConfig::default().with_extrusion_depth(-1.0).validate().is_err());
        assert!(
            ConvertConfig::default()
                .with_depth_stagger_divisor(0.0)
                .validate()
                .is_err()
        );
        // A zero divisor is fine while stagger is off
        assert!(
            ConvertConfig::default()
                .with_depth_stagger(false)
                .with_depth_stagger_divisor(0.0)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let config: ConvertConfig = serde_json::from_str(
            r#"{ "extrusionDepth": 2.0, "maxUseDepth": 3, "targetScale": [0.05, 0.05, 0.05] }"#,
        )
        .unwrap();
        assert_relative_eq!(config.extrusion_depth, 2.0);
        assert_eq!(config.max_use_depth, 3);
        assert_relative_eq!(config.target_scale.x, 0.05);
        assert!(config.enable_masks);
    }

    #[test]
    fn stagger_offset_uses_squared_divisor() {
        let config = ConvertConfig::default().with_depth_stagger_divisor(4.0);
        assert_relative_eq!(config.stagger_offset(8), 0.5);
        let off = config.with_depth_stagger(false);
        assert_relative_eq!(off.stagger_offset(8), 0.0);
    }
}
