//! # svgmesh core
//!
//! Turn SVG artwork into extruded, textured 3D meshes.
//!
//! `<use>` references are expanded into concrete copies, linear gradients
//! and masks become textures, every filled shape is extruded, and the result
//! is a recentered [`MeshGroup`] ready to render or export.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use svgmesh_core::prelude::*;
//!
//! let config = ConvertConfig::default()
//!     .with_extrusion_depth(4.0)
//!     .with_target_size(Some(1.0));
//! let conversion = svg_to_mesh(&svg_text, &config)?;
//! for warning in &conversion.diagnostics {
//!     eprintln!("warning: {warning}");
//! }
//! write_glb(&conversion.group, std::fs::File::create("logo.glb")?)?;
//! ```
//!
//! ## Units and Conventions
//!
//! - **Geometry**: SVG user units, x to the right and y down
//! - **Extrusion**: along +z, from `z = 0` to `z = extrusion_depth`
//! - **Angles**: radians everywhere except inside SVG `transform` attributes
//! - **Texture coordinates**: origin bottom-left; raster rows stored top-down

pub mod compositor;
pub mod config;
pub mod defs;
pub mod diagnostics;
pub mod document;
pub mod export;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod preprocess;
pub mod shapes;
pub mod style;
pub mod texture;
pub mod transform;
pub mod uv;

mod error;

pub use compositor::{MeshGroup, MeshRecord};
pub use config::ConvertConfig;
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use error::{Error, Result};
pub use pipeline::{Conversion, Summary, svg_to_mesh};

/// Prelude module for convenient imports
pub mod prelude {
    // Conversion
    pub use crate::config::ConvertConfig;
    pub use crate::pipeline::{Conversion, Summary, svg_to_mesh};

    // Output
    pub use crate::compositor::{LocalTransform, MeshGroup, MeshMetadata, MeshRecord};
    pub use crate::material::{Material, MaterialChannel, Side};
    pub use crate::mesh::{Aabb, Mesh, Vertex};
    pub use crate::texture::TextureResource;

    // Diagnostics
    pub use crate::diagnostics::{Diagnostics, Warning, WarningKind};

    // Export
    pub use crate::export::{GlbOptions, write_glb};

    // Math (re-export glam)
    pub use glam::{Mat4, Vec2, Vec3};

    // Error handling
    pub use crate::{Error, Result};
}
