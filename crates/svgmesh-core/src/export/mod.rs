//! Export of converted mesh groups

mod gltf_export;

pub use gltf_export::{GlbOptions, write_glb, write_glb_with_options};
