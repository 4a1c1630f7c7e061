//! Conversion entry point
//!
//! Stages run strictly in order. Per-shape work inside a stage runs in
//! parallel and only reads caches that are complete before the stage starts.

use crate::compositor::{MeshGroup, compose};
use crate::config::ConvertConfig;
use crate::defs::{parse_gradients, parse_masks};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::document::Document;
use crate::material::{TextureCache, assemble_material};
use crate::mesh::{Aabb, Mesh, extrude_outline, outlines_from_path};
use crate::preprocess::expand_uses;
use crate::shapes::extract_shapes;
use crate::texture::{render_gradient_texture, render_mask_texture};
use crate::uv::{apply_gradient_uvs, apply_mask_uvs};
use crate::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub group: MeshGroup,
    pub diagnostics: Diagnostics,
    /// The document after `<use>` expansion
    pub document: Document,
    masks_enabled: bool,
    use_expansion_enabled: bool,
}

/// Counts describing a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub meshes: usize,
    pub triangles: usize,
    pub gradients_used: usize,
    pub masks_used: usize,
    pub use_instances: usize,
    pub reference_warnings: usize,
    pub depth_limit_warnings: usize,
    pub masks_enabled: bool,
    pub use_expansion_enabled: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "meshes:          {}", self.meshes)?;
        writeln!(f, "triangles:       {}", self.triangles)?;
        writeln!(f, "gradients used:  {}", self.gradients_used)?;
        writeln!(f, "masks used:      {}", self.masks_used)?;
        writeln!(f, "use instances:   {}", self.use_instances)?;
        writeln!(
            f,
            "warnings:        {} reference, {} depth limit",
            self.reference_warnings, self.depth_limit_warnings
        )?;
        write!(
            f,
            "masks {}, use expansion {}",
            on_off(self.masks_enabled),
            on_off(self.use_expansion_enabled)
        )
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

impl Conversion {
    pub fn summary(&self) -> Summary {
        let meshes = &self.group.meshes;
        let distinct = |ids: BTreeSet<&str>| ids.len();
        Summary {
            meshes: meshes.len(),
            triangles: self.group.triangle_count(),
            gradients_used: distinct(
                meshes
                    .iter()
                    .filter_map(|m| m.metadata.gradient_id.as_deref())
                    .collect(),
            ),
            masks_used: distinct(
                meshes
                    .iter()
                    .filter_map(|m| m.metadata.mask_id.as_deref())
                    .collect(),
            ),
            use_instances: meshes.iter().filter(|m| m.metadata.is_use_instance).count(),
            reference_warnings: self.diagnostics.count(WarningKind::Reference),
            depth_limit_warnings: self.diagnostics.count(WarningKind::DepthLimit),
            masks_enabled: self.masks_enabled,
            use_expansion_enabled: self.use_expansion_enabled,
        }
    }
}

/// Convert SVG markup into an extruded, textured mesh group.
///
/// Malformed markup, rejected configuration and outlines that cannot be
/// extruded abort the call. Unresolvable references are reported in
/// [`Conversion::diagnostics`] and skipped.
pub fn svg_to_mesh(svg: &str, config: &ConvertConfig) -> Result<Conversion> {
    config.validate()?;
    let mut diagnostics = Diagnostics::new();

    // === Stage 1: parse and expand references ===
    let parsed = Document::parse(svg)?;
    let document = if config.enable_use_expansion {
        expand_uses(&parsed, config.max_use_depth, &mut diagnostics)
    } else {
        parsed
    };

    // === Stage 2: definitions and shapes ===
    let gradients = parse_gradients(&document);
    let masks = if config.enable_masks {
        parse_masks(&document, &mut diagnostics)
    } else {
        BTreeMap::new()
    };
    debug!(gradients = gradients.len(), masks = masks.len(), "parsed definitions");
    let shapes = extract_shapes(&document, config, &gradients, &masks, &mut diagnostics)?;

    // === Stage 3: gradient textures, once per referenced definition ===
    let referenced: BTreeSet<&str> = shapes.iter().filter_map(|s| s.gradient_id()).collect();
    let gradient_textures = referenced
        .into_par_iter()
        .filter_map(|id| gradients.get(id))
        .map(|def| {
            let mut def = def.clone();
            let texture = render_gradient_texture(&mut def, config.gradient_texture_resolution)?;
            debug!(id = %def.id, stops = def.stops.len(), "rendered gradient texture");
            Ok((def.id.clone(), (Arc::new(texture), def.axis())))
        })
        .collect::<Result<HashMap<_, _>>>()?;

    // === Stage 4: geometry ===
    let tolerance = f64::from(config.curve_tolerance);
    let meshes = shapes
        .par_iter()
        .map(|shape| {
            let mut mesh = Mesh::new();
            for outline in outlines_from_path(&shape.path, tolerance)? {
                mesh.append(extrude_outline(&outline, config.extrusion_depth)?);
            }
            Ok(mesh)
        })
        .collect::<Result<Vec<_>>>()?;
    let bounds: Vec<Option<Aabb>> = meshes.iter().map(Mesh::bounds).collect();

    // === Stage 5: mask textures over the union of their users ===
    let mut mask_bounds: BTreeMap<&str, Aabb> = BTreeMap::new();
    for (shape, b) in shapes.iter().zip(&bounds) {
        if let (Some(id), Some(b)) = (shape.mask_id.as_deref(), b) {
            mask_bounds
                .entry(id)
                .and_modify(|u| *u = u.union(b))
                .or_insert(*b);
        }
    }
    let mask_textures = mask_bounds
        .into_par_iter()
        .filter_map(|(id, target)| masks.get(id).map(|def| (def, target)))
        .map(|(def, target)| {
            let texture = render_mask_texture(def, &target, config.mask_texture_resolution)?;
            debug!(id = %def.id, shapes = def.shapes.len(), "rendered mask texture");
            Ok((def.id.clone(), Arc::new(texture)))
        })
        .collect::<Result<HashMap<_, _>>>()?;
    let cache = TextureCache {
        gradients: gradient_textures,
        masks: mask_textures,
    };

    // === Stage 6: texture coordinates and materials ===
    let parts: Vec<_> = shapes
        .into_par_iter()
        .zip(meshes)
        .zip(bounds)
        .map(|((shape, mut mesh), bounds)| {
            if let Some(b) = bounds {
                if let Some(def) = shape
                    .gradient_id()
                    .filter(|id| cache.gradients.contains_key(*id))
                    .and_then(|id| gradients.get(id))
                {
                    apply_gradient_uvs(&mut mesh, def, &b);
                }
                if shape.mask_id.as_ref().is_some_and(|id| cache.masks.contains_key(id)) {
                    apply_mask_uvs(&mut mesh, &b);
                }
            }
            let material = assemble_material(&shape, config, &cache);
            (shape, mesh, material)
        })
        .collect();

    // === Stage 7: compose ===
    let group = compose(parts, config);

    let conversion = Conversion {
        group,
        diagnostics,
        document,
        masks_enabled: config.enable_masks,
        use_expansion_enabled: config.enable_use_expansion,
    };
    let summary = conversion.summary();
    info!(
        meshes = summary.meshes,
        triangles = summary.triangles,
        gradients = summary.gradients_used,
        masks = summary.masks_used,
        use_instances = summary.use_instances,
        warnings = conversion.diagnostics.len(),
        masks_enabled = summary.masks_enabled,
        use_expansion = summary.use_expansion_enabled,
        "conversion complete"
    );
    Ok(conversion)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn rejects_invalid_config_before_parsing() {
        let config = ConvertConfig::default().with_gradient_resolution(0);
        assert!(matches!(
            svg_to_mesh("not xml", &config),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_document_gives_empty_group() {
        let conversion = svg_to_mesh("<svg/>", &ConvertConfig::default()).unwrap();
        assert!(conversion.group.is_empty());
        assert!(conversion.diagnostics.is_empty());
        let summary = conversion.summary();
        assert_eq!(summary.meshes, 0);
        assert!(summary.masks_enabled && summary.use_expansion_enabled);
    }

    #[test]
    fn summary_counts_distinct_definitions() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg">
            <defs>
              <linearGradient id="g"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient>
              <mask id="m"><rect width="1" height="1" fill="white"/></mask>
            </defs>
            <rect width="10" height="10" fill="url(#g)"/>
            <rect x="20" width="10" height="10" fill="url(#g)" mask="url(#m)"/>
            <rect x="40" width="10" height="10" fill="url(#missing)"/>
        </svg>"##;
        let config = ConvertConfig::default()
            .with_gradient_resolution(16)
            .with_mask_resolution(16);
        let conversion = svg_to_mesh(svg, &config).unwrap();
        let summary = conversion.summary();
        assert_eq!(summary.meshes, 3);
        assert_eq!(summary.gradients_used, 1);
        assert_eq!(summary.masks_used, 1);
        assert_eq!(summary.reference_warnings, 1);
        assert!(summary.to_string().contains("meshes:          3"));
    }
}
