//! Binary glTF (GLB) export of a mesh group
//!
//! One node per mesh under a root node that carries the group transform.
//! Everything lives in a single binary buffer: vertex streams, indices and
//! PNG images.

use crate::compositor::{MeshGroup, MeshRecord};
use crate::material::{Material, Side};
use crate::texture::{FilterMode, TextureResource, WrapMode, encode_png};
use crate::{Error, Result};
use glam::Quat;
use serde_json::{Value, json};
use std::io::Write;

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Export options for GLB
#[derive(Debug, Clone)]
pub struct GlbOptions {
    /// Edge length of the textures baked for masked materials
    pub baked_texture_size: u32,
}

impl Default for GlbOptions {
    fn default() -> Self {
        Self {
            baked_texture_size: 512,
        }
    }
}

/// Serialize `group` as GLB with default options
pub fn write_glb(group: &MeshGroup, writer: impl Write) -> Result<()> {
    write_glb_with_options(group, writer, &GlbOptions::default())
}

pub fn write_glb_with_options(group: &MeshGroup, mut writer: impl Write, options: &GlbOptions) -> Result<()> {
    let mut builder = GlbBuilder::default();
    let children: Vec<usize> = group
        .meshes
        .iter()
        .map(|record| builder.push_record(record, options))
        .collect::<Result<_>>()?;

    let t = group.transform;
    let mut root = json!({
        "name": "svg",
        "translation": t.translation.to_array(),
        "scale": t.scale.to_array(),
    });
    if !children.is_empty() {
        root["children"] = json!(children);
    }
    builder.nodes.insert(0, root);

    let json = serde_json::to_vec(&builder.document()).map_err(|e| Error::Export(e.to_string()))?;
    write_container(&mut writer, &json, &builder.bin)
}

/// All data needed for GLB export
#[derive(Default)]
struct GlbBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
    images: Vec<Value>,
    samplers: Vec<Value>,
    textures: Vec<Value>,
    materials: Vec<Value>,
    meshes: Vec<Value>,
    /// Root node is inserted at index 0 once all meshes are pushed
    nodes: Vec<Value>,
}

impl GlbBuilder {
    /// Append `bytes` to the binary chunk on a 4-byte boundary
    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        pad_to_four(&mut self.bin, 0);
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.bin.extend_from_slice(bytes);
        self.buffer_views.push(view);
        self.buffer_views.len() - 1
    }

    fn push_accessor(&mut self, bytes: &[u8], component: u32, kind: &str, count: usize, target: u32) -> usize {
        let view = self.push_view(bytes, Some(target));
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": component,
            "count": count,
            "type": kind,
        }));
        self.accessors.len() - 1
    }

    fn push_image(&mut self, png: &[u8], sampler: Value) -> usize {
        let view = self.push_view(png, None);
        self.images.push(json!({ "bufferView": view, "mimeType": "image/png" }));
        self.samplers.push(sampler);
        self.textures.push(json!({
            "source": self.images.len() - 1,
            "sampler": self.samplers.len() - 1,
        }));
        self.textures.len() - 1
    }

    /// Returns the node index of the record; index 0 is reserved for the root
    fn push_record(&mut self, record: &MeshRecord, options: &GlbOptions) -> Result<usize> {
        let mesh = &record.mesh;
        let material = &record.material;
        let count = mesh.vertices.len();

        // Masked materials are baked into one texture addressed by the mask UVs
        let baked = if mesh.has_mask_uvs() {
            material.bake_masked(options.baked_texture_size)
        } else {
            None
        };
        let texture = match (&baked, material.gradient_texture()) {
            (Some(image), _) => {
                let clamp = sampler(WrapMode::ClampToEdge, FilterMode::Linear, FilterMode::Linear);
                Some(self.push_image(&encode_png(image)?, clamp))
            }
            (None, Some(gradient)) => {
                Some(self.push_image(&gradient.to_png()?, texture_sampler(gradient)))
            }
            (None, None) => None,
        };

        // glTF puts the texture origin at the top-left
        let uvs: Vec<[f32; 2]> = if baked.is_some() {
            mesh.mask_uvs.iter().map(|[u, v]| [*u, 1.0 - v]).collect()
        } else {
            mesh.vertices.iter().map(|v| [v.uv[0], 1.0 - v.uv[1]]).collect()
        };
        let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.position).collect();
        let normals: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.normal).collect();

        let position = self.push_accessor(bytemuck::cast_slice(&positions), FLOAT, "VEC3", count, ARRAY_BUFFER);
        self.accessors[position]["min"] = json!(record.bounds.min.to_array());
        self.accessors[position]["max"] = json!(record.bounds.max.to_array());
        let normal = self.push_accessor(bytemuck::cast_slice(&normals), FLOAT, "VEC3", count, ARRAY_BUFFER);
        let texcoord = self.push_accessor(bytemuck::cast_slice(&uvs), FLOAT, "VEC2", count, ARRAY_BUFFER);
        let indices = self.push_accessor(
            bytemuck::cast_slice(&mesh.indices),
            UNSIGNED_INT,
            "SCALAR",
            mesh.indices.len(),
            ELEMENT_ARRAY_BUFFER,
        );

        self.materials.push(material_json(material, texture, baked.is_some()));
        self.meshes.push(json!({
            "primitives": [{
                "attributes": { "POSITION": position, "NORMAL": normal, "TEXCOORD_0": texcoord },
                "indices": indices,
                "material": self.materials.len() - 1,
            }],
        }));

        let extras = serde_json::to_value(&record.metadata).map_err(|e| Error::Export(e.to_string()))?;
        let t = record.transform;
        self.nodes.push(json!({
            "name": record.metadata.source,
            "mesh": self.meshes.len() - 1,
            "translation": t.translation.to_array(),
            "rotation": Quat::from_rotation_z(t.rotation).to_array(),
            "scale": t.scale.to_array(),
            "extras": extras,
        }));
        // Shifted by one for the root node
        Ok(self.nodes.len())
    }

    /// glTF arrays must not be empty, so unused ones are left out
    fn document(&self) -> Value {
        let mut doc = json!({
            "asset": { "version": "2.0", "generator": "svgmesh" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": self.nodes,
        });
        if !self.bin.is_empty() {
            doc["buffers"] = json!([{ "byteLength": self.bin.len() }]);
        }
        for (key, items) in [
            ("bufferViews", &self.buffer_views),
            ("accessors", &self.accessors),
            ("images", &self.images),
            ("samplers", &self.samplers),
            ("textures", &self.textures),
            ("materials", &self.materials),
            ("meshes", &self.meshes),
        ] {
            if !items.is_empty() {
                doc[key] = json!(items);
            }
        }
        doc
    }
}

fn material_json(material: &Material, texture: Option<usize>, baked: bool) -> Value {
    let base_color = if baked {
        [1.0, 1.0, 1.0, material.opacity]
    } else {
        material.base_color_factor()
    };
    let mut pbr = json!({
        "baseColorFactor": base_color,
        "metallicFactor": material.metalness,
        "roughnessFactor": material.roughness,
    });
    if let Some(index) = texture {
        pbr["baseColorTexture"] = json!({ "index": index });
    }
    json!({
        "pbrMetallicRoughness": pbr,
        "doubleSided": material.side == Side::Double,
        "alphaMode": if material.transparent { "BLEND" } else { "OPAQUE" },
        "extras": { "envMapIntensity": material.env_map_intensity },
    })
}

fn texture_sampler(texture: &TextureResource) -> Value {
    let min = if texture.generate_mipmaps {
        texture.min_filter
    } else {
        FilterMode::Linear
    };
    sampler(texture.wrap, texture.mag_filter, min)
}

fn sampler(wrap: WrapMode, mag: FilterMode, min: FilterMode) -> Value {
    let wrap = match wrap {
        WrapMode::ClampToEdge => 33071,
        WrapMode::Repeat => 10497,
    };
    let filter = |f: FilterMode| match f {
        FilterMode::Nearest => 9728,
        FilterMode::Linear => 9729,
        FilterMode::LinearMipmapLinear => 9987,
    };
    json!({
        "magFilter": filter(match mag {
            // Magnification has no mipmap variant
            FilterMode::LinearMipmapLinear => FilterMode::Linear,
            other => other,
        }),
        "minFilter": filter(min),
        "wrapS": wrap,
        "wrapT": wrap,
    })
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    let padding = (4 - bytes.len() % 4) % 4;
    bytes.extend(std::iter::repeat_n(fill, padding));
}

fn write_container(writer: &mut impl Write, json: &[u8], bin: &[u8]) -> Result<()> {
    let mut json = json.to_vec();
    pad_to_four(&mut json, 0x20);
    let mut bin = bin.to_vec();
    pad_to_four(&mut bin, 0);

    let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total_size = 12  // GLB header
        + 8 + json.len()  // JSON chunk
        + bin_chunk;
    let total_size = u32::try_from(total_size)
        .map_err(|_| Error::Export(format!("GLB too large ({total_size} bytes)")))?;

    // GLB header
    writer.write_all(b"glTF")?;
    writer.write_all(&2u32.to_le_bytes())?;
    writer.write_all(&total_size.to_le_bytes())?;

    // JSON chunk
    writer.write_all(&(json.len() as u32).to_le_bytes())?;
    writer.write_all(&0x4E4F_534A_u32.to_le_bytes())?; // "JSON"
    writer.write_all(&json)?;

    // BIN chunk, omitted when there is no binary data
    if !bin.is_empty() {
        writer.write_all(&(bin.len() as u32).to_le_bytes())?;
        writer.write_all(&0x004E_4942_u32.to_le_bytes())?; // "BIN\0"
        writer.write_all(&bin)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use crate::pipeline::svg_to_mesh;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    /// Split a GLB into its JSON document and binary chunk
    fn parse(bytes: &[u8]) -> (Value, Vec<u8>) {
        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(read_u32(bytes, 4), 2);
        assert_eq!(read_u32(bytes, 8) as usize, bytes.len());
        let json_len = read_u32(bytes, 12) as usize;
        assert_eq!(json_len % 4, 0);
        let json: Value = serde_json::from_slice(&bytes[20..20 + json_len]).unwrap();
        let bin_start = 20 + json_len;
        if bin_start == bytes.len() {
            return (json, Vec::new());
        }
        let bin_len = read_u32(bytes, bin_start) as usize;
        assert_eq!(read_u32(bytes, bin_start + 4), 0x004E_4942);
        (json, bytes[bin_start + 8..bin_start + 8 + bin_len].to_vec())
    }

    fn export(svg: &str) -> (Value, Vec<u8>) {
        let config = ConvertConfig::default()
            .with_gradient_resolution(8)
            .with_mask_resolution(8);
        let conversion = svg_to_mesh(svg, &config).unwrap();
        let mut bytes = Vec::new();
        write_glb_with_options(&conversion.group, &mut bytes, &GlbOptions { baked_texture_size: 8 }).unwrap();
        parse(&bytes)
    }

    #[test]
    fn flat_shapes_export_without_textures() {
        let (json, bin) = export(
            r##"<svg><rect width="10" height="10" fill="#f00"/><rect x="20" width="5" height="5"/></svg>"##,
        );
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(json["nodes"][0]["children"], json!([1, 2]));
        assert_eq!(json["meshes"].as_array().unwrap().len(), 2);
        assert!(json.get("images").is_none());
        assert_eq!(json["materials"][0]["alphaMode"], "OPAQUE");
        assert_eq!(json["materials"][0]["pbrMetallicRoughness"]["baseColorFactor"][0], 1.0);
        assert_eq!(json["buffers"][0]["byteLength"].as_u64().unwrap() as usize, bin.len());

        let position = &json["accessors"][0];
        assert_eq!(position["type"], "VEC3");
        assert_eq!(position["max"], json!([10.0, 10.0, 50.0]));
    }

    #[test]
    fn gradient_and_mask_embed_images() {
        let (json, _) = export(
            r##"<svg>
              <defs>
                <linearGradient id="g"><stop offset="0" stop-color="#000"/><stop offset="1" stop-color="#fff"/></linearGradient>
                <mask id="m" maskContentUnits="objectBoundingBox"><rect width="0.5" height="1" fill="#fff"/></mask>
              </defs>
              <rect width="10" height="10" fill="url(#g)"/>
              <rect x="20" width="10" height="10" fill="#00f" mask="url(#m)"/>
            </svg>"##,
        );
        assert_eq!(json["images"].as_array().unwrap().len(), 2);
        assert_eq!(json["images"][0]["mimeType"], "image/png");

        let gradient = &json["materials"][0];
        assert_eq!(gradient["alphaMode"], "OPAQUE");
        assert_eq!(gradient["pbrMetallicRoughness"]["baseColorTexture"]["index"], 0);
        assert_eq!(json["samplers"][0]["minFilter"], 9987);
        assert_eq!(json["samplers"][0]["wrapS"], 33071);

        let masked = &json["materials"][1];
        assert_eq!(masked["alphaMode"], "BLEND");
        assert_eq!(masked["pbrMetallicRoughness"]["baseColorTexture"]["index"], 1);
        assert_eq!(json["nodes"][2]["extras"]["has_mask"], true);
    }

    #[test]
    fn empty_group_is_still_valid() {
        let (json, bin) = export("<svg/>");
        assert!(json["nodes"][0].get("children").is_none());
        assert!(bin.is_empty());
        for key in ["buffers", "bufferViews", "accessors", "materials", "meshes", "images"] {
            assert!(json.get(key).is_none(), "{key} should be omitted");
        }
        assert_eq!(json["scenes"][0]["nodes"], json!([0]));
    }
}
