use super::{FilterMode, TextureResource, WrapMode, to_u8};
use crate::defs::{GradientAxis, GradientDefinition};
use crate::{Error, Result};
use image::{Rgba, RgbaImage};
use tracing::debug;

/// Rasterize a gradient into a square ramp texture.
///
/// Column `c` holds the color at gradient parameter `c / (resolution - 1)`,
/// every row is identical. The gradient's axis in normalized bounding-box
/// space is recorded on `def` for UV generation.
pub fn render_gradient_texture(def: &mut GradientDefinition, resolution: u32) -> Result<TextureResource> {
    if resolution == 0 {
        return Err(Error::InvalidParameter(
            "gradient texture resolution must be positive".into(),
        ));
    }
    let axis = GradientAxis::between(def.start, def.end);
    def.axis = Some(axis);

    let last = resolution.saturating_sub(1).max(1) as f32;
    let column: Vec<Rgba<u8>> = (0..resolution)
        .map(|x| {
            let [r, g, b, a] = def.color_at(x as f32 / last);
            Rgba([to_u8(r), to_u8(g), to_u8(b), to_u8(a)])
        })
        .collect();
    let image = RgbaImage::from_fn(resolution, resolution, |x, _| column[x as usize]);

    debug!(
        id = %def.id,
        resolution,
        length = axis.length,
        direction = ?axis.direction,
        "rendered gradient texture"
    );

    Ok(TextureResource {
        image,
        wrap: WrapMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::LinearMipmapLinear,
        generate_mipmaps: true,
    })
}
