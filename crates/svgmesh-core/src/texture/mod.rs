//! Texture synthesis
//!
//! Gradients become horizontal ramps and masks become grayscale stencils.
//! Both are plain RGBA images wrapped with the sampling state a renderer
//! needs to use them.

mod gradient;
mod mask;

pub use gradient::render_gradient_texture;
pub use mask::render_mask_texture;

use crate::Result;
use glam::Vec2;
use image::RgbaImage;

/// Behaviour outside `[0, 1]` texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

/// A synthesized bitmap plus sampler state
#[derive(Debug, Clone, PartialEq)]
pub struct TextureResource {
    /// Rows stored top-down
    pub image: RgbaImage,
    pub wrap: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub generate_mipmaps: bool,
}

impl TextureResource {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Nearest-texel lookup. `v = 0` is the bottom row.
    pub fn sample(&self, uv: Vec2) -> [u8; 4] {
        let (w, h) = self.image.dimensions();
        let wrap = |t: f32| match self.wrap {
            WrapMode::ClampToEdge => t.clamp(0.0, 1.0),
            WrapMode::Repeat => t.rem_euclid(1.0),
        };
        let x = ((wrap(uv.x) * w as f32) as u32).min(w.saturating_sub(1));
        let y = (((1.0 - wrap(uv.y)) * h as f32) as u32).min(h.saturating_sub(1));
        self.image.get_pixel(x, y).0
    }

    /// Luminance of the sampled texel in `[0, 1]`
    pub fn sample_luminance(&self, uv: Vec2) -> f32 {
        let [r, g, b, _] = self.sample(uv);
        (0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b)) / 255.0
    }

    /// Encode the image as PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// Encode an RGBA image as PNG bytes
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    use image::ImageEncoder;
    use image::codecs::png::PngEncoder;
    use std::io::Cursor;

    let mut bytes = Vec::new();
    let encoder = PngEncoder::new(Cursor::new(&mut bytes));
    encoder.write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// `[0, 1]` float color to 8-bit
pub(crate) fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn two_rows() -> TextureResource {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        TextureResource {
            image,
            wrap: WrapMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            generate_mipmaps: false,
        }
    }

    #[test]
    fn v_axis_starts_at_bottom_row() {
        let tex = two_rows();
        assert_eq!(tex.sample(Vec2::new(0.0, 1.0)), [255, 0, 0, 255]);
        assert_eq!(tex.sample(Vec2::new(0.0, 0.0)), [0, 0, 255, 255]);
        // Clamped
        assert_eq!(tex.sample(Vec2::new(-3.0, 7.0)), [255, 0, 0, 255]);
    }

    #[test]
    fn encodes_png_signature() {
        let png = two_rows().to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
