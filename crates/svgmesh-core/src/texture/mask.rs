use super::{FilterMode, TextureResource, WrapMode};
use crate::defs::{MaskDefinition, MaskGeometry, MaskShape, MaskUnits, Region};
use crate::mesh::Aabb;
use crate::{Error, Result};
use image::RgbaImage;
use kurbo::{Affine, BezPath, PathEl};
use tiny_skia::{Color, FillRule, Mask, Paint, PathBuilder, Pixmap, Rect, Transform};
use tracing::debug;

/// Rasterize a mask into a square grayscale stencil.
///
/// Luminance encodes visibility: white is fully visible, black fully masked.
/// `target_bounds` is the union of the bounds of every shape using the mask;
/// the texture covers exactly that box.
pub fn render_mask_texture(
    def: &MaskDefinition,
    target_bounds: &Aabb,
    resolution: u32,
) -> Result<TextureResource> {
    let mut pixmap = Pixmap::new(resolution, resolution).ok_or_else(|| {
        Error::InvalidParameter(format!("invalid mask texture resolution {resolution}"))
    })?;
    pixmap.fill(Color::BLACK);

    let res = f64::from(resolution);
    let object_space = Affine::scale(res);
    let size = target_bounds.size();
    let (w, h) = (f64::from(size.x).max(1e-6), f64::from(size.y).max(1e-6));
    let user_space = Affine::scale_non_uniform(res / w, res / h)
        * Affine::translate((-f64::from(target_bounds.min.x), -f64::from(target_bounds.min.y)));
    let space = |units: MaskUnits| match units {
        MaskUnits::ObjectBoundingBox => object_space,
        MaskUnits::UserSpaceOnUse => user_space,
    };

    let clip = def
        .region
        .and_then(|region| region_clip(&region, space(def.region_units), resolution));
    let content = space(def.content_units);
    for shape in &def.shapes {
        draw_shape(&mut pixmap, shape, content, 1.0, clip.as_ref());
    }

    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    let image = RgbaImage::from_raw(resolution, resolution, data)
        .ok_or_else(|| Error::Geometry("mask pixel buffer size mismatch".into()))?;

    debug!(
        id = %def.id,
        resolution,
        ?target_bounds,
        clipped = clip.is_some(),
        "rendered mask texture"
    );

    Ok(TextureResource {
        image,
        wrap: WrapMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        generate_mipmaps: false,
    })
}

/// Clip mask for the mask region, or `None` when it covers the whole texture
fn region_clip(region: &Region, space: Affine, resolution: u32) -> Option<Mask> {
    let min = region.origin;
    let max = min + region.size;
    let a = space * kurbo::Point::new(f64::from(min.x), f64::from(min.y));
    let b = space * kurbo::Point::new(f64::from(max.x), f64::from(max.y));
    let res = f64::from(resolution);
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
    if x0 <= 0.0 && y0 <= 0.0 && x1 >= res && y1 >= res {
        return None;
    }
    let mut mask = Mask::new(resolution, resolution)?;
    if let Some(rect) = Rect::from_ltrb(x0 as f32, y0 as f32, x1 as f32, y1 as f32) {
        let path = PathBuilder::from_rect(rect);
        mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    }
    Some(mask)
}

fn draw_shape(pixmap: &mut Pixmap, shape: &MaskShape, parent: Affine, parent_opacity: f32, clip: Option<&Mask>) {
    let affine = parent * shape.transform;
    let opacity = (parent_opacity * shape.opacity).clamp(0.0, 1.0);

    if let MaskGeometry::Group { children } = &shape.geometry {
        for child in children {
            draw_shape(pixmap, child, affine, opacity, clip);
        }
        return;
    }

    let Some(path) = shape_path(&shape.geometry) else {
        debug!(kind = shape.kind(), "skipping empty mask shape");
        return;
    };
    let gray = (opacity * 255.0).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(gray, gray, gray, 255);
    paint.anti_alias = true;
    pixmap.fill_path(&path, &paint, FillRule::Winding, to_skia(affine), clip);
}

fn shape_path(geometry: &MaskGeometry) -> Option<tiny_skia::Path> {
    match geometry {
        MaskGeometry::Rect { origin, size } => {
            Rect::from_xywh(origin.x, origin.y, size.x, size.y).map(PathBuilder::from_rect)
        }
        MaskGeometry::Circle { center, radius } => {
            PathBuilder::from_circle(center.x, center.y, *radius)
        }
        MaskGeometry::Ellipse { center, radii } => Rect::from_xywh(
            center.x - radii.x,
            center.y - radii.y,
            radii.x * 2.0,
            radii.y * 2.0,
        )
        .and_then(PathBuilder::from_oval),
        MaskGeometry::Polygon { points } => {
            let (first, rest) = points.split_first()?;
            if rest.len() < 2 {
                return None;
            }
            let mut pb = PathBuilder::new();
            pb.move_to(first.x, first.y);
            for p in rest {
                pb.line_to(p.x, p.y);
            }
            pb.close();
            pb.finish()
        }
        MaskGeometry::Path { d } => BezPath::from_svg(d).ok().and_then(|p| bez_to_skia(&p)),
        MaskGeometry::Group { .. } => None,
    }
}

/// Convert a kurbo path into a tiny-skia path
pub(crate) fn bez_to_skia(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

fn to_skia(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn mask(content_units: MaskUnits, shapes: Vec<MaskShape>) -> MaskDefinition {
        MaskDefinition {
            id: "m".into(),
            content_units,
            region_units: MaskUnits::ObjectBoundingBox,
            region: Some(Region {
                origin: Vec2::ZERO,
                size: Vec2::ONE,
            }),
            shapes,
        }
    }

    fn rect(origin: Vec2, size: Vec2, opacity: f32) -> MaskShape {
        MaskShape {
            geometry: MaskGeometry::Rect { origin, size },
            opacity,
            transform: Affine::IDENTITY,
        }
    }

    fn bounds() -> Aabb {
        Aabb::new(Vec3::new(10.0, 20.0, 0.0), Vec3::new(30.0, 40.0, 5.0))
    }

    #[test]
    fn user_space_rect_covering_bounds_is_white() {
        let def = mask(
            MaskUnits::UserSpaceOnUse,
            vec![rect(Vec2::new(10.0, 20.0), Vec2::new(20.0, 20.0), 1.0)],
        );
        let tex = render_mask_texture(&def, &bounds(), 32).unwrap();
        for uv in [Vec2::new(0.1, 0.1), Vec2::new(0.5, 0.5), Vec2::new(0.9, 0.9)] {
            assert_eq!(tex.sample(uv), [255, 255, 255, 255]);
        }
    }

    #[test]
    fn user_space_mask_without_region_is_not_clipped() {
        let mut def = mask(
            MaskUnits::UserSpaceOnUse,
            vec![rect(Vec2::ZERO, Vec2::splat(100.0), 1.0)],
        );
        def.region_units = MaskUnits::UserSpaceOnUse;
        def.region = None;
        let target = Aabb::new(Vec3::ZERO, Vec3::new(100.0, 100.0, 5.0));
        let tex = render_mask_texture(&def, &target, 64).unwrap();
        assert_eq!(tex.sample(Vec2::new(0.5, 0.5))[0], 255);
        assert_eq!(tex.sample(Vec2::new(0.05, 0.95))[0], 255);
    }

    #[test]
    fn opacity_becomes_gray_level() {
        let def = mask(
            MaskUnits::ObjectBoundingBox,
            vec![rect(Vec2::ZERO, Vec2::new(0.5, 1.0), 0.5)],
        );
        let tex = render_mask_texture(&def, &bounds(), 16).unwrap();
        // Left half gray, right half black
        assert_eq!(tex.sample(Vec2::new(0.2, 0.5))[0], 128);
        assert_eq!(tex.sample(Vec2::new(0.8, 0.5))[0], 0);
    }

    #[test]
    fn group_multiplies_opacity() {
        let group = MaskShape {
            geometry: MaskGeometry::Group {
                children: vec![rect(Vec2::ZERO, Vec2::ONE, 0.5)],
            },
            opacity: 0.5,
            transform: Affine::IDENTITY,
        };
        let def = mask(MaskUnits::ObjectBoundingBox, vec![group]);
        let tex = render_mask_texture(&def, &bounds(), 8).unwrap();
        assert_eq!(tex.sample(Vec2::new(0.5, 0.5))[0], 64);
    }

    #[test]
    fn region_clips_content() {
        let mut def = mask(
            MaskUnits::ObjectBoundingBox,
            vec![rect(Vec2::ZERO, Vec2::ONE, 1.0)],
        );
        def.region = Some(Region {
            origin: Vec2::ZERO,
            size: Vec2::new(1.0, 0.5),
        });
        let tex = render_mask_texture(&def, &bounds(), 16).unwrap();
        // Region covers the top half of the raster, i.e. high v
        assert_eq!(tex.sample(Vec2::new(0.5, 0.9))[0], 255);
        assert_eq!(tex.sample(Vec2::new(0.5, 0.1))[0], 0);
    }

    #[test]
    fn path_and_transformed_shapes_render() {
        let shape = MaskShape {
            geometry: MaskGeometry::Path {
                d: "M0 0 H0.5 V0.5 H0 Z".into(),
            },
            opacity: 1.0,
            transform: Affine::translate((0.5, 0.5)),
        };
        let def = mask(MaskUnits::ObjectBoundingBox, vec![shape]);
        let tex = render_mask_texture(&def, &bounds(), 16).unwrap();
        // Bottom-right quadrant of the raster is lit
        assert_eq!(tex.sample(Vec2::new(0.75, 0.25))[0], 255);
        assert_eq!(tex.sample(Vec2::new(0.25, 0.75))[0], 0);
    }
}
