//! Output surface and raster painting primitives.
//!
//! Every element ends up as an RGBA layer drawn onto the [`Surface`] through
//! an affine transform:
//!
//! - Bilinear sampling at pixel centres, interpolated in premultiplied space
//! - Porter-Duff "over" with an extra global alpha
//! - Identity and integer-translation draws copy pixels exactly
//!
//! The surface holds no drawing state besides its pixels, so one element's
//! transform or alpha can never leak into the next.
//!
//! # Example
//!
//! ```ignore
//! use boothmark::watermark::compositor::Surface;
//! use kurbo::Affine;
//!
//! let mut surface = Surface::new(800, 1200);
//! surface.draw_layer(&logo, Affine::translate((20.0, 20.0)), 0.8);
//! ```

use super::element::LogoElement;
use super::WatermarkError;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect};

/// Upper bound on the pixel count of any single element layer.
pub const MAX_LAYER_PIXELS: u64 = 64 * 1024 * 1024;

/// The image being composited.
#[derive(Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("dimensions", &self.pixels.dimensions())
            .finish()
    }
}

/// A layer already resampled into surface coordinates.
#[derive(Debug, Clone)]
pub struct DeviceLayer {
    pub image: RgbaImage,
    /// Surface x of the layer's left column
    pub x: i32,
    /// Surface y of the layer's top row
    pub y: i32,
}

impl Surface {
    /// Transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    /// Surface sized to `image` with `image` drawn at (0, 0).
    pub fn from_image(image: &DynamicImage) -> Self {
        Self {
            pixels: image.to_rgba8(),
        }
    }

    /// Surface of `width × height` with `image` stretched to fill it.
    pub fn from_image_resized(image: &DynamicImage, width: u32, height: u32) -> Self {
        let rgba = image.to_rgba8();
        if rgba.dimensions() == (width, height) {
            return Self { pixels: rgba };
        }
        Self {
            pixels: image::imageops::resize(&rgba, width, height, FilterType::Triangle),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Bounds of the surface in its own coordinate space.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64)
    }

    /// Draw `layer` through `transform` with an extra global `opacity`.
    pub fn draw_layer(&mut self, layer: &RgbaImage, transform: Affine, opacity: f32) {
        if let Some(device) = render_layer(layer, transform, self.bounds()) {
            self.blend_at(&device.image, device.x, device.y, opacity);
        }
    }

    /// Blend `layer` with its top-left corner at `(x, y)`, clipped to the surface.
    pub fn blend_at(&mut self, layer: &RgbaImage, x: i32, y: i32, opacity: f32) {
        let opacity = effective_opacity(opacity);
        if opacity <= 0.0 {
            return;
        }

        let target_width = self.pixels.width() as i64;
        let target_height = self.pixels.height() as i64;

        let x_start = (x as i64).max(0);
        let y_start = (y as i64).max(0);
        let x_end = (x as i64 + layer.width() as i64).min(target_width);
        let y_end = (y as i64 + layer.height() as i64).min(target_height);

        for ty in y_start..y_end {
            for tx in x_start..x_end {
                let wx = (tx - x as i64) as u32;
                let wy = (ty - y as i64) as u32;

                let fg = *layer.get_pixel(wx, wy);
                if fg[3] == 0 {
                    continue;
                }
                let bg = *self.pixels.get_pixel(tx as u32, ty as u32);
                self.pixels
                    .put_pixel(tx as u32, ty as u32, blend_pixels(bg, fg, opacity));
            }
        }
    }
}

/// Clamp an opacity into [0, 1]; non-finite values paint fully opaque.
pub fn effective_opacity(opacity: f32) -> f32 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Blend two pixels using alpha compositing with additional opacity.
///
/// Uses the "over" operator: result = foreground + background * (1 - foreground.alpha)
pub fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let result = (fg as f32 * fg_alpha + bg as f32 * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        result.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Resample `layer` through `transform` into surface coordinates.
///
/// Only the part of the transformed layer inside `clip` is produced. Returns
/// `None` when nothing is visible or the transform is degenerate.
pub fn render_layer(layer: &RgbaImage, transform: Affine, clip: Rect) -> Option<DeviceLayer> {
    if layer.width() == 0 || layer.height() == 0 {
        return None;
    }

    let det = transform.determinant();
    if !det.is_finite() || det.abs() < f64::EPSILON {
        return None;
    }

    let source = Rect::new(0.0, 0.0, layer.width() as f64, layer.height() as f64);
    let bbox = transform.transform_rect_bbox(source).intersect(clip);
    if !(bbox.x0.is_finite() && bbox.y0.is_finite() && bbox.x1.is_finite() && bbox.y1.is_finite())
    {
        return None;
    }

    let x0 = bbox.x0.floor() as i64;
    let y0 = bbox.y0.floor() as i64;
    let x1 = bbox.x1.ceil() as i64;
    let y1 = bbox.y1.ceil() as i64;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    if (x1 - x0).saturating_mul(y1 - y0) > MAX_LAYER_PIXELS as i64 {
        return None;
    }
    let width = (x1 - x0) as u32;
    let height = (y1 - y0) as u32;

    let origin_x = i32::try_from(x0).ok()?;
    let origin_y = i32::try_from(y0).ok()?;

    let inverse = transform.inverse();
    let mut out = RgbaImage::new(width, height);

    for dy in 0..height {
        for dx in 0..width {
            let centre = Point::new(
                (x0 + dx as i64) as f64 + 0.5,
                (y0 + dy as i64) as f64 + 0.5,
            );
            let src = inverse * centre;
            let premul = sample_bilinear(layer, src.x - 0.5, src.y - 0.5);
            out.put_pixel(dx, dy, unpremultiply(premul));
        }
    }

    Some(DeviceLayer {
        image: out,
        x: origin_x,
        y: origin_y,
    })
}

/// Bilinear sample in premultiplied space; outside the layer is transparent.
fn sample_bilinear(layer: &RgbaImage, sx: f64, sy: f64) -> [f32; 4] {
    let w = layer.width() as i64;
    let h = layer.height() as i64;

    if sx <= -1.0 || sy <= -1.0 || sx >= w as f64 || sy >= h as f64 {
        return [0.0; 4];
    }

    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = (sx - x0 as f64) as f32;
    let fy = (sy - y0 as f64) as f32;

    let fetch = |x: i64, y: i64| -> [f32; 4] {
        if x < 0 || y < 0 || x >= w || y >= h {
            return [0.0; 4];
        }
        let p = layer.get_pixel(x as u32, y as u32);
        let a = p[3] as f32 / 255.0;
        [p[0] as f32 * a, p[1] as f32 * a, p[2] as f32 * a, p[3] as f32]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        out[c] = p00[c] * (1.0 - fx) * (1.0 - fy)
            + p10[c] * fx * (1.0 - fy)
            + p01[c] * (1.0 - fx) * fy
            + p11[c] * fx * fy;
    }
    out
}

fn unpremultiply(premul: [f32; 4]) -> Rgba<u8> {
    let alpha = premul[3];
    if alpha < 0.5 {
        return Rgba([0, 0, 0, 0]);
    }
    let a = alpha / 255.0;
    let channel = |v: f32| (v / a).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(premul[0]),
        channel(premul[1]),
        channel(premul[2]),
        alpha.round().clamp(0.0, 255.0) as u8,
    ])
}

/// Transform placing a `width × height` box at `(x, y)`, rotated clockwise by
/// `rotation_degrees` around its centre.
pub fn box_transform(x: f64, y: f64, width: f64, height: f64, rotation_degrees: f64) -> Affine {
    if rotation_degrees == 0.0 {
        return Affine::translate((x, y));
    }
    Affine::translate((x + width / 2.0, y + height / 2.0))
        * Affine::rotate(rotation_degrees.to_radians())
        * Affine::translate((-width / 2.0, -height / 2.0))
}

/// Paint a placed logo/image element with its decoded asset.
pub fn paint_image(
    surface: &mut Surface,
    logo: &LogoElement,
    image: &DynamicImage,
) -> Result<(), WatermarkError> {
    let base = &logo.base;
    if !(base.x.is_finite() && base.y.is_finite() && base.rotation.is_finite()) {
        return Err(WatermarkError::ElementRender(format!(
            "non-finite geometry (x={}, y={}, rotation={})",
            base.x, base.y, base.rotation
        )));
    }
    if !(logo.width.is_finite() && logo.height.is_finite()) || logo.width < 1.0 || logo.height < 1.0
    {
        return Err(WatermarkError::ElementRender(format!(
            "degenerate size {}x{}",
            logo.width, logo.height
        )));
    }

    let width = logo.width.round() as u32;
    let height = logo.height.round() as u32;
    if width as u64 * height as u64 > MAX_LAYER_PIXELS {
        return Err(WatermarkError::ElementRender(format!(
            "size {}x{} exceeds layer limit",
            width, height
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(WatermarkError::ElementRender(
            "decoded image is empty".to_string(),
        ));
    }

    let rgba = image.to_rgba8();
    let resized = if rgba.dimensions() == (width, height) {
        rgba
    } else {
        image::imageops::resize(&rgba, width, height, FilterType::Triangle)
    };

    let transform = box_transform(
        base.x,
        base.y,
        width as f64,
        height as f64,
        base.rotation,
    );
    surface.draw_layer(&resized, transform, base.opacity);

    Ok(())
}
