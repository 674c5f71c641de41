//! Text watermark rendering.
//!
//! This module paints text elements onto a [`Surface`] the way a 2D canvas
//! `fillText` would:
//!
//! - Font sizes are CSS pixel sizes (one em = `font_size` pixels)
//! - `(x, y)` is the left end of the alphabetic baseline
//! - Rotation pivots on that same anchor
//! - Shadows are cast in surface space, so a rotated text still casts its
//!   shadow along the unrotated offset
//!
//! Fonts are looked up by family name in a [`FontBook`] built from system
//! fonts and configured font files.
//!
//! # Example
//!
//! ```ignore
//! use boothmark::watermark::text_renderer::{paint_text, FontBook};
//!
//! let fonts = FontBook::system();
//! paint_text(&mut surface, &placed_text, &fonts)?;
//! ```

use super::compositor::{render_layer, Surface, MAX_LAYER_PIXELS};
use super::element::{Shadow, TextElement};
use super::WatermarkError;
use crate::config::FontsConfig;
use crate::constants::MAX_SHADOW_BLUR;
use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use kurbo::{Affine, Rect};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Parsed RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "white" => Color::white(),
        "black" => Color::black(),
        "red" => Color::new(255, 0, 0),
        "green" => Color::new(0, 128, 0),
        "lime" => Color::new(0, 255, 0),
        "blue" => Color::new(0, 0, 255),
        "yellow" => Color::new(255, 255, 0),
        "orange" => Color::new(255, 165, 0),
        "gold" => Color::new(255, 215, 0),
        "pink" => Color::new(255, 192, 203),
        "purple" => Color::new(128, 0, 128),
        "navy" => Color::new(0, 0, 128),
        "maroon" => Color::new(128, 0, 0),
        "silver" => Color::new(192, 192, 192),
        "gray" | "grey" => Color::new(128, 128, 128),
        "transparent" => Color::with_alpha(0, 0, 0, 0),
        _ => return None,
    };
    Some(color)
}

fn hex_digit_pair(s: &str) -> Result<u8, WatermarkError> {
    u8::from_str_radix(s, 16)
        .map_err(|_| WatermarkError::ElementRender(format!("Invalid hex digits '{}'", s)))
}

fn parse_hex_color(hex: &str) -> Result<Color, WatermarkError> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WatermarkError::ElementRender(format!(
            "Invalid hex color '#{}'",
            hex
        )));
    }

    match hex.len() {
        // #RGB / #RGBA - each digit doubled: 0xF -> 0xFF
        3 | 4 => {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).unwrap_or(0) as u8 * 17)
                .collect();
            let a = digits.get(3).copied().unwrap_or(255);
            Ok(Color::with_alpha(digits[0], digits[1], digits[2], a))
        }
        6 | 8 => {
            let r = hex_digit_pair(&hex[0..2])?;
            let g = hex_digit_pair(&hex[2..4])?;
            let b = hex_digit_pair(&hex[4..6])?;
            let a = if hex.len() == 8 {
                hex_digit_pair(&hex[6..8])?
            } else {
                255
            };
            Ok(Color::with_alpha(r, g, b, a))
        }
        n => Err(WatermarkError::ElementRender(format!(
            "Hex color must have 3, 4, 6 or 8 digits, got {}",
            n
        ))),
    }
}

fn parse_rgb_function(args: &str, with_alpha: bool) -> Result<Color, WatermarkError> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(WatermarkError::ElementRender(format!(
            "Expected {} color components, got {}",
            expected,
            parts.len()
        )));
    }

    let channel = |s: &str| -> Result<u8, WatermarkError> {
        let value = if let Some(pct) = s.strip_suffix('%') {
            pct.trim().parse::<f64>().map(|p| p * 2.55)
        } else {
            s.parse::<f64>()
        }
        .map_err(|_| WatermarkError::ElementRender(format!("Invalid color channel '{}'", s)))?;
        Ok(value.round().clamp(0.0, 255.0) as u8)
    };

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = if with_alpha {
        let alpha = parts[3]
            .parse::<f64>()
            .map_err(|_| WatermarkError::ElementRender(format!("Invalid alpha '{}'", parts[3])))?;
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    } else {
        255
    };

    Ok(Color::with_alpha(r, g, b, a))
}

/// Parse a CSS color.
///
/// Supports `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b)`,
/// `rgba(r, g, b, a)` and common color names.
pub fn parse_color(css: &str) -> Result<Color, WatermarkError> {
    let css = css.trim();
    let lower = css.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    if let Some(args) = lower.strip_prefix("rgba(").and_then(|s| s.strip_suffix(')')) {
        return parse_rgb_function(args, true);
    }
    if let Some(args) = lower.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        return parse_rgb_function(args, false);
    }

    named_color(&lower)
        .ok_or_else(|| WatermarkError::ElementRender(format!("Unsupported color '{}'", css)))
}

/// Font lookup by CSS family name.
///
/// Loaded faces are cached per requested family string.
pub struct FontBook {
    db: fontdb::Database,
    default_family: Option<String>,
    loaded: Mutex<HashMap<String, FontArc>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.db.len())
            .field("default_family", &self.default_family)
            .finish()
    }
}

impl FontBook {
    /// Font book over an already populated database.
    pub fn from_database(db: fontdb::Database, default_family: Option<String>) -> Self {
        Self {
            db,
            default_family,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Font book with system fonts only.
    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self::from_database(db, None)
    }

    /// Font book populated according to configuration.
    pub fn from_config(config: &FontsConfig) -> Self {
        let mut db = fontdb::Database::new();
        if config.load_system_fonts {
            db.load_system_fonts();
        }
        for dir in &config.directories {
            db.load_fonts_dir(dir);
        }
        for file in &config.files {
            if let Err(e) = db.load_font_file(file) {
                tracing::warn!(path = %file.display(), error = %e, "Failed to load font file");
            }
        }

        tracing::debug!(faces = db.len(), "Font database loaded");
        Self::from_database(db, config.default_family.clone())
    }

    /// Number of font faces available.
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Resolve a CSS font-family list (e.g. `"Arial, sans-serif"`) to a font.
    ///
    /// Falls back to the configured default family, then the database's
    /// sans-serif family, then any face at all.
    pub fn resolve(&self, family: &str) -> Result<FontArc, WatermarkError> {
        if let Some(font) = self.loaded.lock().get(family) {
            return Ok(font.clone());
        }

        let names: Vec<String> = family
            .split(',')
            .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|name| !name.is_empty())
            .chain(self.default_family.iter().cloned())
            .collect();

        let mut families: Vec<fontdb::Family<'_>> = names.iter().map(|n| css_family(n)).collect();
        families.push(fontdb::Family::SansSerif);

        let query = fontdb::Query {
            families: &families,
            ..fontdb::Query::default()
        };

        let id = self
            .db
            .query(&query)
            .or_else(|| self.db.faces().next().map(|face| face.id))
            .ok_or_else(|| {
                WatermarkError::ElementRender(format!(
                    "No font available for family '{}'",
                    family
                ))
            })?;

        let font = self
            .db
            .with_face_data(id, |data, index| {
                FontVec::try_from_vec_and_index(data.to_vec(), index)
            })
            .ok_or_else(|| WatermarkError::ElementRender("Font face data unavailable".to_string()))?
            .map_err(|e| WatermarkError::ElementRender(format!("Invalid font data: {}", e)))?;

        let font = FontArc::new(font);
        self.loaded.lock().insert(family.to_string(), font.clone());
        Ok(font)
    }
}

fn css_family(name: &str) -> fontdb::Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => fontdb::Family::Serif,
        "sans-serif" => fontdb::Family::SansSerif,
        "monospace" => fontdb::Family::Monospace,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        _ => fontdb::Family::Name(name),
    }
}

/// Glyph scale for a CSS pixel font size (em box = `font_size` pixels).
fn css_px_scale(font: &FontArc, font_size: f64) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(font_size as f32 * font.height_unscaled() / units_per_em)
}

/// Advance width of `text` in pixels at a CSS pixel `font_size`.
pub fn measure_text(font: &FontArc, text: &str, font_size: f64) -> f64 {
    let scaled_font = font.as_scaled(css_px_scale(font, font_size));

    let mut width = 0.0f32;
    let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

    for c in text.chars() {
        let glyph_id = scaled_font.glyph_id(c);
        if let Some(prev) = prev_glyph {
            width += scaled_font.kern(prev, glyph_id);
        }
        width += scaled_font.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    width as f64
}

/// Text rasterized into its own layer.
struct TextLayer {
    image: RgbaImage,
    /// Layer-space position of the baseline anchor
    anchor_x: f64,
    anchor_y: f64,
}

fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f64,
    color: Color,
) -> Result<TextLayer, WatermarkError> {
    let scale = css_px_scale(font, font_size);
    let scaled_font = font.as_scaled(scale);

    let width = measure_text(font, text, font_size);
    let ascent = scaled_font.ascent() as f64;
    let descent = scaled_font.descent() as f64;
    // Room for glyph overhang past the advance box
    let pad = (font_size * 0.25).ceil() + 2.0;

    let layer_w = (width.ceil() + 2.0 * pad) as u32;
    let layer_h = ((ascent - descent).ceil() + 2.0 * pad) as u32;
    if layer_w as u64 * layer_h as u64 > MAX_LAYER_PIXELS {
        return Err(WatermarkError::ElementRender(format!(
            "text layer {}x{} exceeds layer limit",
            layer_w, layer_h
        )));
    }

    let baseline_y = pad + ascent;
    let mut coverage = vec![0.0f32; layer_w as usize * layer_h as usize];

    let mut cursor_x = pad as f32;
    let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

    for c in text.chars() {
        let glyph_id = scaled_font.glyph_id(c);
        if let Some(prev) = prev_glyph {
            cursor_x += scaled_font.kern(prev, glyph_id);
        }

        let glyph =
            glyph_id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y as f32));

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                let x = px as i64 + bounds.min.x as i64;
                let y = py as i64 + bounds.min.y as i64;
                if x >= 0 && y >= 0 && x < layer_w as i64 && y < layer_h as i64 {
                    let idx = y as usize * layer_w as usize + x as usize;
                    let existing = coverage[idx];
                    coverage[idx] = existing + cov.clamp(0.0, 1.0) * (1.0 - existing);
                }
            });
        }

        cursor_x += scaled_font.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    let color_alpha = color.a as f32;
    let image = RgbaImage::from_fn(layer_w, layer_h, |x, y| {
        let cov = coverage[y as usize * layer_w as usize + x as usize];
        let alpha = (cov * color_alpha).round().clamp(0.0, 255.0) as u8;
        if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([color.r, color.g, color.b, alpha])
        }
    });

    Ok(TextLayer {
        image,
        anchor_x: pad,
        anchor_y: baseline_y,
    })
}

/// Tint a layer's coverage with the shadow color and blur it.
///
/// The shadow color is uniform, so only the alpha plane is blurred. Returns
/// the shadow image and how far it was padded on each side.
fn build_shadow(layer: &RgbaImage, color: Color, blur: f64) -> (RgbaImage, u32) {
    let sigma = clamp_shadow_blur(blur) / 2.0;
    let radius = (sigma * 3.0).ceil() as u32;

    let width = layer.width() + 2 * radius;
    let height = layer.height() + 2 * radius;
    let mut alpha = vec![0.0f32; width as usize * height as usize];
    let tint = color.a as f32 / 255.0;
    for (x, y, pixel) in layer.enumerate_pixels() {
        let idx = (y + radius) as usize * width as usize + (x + radius) as usize;
        alpha[idx] = pixel[3] as f32 * tint;
    }

    if radius > 0 {
        let kernel = gaussian_kernel(radius, sigma as f32);
        alpha = blur_alpha(&alpha, width as usize, height as usize, &kernel);
    }

    let shadow = RgbaImage::from_fn(width, height, |x, y| {
        let a = alpha[y as usize * width as usize + x as usize];
        Rgba([color.r, color.g, color.b, a.round().clamp(0.0, 255.0) as u8])
    });
    (shadow, radius)
}

/// Authored blur clamped to `[0, MAX_SHADOW_BLUR]`; non-finite means none.
fn clamp_shadow_blur(blur: f64) -> f64 {
    if blur.is_finite() {
        blur.clamp(0.0, MAX_SHADOW_BLUR)
    } else {
        0.0
    }
}

/// Normalized Gaussian weights for offsets `-radius..=radius`.
fn gaussian_kernel(radius: u32, sigma: f32) -> Vec<f32> {
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-r..=r)
        .map(|i| {
            let x = i as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    if sum > 0.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    }
    weights
}

/// Separable blur of a single plane; samples outside the plane are zero.
fn blur_alpha(src: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let radius = (kernel.len() / 2) as isize;
    let mut tmp = vec![0.0f32; src.len()];
    let mut out = vec![0.0f32; src.len()];

    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sx = x as isize + k as isize - radius;
                if sx >= 0 && (sx as usize) < width {
                    acc += w * row[sx as usize];
                }
            }
            tmp[y * width + x] = acc;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sy = y as isize + k as isize - radius;
                if sy >= 0 && (sy as usize) < height {
                    acc += w * tmp[sy as usize * width + x];
                }
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// Surface position of a shadow, or `None` when it cannot touch the surface.
fn shadow_origin(
    device_x: i32,
    device_y: i32,
    pad: u32,
    offset: (f64, f64),
    size: (u32, u32),
    surface: (u32, u32),
) -> Option<(i32, i32)> {
    let place = |device: i32, offset: f64, extent: u32, limit: u32| -> Option<i32> {
        let pos = i64::from(device)
            .saturating_sub(i64::from(pad))
            .saturating_add(offset.round() as i64);
        if pos.saturating_add(i64::from(extent)) <= 0 || pos >= i64::from(limit) {
            return None;
        }
        i32::try_from(pos).ok()
    };

    Some((
        place(device_x, offset.0, size.0, surface.0)?,
        place(device_y, offset.1, size.1, surface.1)?,
    ))
}

/// Transform from text-layer space to surface space.
fn text_transform(x: f64, y: f64, rotation_degrees: f64, layer: &TextLayer) -> Affine {
    let to_anchor = Affine::translate((-layer.anchor_x, -layer.anchor_y));
    if rotation_degrees == 0.0 {
        return Affine::translate((x, y)) * to_anchor;
    }
    Affine::translate((x, y)) * Affine::rotate(rotation_degrees.to_radians()) * to_anchor
}

fn shadow_color(shadow: &Shadow) -> Option<Color> {
    match parse_color(&shadow.color) {
        Ok(color) if color.a > 0 => Some(color),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(color = %shadow.color, error = %e, "Ignoring unparseable shadow color");
            None
        }
    }
}

/// Paint a placed text element.
pub fn paint_text(
    surface: &mut Surface,
    text: &TextElement,
    fonts: &FontBook,
) -> Result<(), WatermarkError> {
    let base = &text.base;
    if text.text.is_empty() {
        return Err(WatermarkError::ElementRender("text is empty".to_string()));
    }
    if !(base.x.is_finite() && base.y.is_finite() && base.rotation.is_finite()) {
        return Err(WatermarkError::ElementRender(format!(
            "non-finite geometry (x={}, y={}, rotation={})",
            base.x, base.y, base.rotation
        )));
    }
    if !text.font_size.is_finite() || text.font_size < 1.0 {
        return Err(WatermarkError::ElementRender(format!(
            "unusable font size {}",
            text.font_size
        )));
    }

    let font = fonts.resolve(&text.font_family)?;

    let color = parse_color(&text.color).unwrap_or_else(|e| {
        tracing::warn!(element_id = %base.id, color = %text.color, error = %e, "Falling back to black text");
        Color::black()
    });

    let layer = rasterize_text(&font, &text.text, text.font_size, color)?;
    let transform = text_transform(base.x, base.y, base.rotation, &layer);

    let shadow = text
        .active_shadow()
        .and_then(|s| shadow_color(s).map(|c| (s, c)));

    match shadow {
        Some((params, shadow_color)) => {
            let ox = if params.offset_x.is_finite() { params.offset_x } else { 0.0 };
            let oy = if params.offset_y.is_finite() { params.offset_y } else { 0.0 };
            let blur = clamp_shadow_blur(params.blur);

            // Keep text that is off-surface but whose shadow lands on it
            let margin = ox.abs() + oy.abs() + blur * 1.5 + 2.0;
            let clip = surface.bounds().inflate(margin, margin);
            let Some(device) = render_layer(&layer.image, transform, clip) else {
                return Ok(());
            };

            let (shadow_image, pad) = build_shadow(&device.image, shadow_color, blur);
            let origin = shadow_origin(
                device.x,
                device.y,
                pad,
                (ox, oy),
                shadow_image.dimensions(),
                (surface.width(), surface.height()),
            );
            if let Some((sx, sy)) = origin {
                surface.blend_at(&shadow_image, sx, sy, base.opacity);
            }
            surface.blend_at(&device.image, device.x, device.y, base.opacity);
        }
        None => {
            let clip: Rect = surface.bounds();
            if let Some(device) = render_layer(&layer.image, transform, clip) {
                surface.blend_at(&device.image, device.x, device.y, base.opacity);
            }
        }
    }

    Ok(())
}
