//! Output encoding for composited images.
//!
//! Provides:
//! - JPEG (default, quality 95) and PNG serialization of a [`Surface`]
//! - The `Content-Type` and long-lived `Cache-Control` values for responses
//! - Storage key derivation for uploaded results
//! - Data URI wrapping for previews

use super::compositor::Surface;
use super::WatermarkError;
use crate::constants::{COMPOSITE_CACHE_CONTROL, DEFAULT_JPEG_QUALITY, WATERMARKED_KEY_PREFIX};
use base64::Engine as _;
use std::io::Cursor;
use std::str::FromStr;

/// Output encoding of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JPEG with quality 1-100
    Jpeg { quality: u8 },
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl OutputFormat {
    pub fn jpeg(quality: u8) -> Self {
        OutputFormat::Jpeg {
            quality: quality.clamp(1, 100),
        }
    }

    /// Get the Content-Type header value for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    /// Parse a format name; JPEG takes the default quality.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::default()),
            "png" => Ok(OutputFormat::Png),
            other => Err(format!("unsupported output format '{}'", other)),
        }
    }
}

/// Result of encoding a composition
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// The encoded image data
    pub data: Vec<u8>,
    /// The output format
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Content-Type header value
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Cache-Control header value; composites are immutable per key.
    pub fn cache_control(&self) -> &'static str {
        COMPOSITE_CACHE_CONTROL
    }

    /// Wrap as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Serialize a surface in the requested format.
pub fn encode_surface(surface: &Surface, format: OutputFormat) -> Result<EncodedImage, WatermarkError> {
    use image::ImageEncoder as _;

    let pixels = surface.pixels();
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(WatermarkError::Encode("surface is empty".to_string()));
    }

    let mut output = Cursor::new(Vec::new());

    match format {
        OutputFormat::Jpeg { quality } => {
            // JPEG has no alpha channel
            let rgb = rgba_to_rgb(pixels.as_raw());
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
                .write_image(&rgb, width, height, image::ColorType::Rgb8)
                .map_err(|e| WatermarkError::Encode(format!("jpeg: {}", e)))?;
        }
        OutputFormat::Png => {
            image::codecs::png::PngEncoder::new(&mut output)
                .write_image(pixels.as_raw(), width, height, image::ColorType::Rgba8)
                .map_err(|e| WatermarkError::Encode(format!("png: {}", e)))?;
        }
    }

    Ok(EncodedImage {
        data: output.into_inner(),
        format,
        width,
        height,
    })
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    rgb
}

/// Storage key for the watermarked copy of `original_key`.
///
/// `events/42/IMG_0001.jpg` becomes `events/42/watermarked-IMG_0001.jpg`.
/// Query strings and fragments of URL-style keys are dropped.
pub fn watermarked_key(original_key: &str) -> String {
    let key = original_key
        .split(['?', '#'])
        .next()
        .unwrap_or(original_key);

    match key.rsplit_once('/') {
        Some((dir, file)) => format!("{}/{}{}", dir, WATERMARKED_KEY_PREFIX, file),
        None => format!("{}{}", WATERMARKED_KEY_PREFIX, key),
    }
}
