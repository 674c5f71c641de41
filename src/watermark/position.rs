//! Keyword position resolution for legacy watermarks and preview sizing.
//!
//! Legacy watermarks are positioned by keyword (`bottom-right`, `center`, ...)
//! rather than by coordinates, so the adapter needs to turn a keyword plus the
//! measured size of the thing being placed into target-space coordinates.
//!
//! # Placement rules
//!
//! Logos (top-left corner of the box, margin `m`):
//! - left: `m`, center: `(W - w) / 2`, right: `W - w - m`
//! - top: `m`, middle: `(H - h) / 2`, bottom: `H - h - m`
//!
//! Text (left end of the baseline, measured width `tw`):
//! - left: `m`, center: `W/2 - tw/2`, right: `W - tw - m`
//! - top: fixed baseline at 40, middle: `H / 2`, bottom: `H - m`
//!
//! Margins are fixed pixel values regardless of the photo's resolution.
//!
//! # Example
//!
//! ```
//! use boothmark::watermark::position::{calculate_position, ImageDimensions, WatermarkDimensions, PlacementPosition};
//! use boothmark::watermark::WatermarkPosition;
//!
//! let image = ImageDimensions { width: 800, height: 600 };
//! let logo = WatermarkDimensions { width: 100, height: 50 };
//!
//! let pos = calculate_position(WatermarkPosition::BottomRight, &image, &logo, 20);
//! assert_eq!(pos, PlacementPosition::new(680, 530)); // 800 - 100 - 20, 600 - 50 - 20
//! ```

use super::config::{HorizontalAnchor, VerticalAnchor};
use super::WatermarkPosition;
use crate::constants::{EDITOR_HEIGHT, EDITOR_WIDTH, LEGACY_TOP_BASELINE};

/// Dimensions of the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimensions of the watermark to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkDimensions {
    pub width: u32,
    pub height: u32,
}

/// Top-left corner where a box-shaped watermark should be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Calculate the top-left corner for a box-shaped watermark (logo).
///
/// Coordinates may be negative if the watermark is larger than the image.
pub fn calculate_position(
    position: WatermarkPosition,
    image: &ImageDimensions,
    watermark: &WatermarkDimensions,
    margin: u32,
) -> PlacementPosition {
    let img_w = image.width as i32;
    let img_h = image.height as i32;
    let wm_w = watermark.width as i32;
    let wm_h = watermark.height as i32;
    let m = margin as i32;

    let x = match position.horizontal() {
        HorizontalAnchor::Left => m,
        HorizontalAnchor::Center => (img_w - wm_w) / 2,
        HorizontalAnchor::Right => img_w - wm_w - m,
    };

    let y = match position.vertical() {
        VerticalAnchor::Top => m,
        VerticalAnchor::Middle => (img_h - wm_h) / 2,
        VerticalAnchor::Bottom => img_h - wm_h - m,
    };

    PlacementPosition::new(x, y)
}

/// Calculate the baseline anchor `(x, y)` for keyword-positioned text.
///
/// `text_width` is the measured advance width of the text at its final size.
pub fn calculate_text_anchor(
    position: WatermarkPosition,
    image: &ImageDimensions,
    text_width: f64,
    margin: f64,
) -> (f64, f64) {
    let img_w = image.width as f64;
    let img_h = image.height as f64;

    let x = match position.horizontal() {
        HorizontalAnchor::Left => margin,
        HorizontalAnchor::Center => img_w / 2.0 - text_width / 2.0,
        HorizontalAnchor::Right => img_w - text_width - margin,
    };

    let y = match position.vertical() {
        VerticalAnchor::Top => LEGACY_TOP_BASELINE,
        VerticalAnchor::Middle => img_h / 2.0,
        VerticalAnchor::Bottom => img_h - margin,
    };

    (x, y)
}

/// Shrink a logo so it covers at most `max_ratio` of the image on each axis.
///
/// The limiting axis is found first and the other axis follows it, so the
/// aspect ratio is preserved. Logos already within bounds are left alone;
/// nothing is ever enlarged.
pub fn fit_logo(
    natural: &WatermarkDimensions,
    image: &ImageDimensions,
    max_ratio: f64,
) -> WatermarkDimensions {
    if natural.width == 0 || natural.height == 0 {
        return *natural;
    }

    let max_w = image.width as f64 * max_ratio;
    let max_h = image.height as f64 * max_ratio;
    let nat_w = natural.width as f64;
    let nat_h = natural.height as f64;

    let scale = (max_w / nat_w).min(max_h / nat_h).min(1.0);
    if scale >= 1.0 {
        return *natural;
    }

    WatermarkDimensions {
        width: ((nat_w * scale).round() as u32).max(1),
        height: ((nat_h * scale).round() as u32).max(1),
    }
}

/// Largest size with the editor canvas' 800:1200 aspect ratio that fits in
/// a `box_width × box_height` preview box.
pub fn fit_design_canvas(box_width: u32, box_height: u32) -> ImageDimensions {
    let scale = (box_width as f64 / EDITOR_WIDTH).min(box_height as f64 / EDITOR_HEIGHT);

    ImageDimensions {
        width: ((EDITOR_WIDTH * scale).round() as u32).max(1),
        height: ((EDITOR_HEIGHT * scale).round() as u32).max(1),
    }
}
