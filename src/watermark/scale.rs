//! Geometry scaling from design space to target space.
//!
//! Element geometry is authored against the 800×1200 editor canvas. At
//! composition time every element is re-projected onto the real photo:
//!
//! - `x`, `width` scale by `target_width / 800`
//! - `y`, `height` scale by `target_height / 1200`
//! - `fontSize` scales by the smaller of the two factors so text keeps its
//!   proportions when the photo's aspect ratio differs from the editor's
//!
//! Rotation, color, opacity, text and shadow parameters pass through
//! unchanged. Shadow blur/offsets stay in raw pixels.

use super::element::{PlacedElement, WatermarkElement};
use crate::constants::{EDITOR_HEIGHT, EDITOR_WIDTH};

/// Per-axis scale factors between design space and a target surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    /// Factors mapping the editor canvas onto a `width × height` target.
    pub fn for_target(width: u32, height: u32) -> Self {
        Self {
            x: width as f64 / EDITOR_WIDTH,
            y: height as f64 / EDITOR_HEIGHT,
        }
    }

    /// Factor applied to font sizes.
    pub fn font(&self) -> f64 {
        self.x.min(self.y)
    }
}

/// Round half-way values towards positive infinity.
///
/// Matches the rounding the editor uses so previews and exports agree on
/// which pixel an element lands on (`-2.5` rounds to `-2`, not `-3`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Scale one element onto a `target_width × target_height` surface.
///
/// Non-finite input propagates as non-finite output; the renderer rejects
/// such elements individually.
pub fn scale(element: &WatermarkElement, target_width: u32, target_height: u32) -> PlacedElement {
    scale_with(element, ScaleFactors::for_target(target_width, target_height))
}

/// Scale one element with precomputed factors.
pub fn scale_with(element: &WatermarkElement, factors: ScaleFactors) -> PlacedElement {
    let mut scaled = element.clone();

    match &mut scaled {
        WatermarkElement::Text(text) => {
            text.base.x = round_half_up(text.base.x * factors.x);
            text.base.y = round_half_up(text.base.y * factors.y);
            text.font_size = round_half_up(text.font_size * factors.font());
        }
        WatermarkElement::Logo(logo) => {
            logo.base.x = round_half_up(logo.base.x * factors.x);
            logo.base.y = round_half_up(logo.base.y * factors.y);
            logo.width = round_half_up(logo.width * factors.x);
            logo.height = round_half_up(logo.height * factors.y);
        }
    }

    PlacedElement::new(scaled)
}

/// Scale a whole set, preserving order.
pub fn scale_all(
    elements: &[WatermarkElement],
    target_width: u32,
    target_height: u32,
) -> Vec<PlacedElement> {
    let factors = ScaleFactors::for_target(target_width, target_height);
    elements.iter().map(|e| scale_with(e, factors)).collect()
}
