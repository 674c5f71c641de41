//! Legacy flat-config adapter.
//!
//! Projects without a watermark set still carry the older flat fields. The
//! adapter turns those into at most two [`PlacedElement`]s (one text, one
//! logo) so the legacy path paints through exactly the same primitives as
//! the advanced path.
//!
//! Legacy geometry is already in target pixels: keyword positions resolve
//! against the real photo size with fixed margins, and the text size is used
//! as-is.

use super::config::{LegacyWatermarkConfig, ProjectRecord, WatermarkPosition};
use super::element::{ElementBase, LogoElement, PlacedElement, TextElement, WatermarkElement};
use super::position::{
    calculate_position, calculate_text_anchor, fit_logo, ImageDimensions, WatermarkDimensions,
};
use super::text_renderer::{measure_text, FontBook};
use super::WatermarkError;
use crate::constants::{
    DEFAULT_FONT_FAMILY, DEFAULT_OPACITY, DEFAULT_TEXT_COLOR, LEGACY_DEFAULT_TEXT_SIZE,
    LEGACY_LOGO_MAX_RATIO, LEGACY_MARGIN,
};
use image::DynamicImage;

pub const LEGACY_TEXT_ID: &str = "legacy-text";
pub const LEGACY_LOGO_ID: &str = "legacy-logo";

impl From<&ProjectRecord> for LegacyWatermarkConfig {
    fn from(project: &ProjectRecord) -> Self {
        Self {
            enabled: project.watermark_enabled,
            text: project.watermark_text.clone(),
            text_color: project
                .watermark_text_color
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            text_size: project
                .watermark_text_size
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(LEGACY_DEFAULT_TEXT_SIZE),
            text_position: WatermarkPosition::parse_or_default(
                project.watermark_text_position.as_deref(),
            ),
            logo_url: project.watermark_logo_url.clone(),
            position: WatermarkPosition::parse_or_default(project.watermark_position.as_deref()),
            opacity: project.watermark_opacity.unwrap_or(DEFAULT_OPACITY),
        }
    }
}

/// Synthesize the legacy text element for a `image`-sized target.
///
/// Returns `Ok(None)` when the config has no text. Measuring needs a font,
/// so a missing font is an element-level error.
pub fn legacy_text_element(
    config: &LegacyWatermarkConfig,
    image: &ImageDimensions,
    fonts: &FontBook,
) -> Result<Option<PlacedElement>, WatermarkError> {
    let Some(text) = config.text() else {
        return Ok(None);
    };

    let font = fonts.resolve(DEFAULT_FONT_FAMILY)?;
    let text_width = measure_text(&font, text, config.text_size);
    let (x, y) = calculate_text_anchor(config.text_position, image, text_width, LEGACY_MARGIN);

    let mut base = ElementBase::new(LEGACY_TEXT_ID, x, y);
    base.opacity = config.opacity;

    let mut element = TextElement::new(base, text);
    element.font_size = config.text_size;
    element.color = config.text_color.clone();

    Ok(Some(PlacedElement::new(WatermarkElement::Text(element))))
}

/// Synthesize the legacy logo element from the decoded logo.
///
/// The logo keeps its natural size unless it exceeds the per-axis size
/// clamp, in which case it is shrunk proportionally.
pub fn legacy_logo_element(
    config: &LegacyWatermarkConfig,
    image: &ImageDimensions,
    logo: &DynamicImage,
) -> Option<PlacedElement> {
    let src = config.logo_url()?;

    let natural = WatermarkDimensions {
        width: logo.width(),
        height: logo.height(),
    };
    let fitted = fit_logo(&natural, image, LEGACY_LOGO_MAX_RATIO);
    let placement = calculate_position(config.position, image, &fitted, LEGACY_MARGIN as u32);

    let mut base = ElementBase::new(LEGACY_LOGO_ID, placement.x as f64, placement.y as f64);
    base.opacity = config.opacity;

    Some(PlacedElement::new(WatermarkElement::Logo(LogoElement::new(
        base,
        src,
        fitted.width as f64,
        fitted.height as f64,
    ))))
}
