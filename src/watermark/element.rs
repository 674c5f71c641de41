//! Watermark element model.
//!
//! Elements are authored in the fixed 800×1200 design space and stored as a
//! JSON array on the project record:
//!
//! ```json
//! [
//!   {"type": "text", "id": "t1", "text": "© Acme", "x": 650, "y": 1130,
//!    "fontSize": 48, "color": "#FFFFFF",
//!    "shadow": {"enabled": true, "color": "#000000", "blur": 4, "offsetX": 2, "offsetY": 2}},
//!   {"type": "logo", "id": "l1", "src": "https://cdn.example.com/logo.png",
//!    "x": 20, "y": 20, "width": 120, "height": 60, "rotation": 15}
//! ]
//! ```
//!
//! Array order is paint order: index 0 is painted first, furthest back.

use super::WatermarkError;
use crate::constants::{
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_LOGO_SIZE, DEFAULT_OPACITY,
    DEFAULT_SHADOW_BLUR, DEFAULT_SHADOW_COLOR, DEFAULT_SHADOW_OFFSET, DEFAULT_TEXT_COLOR,
};
use serde::{Deserialize, Serialize};

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

fn default_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

fn default_logo_size() -> f64 {
    DEFAULT_LOGO_SIZE
}

fn default_shadow_color() -> String {
    DEFAULT_SHADOW_COLOR.to_string()
}

fn default_shadow_blur() -> f64 {
    DEFAULT_SHADOW_BLUR
}

fn default_shadow_offset() -> f64 {
    DEFAULT_SHADOW_OFFSET
}

/// Fields shared by every element variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBase {
    /// Identifier, unique within a set
    #[serde(default)]
    pub id: String,

    /// Horizontal position (origin top-left)
    pub x: f64,

    /// Vertical position (origin top-left)
    pub y: f64,

    /// Opacity from 0.0 to 1.0 (default: 0.8)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Clockwise rotation in degrees around the element's anchor (default: 0)
    #[serde(default)]
    pub rotation: f64,
}

impl ElementBase {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            opacity: DEFAULT_OPACITY,
            rotation: 0.0,
        }
    }
}

/// Drop shadow behind a text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_shadow_color")]
    pub color: String,

    #[serde(default = "default_shadow_blur")]
    pub blur: f64,

    #[serde(default = "default_shadow_offset")]
    pub offset_x: f64,

    #[serde(default = "default_shadow_offset")]
    pub offset_y: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            enabled: true,
            color: default_shadow_color(),
            blur: default_shadow_blur(),
            offset_x: default_shadow_offset(),
            offset_y: default_shadow_offset(),
        }
    }
}

/// A text overlay. `(x, y)` is the left end of the text baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(flatten)]
    pub base: ElementBase,

    /// Text content; empty text is not rendered
    #[serde(default)]
    pub text: String,

    /// Font size in pixels (default: 48)
    #[serde(default = "default_font_size")]
    pub font_size: f64,

    /// Font family name (default: "Arial")
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// CSS color (default: "#FFFFFF")
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
}

impl TextElement {
    pub fn new(base: ElementBase, text: impl Into<String>) -> Self {
        Self {
            base,
            text: text.into(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            color: default_color(),
            shadow: None,
        }
    }

    /// Shadow parameters, if a shadow is present and enabled.
    pub fn active_shadow(&self) -> Option<&Shadow> {
        self.shadow.as_ref().filter(|s| s.enabled)
    }
}

/// A raster overlay. `(x, y)` is the top-left corner of the drawn box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoElement {
    #[serde(flatten)]
    pub base: ElementBase,

    /// Remote URL or data URI
    #[serde(default)]
    pub src: String,

    /// Drawn width in pixels (default: 100)
    #[serde(default = "default_logo_size")]
    pub width: f64,

    /// Drawn height in pixels (default: 100)
    #[serde(default = "default_logo_size")]
    pub height: f64,
}

impl LogoElement {
    pub fn new(base: ElementBase, src: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            base,
            src: src.into(),
            width,
            height,
        }
    }
}

/// One overlay unit of a watermark set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatermarkElement {
    Text(TextElement),
    #[serde(alias = "image")]
    Logo(LogoElement),
}

impl WatermarkElement {
    pub fn base(&self) -> &ElementBase {
        match self {
            Self::Text(text) => &text.base,
            Self::Logo(logo) => &logo.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Logo(_) => "logo",
        }
    }
}

/// An element whose geometry is expressed in target (photo) pixels.
///
/// Only the geometry scaler and the legacy adapter produce these, so the
/// renderer can never be handed design-space coordinates by mistake.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedElement(WatermarkElement);

impl PlacedElement {
    pub(crate) fn new(element: WatermarkElement) -> Self {
        Self(element)
    }

    pub fn element(&self) -> &WatermarkElement {
        &self.0
    }
}

/// Parse a serialized watermark set.
///
/// The payload must be a JSON array. Entries that do not deserialize into an
/// element are dropped with a warning so one corrupt entry does not discard
/// the whole set.
pub fn parse_watermark_set(json: &str) -> Result<Vec<WatermarkElement>, WatermarkError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| WatermarkError::WatermarkSetParse(e.to_string()))?;

    let mut elements = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<WatermarkElement>(entry) {
            Ok(element) => elements.push(element),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping unparseable watermark element");
            }
        }
    }

    Ok(elements)
}
