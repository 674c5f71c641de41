//! Legacy watermark configuration types.
//!
//! Before positional watermark sets existed, projects carried a flat
//! configuration: one optional text, one optional logo, and a keyword
//! position for each. This module defines:
//! - The keyword position enum shared by text and logo placement
//! - The flat [`LegacyWatermarkConfig`]
//! - The [`ProjectRecord`] fields the compositor reads from a project

use crate::constants::{DEFAULT_OPACITY, DEFAULT_TEXT_COLOR, LEGACY_DEFAULT_TEXT_SIZE};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

fn default_text_size() -> f64 {
    LEGACY_DEFAULT_TEXT_SIZE
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

/// Keyword position on the image (3×3 grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

/// Horizontal anchor of a keyword position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAnchor {
    Left,
    Center,
    Right,
}

/// Vertical anchor of a keyword position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAnchor {
    Top,
    Middle,
    Bottom,
}

impl WatermarkPosition {
    pub fn horizontal(&self) -> HorizontalAnchor {
        match self {
            Self::TopLeft | Self::CenterLeft | Self::BottomLeft => HorizontalAnchor::Left,
            Self::TopCenter | Self::Center | Self::BottomCenter => HorizontalAnchor::Center,
            Self::TopRight | Self::CenterRight | Self::BottomRight => HorizontalAnchor::Right,
        }
    }

    pub fn vertical(&self) -> VerticalAnchor {
        match self {
            Self::TopLeft | Self::TopCenter | Self::TopRight => VerticalAnchor::Top,
            Self::CenterLeft | Self::Center | Self::CenterRight => VerticalAnchor::Middle,
            Self::BottomLeft | Self::BottomCenter | Self::BottomRight => VerticalAnchor::Bottom,
        }
    }

    /// Parse a keyword, falling back to `bottom-right` for anything unknown.
    pub fn parse_or_default(keyword: Option<&str>) -> Self {
        match keyword.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => k.parse().unwrap_or_else(|_| {
                tracing::warn!(keyword = k, "Unknown watermark position, using bottom-right");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::CenterLeft => "center-left",
            Self::Center => "center",
            Self::CenterRight => "center-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-center" => Ok(Self::TopCenter),
            "top-right" => Ok(Self::TopRight),
            "center-left" => Ok(Self::CenterLeft),
            "center" => Ok(Self::Center),
            "center-right" => Ok(Self::CenterRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-center" => Ok(Self::BottomCenter),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(format!("unknown watermark position '{}'", other)),
        }
    }
}

/// Flat, keyword-positioned watermark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyWatermarkConfig {
    /// Enable/disable the watermark (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Text to draw; nothing is drawn when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Text color (default: "#FFFFFF")
    #[serde(default = "default_text_color")]
    pub text_color: String,

    /// Text size in target pixels (default: 24)
    #[serde(default = "default_text_size")]
    pub text_size: f64,

    /// Text position (default: bottom-right)
    #[serde(default)]
    pub text_position: WatermarkPosition,

    /// Logo source; nothing is drawn when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,

    /// Logo position (default: bottom-right)
    #[serde(default)]
    pub position: WatermarkPosition,

    /// Opacity applied to both text and logo (default: 0.8)
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

impl Default for LegacyWatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: None,
            text_color: default_text_color(),
            text_size: default_text_size(),
            text_position: WatermarkPosition::default(),
            logo_url: None,
            position: WatermarkPosition::default(),
            opacity: default_opacity(),
        }
    }
}

impl LegacyWatermarkConfig {
    /// Non-empty text, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Non-empty logo source, if any.
    pub fn logo_url(&self) -> Option<&str> {
        self.logo_url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Whether this configuration would draw anything.
    pub fn has_content(&self) -> bool {
        self.enabled && (self.text().is_some() || self.logo_url().is_some())
    }
}

/// Watermark-related fields of a project record.
///
/// Deserializes straight from the project row; unknown columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(default)]
    pub watermark_enabled: bool,

    /// JSON-encoded watermark set
    #[serde(default)]
    pub watermark_elements: Option<String>,

    #[serde(default)]
    pub watermark_text: Option<String>,

    #[serde(default)]
    pub watermark_logo_url: Option<String>,

    #[serde(default)]
    pub watermark_position: Option<String>,

    #[serde(default)]
    pub watermark_text_position: Option<String>,

    #[serde(default)]
    pub watermark_text_color: Option<String>,

    #[serde(default)]
    pub watermark_text_size: Option<f64>,

    #[serde(default)]
    pub watermark_opacity: Option<f32>,
}
