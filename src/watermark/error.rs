//! Watermark error types.
//!
//! Only [`WatermarkError::BaseImageLoad`] and [`WatermarkError::Encode`] ever
//! escape a composition call. Everything else is caught per element, logged,
//! and the element is skipped.

use thiserror::Error;

/// Errors that can occur during watermark compositing.
#[derive(Debug, Clone, Error)]
pub enum WatermarkError {
    /// The base photo could not be fetched or decoded.
    #[error("Failed to load base image: {0}")]
    BaseImageLoad(String),

    /// A logo/image asset could not be fetched or decoded.
    #[error("Failed to load asset: {0}")]
    AssetLoad(String),

    /// Painting a single element failed.
    #[error("Failed to render element: {0}")]
    ElementRender(String),

    /// The serialized watermark set is not a JSON array of elements.
    #[error("Failed to parse watermark set: {0}")]
    WatermarkSetParse(String),

    /// Serializing the composed surface failed.
    #[error("Failed to encode composited image: {0}")]
    Encode(String),

    /// Invalid configuration.
    #[error("Watermark configuration error: {0}")]
    Config(String),
}

impl WatermarkError {
    /// Whether this error aborts a composition call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BaseImageLoad(_) | Self::Encode(_))
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BaseImageLoad(_) => "base_image_load",
            Self::AssetLoad(_) => "asset_load",
            Self::ElementRender(_) => "element_render",
            Self::WatermarkSetParse(_) => "watermark_set_parse",
            Self::Encode(_) => "encode",
            Self::Config(_) => "config",
        }
    }

    /// Re-tag an asset failure as a base image failure.
    pub(crate) fn into_base_image_error(self) -> Self {
        match self {
            Self::AssetLoad(msg) => Self::BaseImageLoad(msg),
            other => other,
        }
    }
}
