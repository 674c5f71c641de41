//! Watermark compositing for event photos.
//!
//! A project carries either an *advanced* watermark set (a JSON array of
//! text and logo elements authored on an 800×1200 editor canvas) or the
//! older flat *legacy* fields (one optional text and one optional logo placed
//! by keyword). The [`processor::WatermarkProcessor`] loads the photo,
//! normalizes whichever watermark applies into target-space elements, paints
//! them in order and encodes the result.
//!
//! # Watermark set example
//!
//! ```json
//! [
//!   {"id": "t1", "type": "text", "x": 400, "y": 1100, "text": "© Studio",
//!    "fontSize": 48, "color": "#FFFFFF", "opacity": 0.8,
//!    "shadow": {"enabled": true, "color": "rgba(0,0,0,0.5)", "blur": 4, "offsetX": 2, "offsetY": 2}},
//!   {"id": "l1", "type": "logo", "x": 650, "y": 1050, "src": "https://cdn.example.com/logo.png",
//!    "width": 120, "height": 120, "rotation": 15}
//! ]
//! ```
//!
//! A single failing element never aborts a composition; only an unreadable
//! base photo or an encoder failure does.

pub mod compositor;
pub mod config;
pub mod element;
pub mod encoder;
pub mod error;
pub mod image_fetcher;
pub mod legacy;
pub mod position;
pub mod processor;
pub mod scale;
pub mod text_renderer;

// Re-export main types for convenience
pub use compositor::Surface;
pub use config::{LegacyWatermarkConfig, ProjectRecord, WatermarkPosition};
pub use element::{
    parse_watermark_set, ElementBase, LogoElement, PlacedElement, Shadow, TextElement,
    WatermarkElement,
};
pub use encoder::{watermarked_key, EncodedImage, OutputFormat};
pub use error::WatermarkError;
pub use image_fetcher::{AssetLoader, ImageFetcher, ImageFetcherConfig, ImageSource};
pub use position::{ImageDimensions, WatermarkDimensions};
pub use processor::{RenderReport, SkippedElement, WatermarkPlan, WatermarkProcessor};
pub use scale::{scale, scale_all, ScaleFactors};
pub use text_renderer::{parse_color, Color, FontBook};
