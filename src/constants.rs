// Constants module - centralized default values for the compositor
//
// Every default the watermark pipeline relies on lives here so the element
// model, the legacy adapter and the configuration layer agree on them.

// =============================================================================
// Design space
// =============================================================================

/// Width of the canonical editor canvas all element geometry is authored in.
pub const EDITOR_WIDTH: f64 = 800.0;

/// Height of the canonical editor canvas all element geometry is authored in.
pub const EDITOR_HEIGHT: f64 = 1200.0;

// =============================================================================
// Element defaults
// =============================================================================

/// Default element opacity
pub const DEFAULT_OPACITY: f32 = 0.8;

/// Default text size in design-space pixels
pub const DEFAULT_FONT_SIZE: f64 = 48.0;

/// Default font family
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Default text color
pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";

/// Default logo width and height in design-space pixels
pub const DEFAULT_LOGO_SIZE: f64 = 100.0;

/// Default shadow color
pub const DEFAULT_SHADOW_COLOR: &str = "rgba(0,0,0,0.5)";

/// Default shadow blur radius
pub const DEFAULT_SHADOW_BLUR: f64 = 4.0;

/// Default shadow offset on both axes
pub const DEFAULT_SHADOW_OFFSET: f64 = 2.0;

/// Largest shadow blur honoured; larger values are clamped (sigma = blur / 2)
pub const MAX_SHADOW_BLUR: f64 = 64.0;

// =============================================================================
// Legacy watermark defaults
// =============================================================================

/// Fixed margin (in target pixels) used by keyword positioning
pub const LEGACY_MARGIN: f64 = 20.0;

/// Baseline used for text placed in the top row
pub const LEGACY_TOP_BASELINE: f64 = 40.0;

/// Default legacy text size in target pixels
pub const LEGACY_DEFAULT_TEXT_SIZE: f64 = 24.0;

/// Largest fraction of the target width/height a legacy logo may cover
pub const LEGACY_LOGO_MAX_RATIO: f64 = 0.15;

// =============================================================================
// Output defaults
// =============================================================================

/// Default JPEG quality (0.95 on a 0-1 scale)
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Cache-Control header for composited images served directly
pub const COMPOSITE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Prefix of the storage key for uploaded composites
pub const WATERMARKED_KEY_PREFIX: &str = "watermarked-";

/// Default preview box width
pub const DEFAULT_PREVIEW_WIDTH: u32 = 400;

/// Default preview box height
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 600;

// =============================================================================
// Asset fetching defaults
// =============================================================================

/// Default per-asset load timeout in milliseconds
pub const DEFAULT_ASSET_TIMEOUT_MS: u64 = 5_000;

/// Default number of decoded assets kept in memory
pub const DEFAULT_ASSET_CACHE_ENTRIES: u64 = 100;

/// Default TTL for cached assets in seconds
pub const DEFAULT_ASSET_CACHE_TTL_SECS: u64 = 3600;

/// Default maximum accepted asset payload (25 MiB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;
