// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_ASSET_CACHE_ENTRIES, DEFAULT_ASSET_CACHE_TTL_SECS, DEFAULT_ASSET_TIMEOUT_MS,
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_PREVIEW_HEIGHT, DEFAULT_PREVIEW_WIDTH,
};
use crate::watermark::encoder::OutputFormat;

/// Top-level configuration. Every section is optional in the YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_ASSET_TIMEOUT_MS
}

fn default_max_cache_entries() -> u64 {
    DEFAULT_ASSET_CACHE_ENTRIES
}

fn default_cache_ttl_seconds() -> u64 {
    DEFAULT_ASSET_CACHE_TTL_SECS
}

fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

/// Asset loading configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Per-load timeout in milliseconds (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cached decoded assets; 0 disables the cache (default: 100)
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: u64,

    /// Cache entry lifetime (default: 3600)
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Accept plain http:// sources (default: false)
    #[serde(default)]
    pub allow_http: bool,

    /// Accept file:// sources and bare paths (default: false)
    #[serde(default)]
    pub allow_file_sources: bool,

    /// Largest encoded image accepted (default: 25 MiB)
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_cache_entries: default_max_cache_entries(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            allow_http: false,
            allow_file_sources: false,
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_load_system_fonts() -> bool {
    true
}

/// Font discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontsConfig {
    /// Directories scanned for font files
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// Individual font files
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Load the fonts installed on the system (default: true)
    #[serde(default = "default_load_system_fonts")]
    pub load_system_fonts: bool,

    /// Family tried before the generic sans-serif fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_family: Option<String>,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            files: Vec::new(),
            load_system_fonts: default_load_system_fonts(),
            default_family: None,
        }
    }
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

/// Output encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JPEG quality 1-100 (default: 95)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl OutputConfig {
    pub fn jpeg_format(&self) -> OutputFormat {
        OutputFormat::jpeg(self.jpeg_quality)
    }
}

fn default_preview_width() -> u32 {
    DEFAULT_PREVIEW_WIDTH
}

fn default_preview_height() -> u32 {
    DEFAULT_PREVIEW_HEIGHT
}

/// Preview box configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_width")]
    pub width: u32,
    #[serde(default = "default_preview_height")]
    pub height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: default_preview_width(),
            height: default_preview_height(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "boothmark=debug" (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        // An empty file is a valid, all-defaults configuration
        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fetcher.timeout_ms == 0 {
            return Err("fetcher.timeout_ms must be greater than 0".to_string());
        }

        if self.fetcher.max_image_bytes == 0 {
            return Err("fetcher.max_image_bytes must be greater than 0".to_string());
        }

        if self.fetcher.max_cache_entries > 0 && self.fetcher.cache_ttl_seconds == 0 {
            return Err(
                "fetcher.cache_ttl_seconds must be greater than 0 when caching is enabled"
                    .to_string(),
            );
        }

        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(format!(
                "output.jpeg_quality must be between 1 and 100, got {}",
                self.output.jpeg_quality
            ));
        }

        if self.preview.width == 0 || self.preview.height == 0 {
            return Err(format!(
                "preview dimensions must be non-zero, got {}x{}",
                self.preview.width, self.preview.height
            ));
        }

        if let Some(family) = &self.fonts.default_family {
            if family.trim().is_empty() {
                return Err("fonts.default_family cannot be empty".to_string());
            }
        }

        for dir in &self.fonts.directories {
            if !dir.is_dir() {
                return Err(format!("Font directory '{}' does not exist", dir.display()));
            }
        }

        for file in &self.fonts.files {
            if !file.is_file() {
                return Err(format!("Font file '{}' does not exist", file.display()));
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err("logging.level cannot be empty".to_string());
        }

        Ok(())
    }
}
