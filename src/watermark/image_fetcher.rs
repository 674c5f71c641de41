//! Image asset loading with caching.
//!
//! Base photos and logo assets are both addressed by a source string and
//! decoded into [`DynamicImage`]s.
//!
//! # Supported Sources
//!
//! - `https://example.com/logo.png` - Fetch over HTTPS
//! - `http://example.com/logo.png` - Only when `allow_http` is set
//! - `data:image/png;base64,...` - Inline base64 payload
//! - `file:///srv/logo.png` or a bare path - Only when `allow_file_sources` is set
//!
//! # Caching
//!
//! Logo assets are cached in memory as decoded images, keyed by source, with
//! a bounded entry count and TTL. Base photos bypass the cache; they are
//! different for every call. Inline data URIs are never cached.
//!
//! # Example
//!
//! ```ignore
//! use boothmark::watermark::image_fetcher::{AssetLoader, ImageFetcher, ImageFetcherConfig};
//!
//! let fetcher = ImageFetcher::new(ImageFetcherConfig::default())?;
//! let logo = fetcher.load("https://cdn.example.com/logo.png").await?;
//! ```

use super::WatermarkError;
use crate::config::FetcherConfig;
use crate::constants::{
    DEFAULT_ASSET_CACHE_ENTRIES, DEFAULT_ASSET_CACHE_TTL_SECS, DEFAULT_ASSET_TIMEOUT_MS,
    DEFAULT_MAX_IMAGE_BYTES,
};
use async_trait::async_trait;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use moka::future::Cache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can turn a source string into a decoded image.
///
/// The processor only talks to assets through this trait so tests (and
/// embedders with their own storage) can supply images without a network.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Load a watermark asset (logo). Implementations may cache.
    async fn load(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError>;

    /// Load the photo being watermarked.
    async fn load_base(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        self.load(source).await
    }
}

/// Configuration for the image fetcher.
#[derive(Debug, Clone)]
pub struct ImageFetcherConfig {
    /// Maximum number of cached assets; 0 disables caching.
    pub max_cache_entries: u64,
    /// Time-to-live for cached assets.
    pub cache_ttl: Duration,
    /// Upper bound on a single load, transfer and decode included.
    pub timeout: Duration,
    /// Largest encoded payload accepted.
    pub max_image_bytes: usize,
    pub allow_http: bool,
    pub allow_file_sources: bool,
}

impl Default for ImageFetcherConfig {
    fn default() -> Self {
        Self {
            max_cache_entries: DEFAULT_ASSET_CACHE_ENTRIES,
            cache_ttl: Duration::from_secs(DEFAULT_ASSET_CACHE_TTL_SECS),
            timeout: Duration::from_millis(DEFAULT_ASSET_TIMEOUT_MS),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            allow_http: false,
            allow_file_sources: false,
        }
    }
}

impl From<&FetcherConfig> for ImageFetcherConfig {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_cache_entries: config.max_cache_entries,
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            timeout: Duration::from_millis(config.timeout_ms),
            max_image_bytes: config.max_image_bytes,
            allow_http: config.allow_http,
            allow_file_sources: config.allow_file_sources,
        }
    }
}

/// Parsed source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Https(String),
    Http(String),
    /// Inline base64 payload with its declared media type.
    DataUri { media_type: String, payload: String },
    File(PathBuf),
}

impl ImageSource {
    /// Parse a source string.
    ///
    /// Strings without a recognised scheme are treated as filesystem paths;
    /// whether those may be read is decided by the fetcher.
    pub fn parse(source: &str) -> Result<Self, WatermarkError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(WatermarkError::AssetLoad("Empty image source".to_string()));
        }

        let lower = source.to_ascii_lowercase();
        if lower.starts_with("https://") {
            Ok(ImageSource::Https(source.to_string()))
        } else if lower.starts_with("http://") {
            Ok(ImageSource::Http(source.to_string()))
        } else if lower.starts_with("data:") {
            parse_data_uri(source)
        } else if let Some(path) = source.strip_prefix("file://") {
            if path.is_empty() {
                return Err(WatermarkError::AssetLoad(format!(
                    "Invalid file source: {source}"
                )));
            }
            Ok(ImageSource::File(PathBuf::from(path)))
        } else if lower.contains("://") {
            Err(WatermarkError::AssetLoad(format!(
                "Unsupported source protocol: {source}. Use https://, data: or a file path"
            )))
        } else {
            Ok(ImageSource::File(PathBuf::from(source)))
        }
    }

    /// Cache key for this source, or `None` if it should not be cached.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            ImageSource::Https(url) | ImageSource::Http(url) => Some(url.clone()),
            ImageSource::File(path) => Some(format!("file://{}", path.display())),
            ImageSource::DataUri { .. } => None,
        }
    }

    /// Name used for extension-based format detection.
    fn format_hint(&self) -> String {
        match self {
            ImageSource::Https(url) | ImageSource::Http(url) => url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
            ImageSource::DataUri { media_type, .. } => media_type
                .strip_prefix("image/")
                .map(|sub| format!("inline.{sub}"))
                .unwrap_or_default(),
            ImageSource::File(path) => path.display().to_string(),
        }
    }
}

fn parse_data_uri(source: &str) -> Result<ImageSource, WatermarkError> {
    let rest = &source["data:".len()..];
    let (header, payload) = rest.split_once(',').ok_or_else(|| {
        WatermarkError::AssetLoad("Malformed data URI: missing ',' separator".to_string())
    })?;

    let mut params = header.split(';');
    let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(WatermarkError::AssetLoad(
            "Only base64-encoded data URIs are supported".to_string(),
        ));
    }

    Ok(ImageSource::DataUri {
        media_type,
        payload: payload.trim().to_string(),
    })
}

/// Fetcher for watermark assets with built-in caching.
#[derive(Clone)]
pub struct ImageFetcher {
    cache: Option<Cache<String, Arc<DynamicImage>>>,
    http_client: reqwest::Client,
    config: ImageFetcherConfig,
}

impl std::fmt::Debug for ImageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFetcher")
            .field("config", &self.config)
            .field("cached", &self.cache_size())
            .finish()
    }
}

impl ImageFetcher {
    /// Create a new image fetcher with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkError::Config` if the HTTP client cannot be created.
    pub fn new(config: ImageFetcherConfig) -> Result<Self, WatermarkError> {
        let cache = (config.max_cache_entries > 0).then(|| {
            Cache::builder()
                .max_capacity(config.max_cache_entries)
                .time_to_live(config.cache_ttl)
                .build()
        });

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WatermarkError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            cache,
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ImageFetcherConfig {
        &self.config
    }

    /// Fetch an asset, consulting the cache first.
    pub async fn fetch(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        let parsed = ImageSource::parse(source)?;
        let cache_key = parsed.cache_key();

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(cached) = cache.get(key).await {
                tracing::trace!(source = %key, "Asset cache hit");
                return Ok(cached);
            }
        }

        let image = Arc::new(self.fetch_with_timeout(&parsed).await?);

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, image.clone()).await;
        }

        Ok(image)
    }

    /// Fetch without reading or populating the cache.
    pub async fn fetch_uncached(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        let parsed = ImageSource::parse(source)?;
        Ok(Arc::new(self.fetch_with_timeout(&parsed).await?))
    }

    async fn fetch_with_timeout(&self, source: &ImageSource) -> Result<DynamicImage, WatermarkError> {
        tokio::time::timeout(self.config.timeout, self.fetch_source(source))
            .await
            .map_err(|_| {
                WatermarkError::AssetLoad(format!(
                    "Timed out after {}ms loading {}",
                    self.config.timeout.as_millis(),
                    source.format_hint()
                ))
            })?
    }

    async fn fetch_source(&self, source: &ImageSource) -> Result<DynamicImage, WatermarkError> {
        let bytes = match source {
            ImageSource::Https(url) => self.fetch_from_http(url).await?,
            ImageSource::Http(url) => {
                if !self.config.allow_http {
                    return Err(WatermarkError::AssetLoad(format!(
                        "Plain HTTP sources are disabled: {url}"
                    )));
                }
                self.fetch_from_http(url).await?
            }
            ImageSource::DataUri { payload, .. } => self.decode_data_uri(payload)?,
            ImageSource::File(path) => {
                if !self.config.allow_file_sources {
                    return Err(WatermarkError::AssetLoad(format!(
                        "File sources are disabled: {}",
                        path.display()
                    )));
                }
                self.fetch_from_file(path).await?
            }
        };

        let hint = source.format_hint();
        tokio::task::spawn_blocking(move || decode_image(&bytes, &hint))
            .await
            .map_err(|e| WatermarkError::AssetLoad(format!("Decode task failed: {e}")))?
    }

    async fn fetch_from_http(&self, url: &str) -> Result<Vec<u8>, WatermarkError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WatermarkError::AssetLoad(format!("HTTP fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WatermarkError::AssetLoad(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length as usize)?;
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WatermarkError::AssetLoad(format!("Failed to read HTTP body: {e}")))?
        {
            body.extend_from_slice(&chunk);
            self.check_size(body.len())?;
        }

        Ok(body)
    }

    fn decode_data_uri(&self, payload: &str) -> Result<Vec<u8>, WatermarkError> {
        // Base64 inflates by 4/3; reject before allocating
        self.check_size(payload.len() / 4 * 3)?;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| WatermarkError::AssetLoad(format!("Invalid base64 in data URI: {e}")))
    }

    async fn fetch_from_file(&self, path: &std::path::Path) -> Result<Vec<u8>, WatermarkError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            WatermarkError::AssetLoad(format!("Cannot read {}: {e}", path.display()))
        })?;
        self.check_size(metadata.len() as usize)?;

        tokio::fs::read(path)
            .await
            .map_err(|e| WatermarkError::AssetLoad(format!("Cannot read {}: {e}", path.display())))
    }

    fn check_size(&self, len: usize) -> Result<(), WatermarkError> {
        if len > self.config.max_image_bytes {
            return Err(WatermarkError::AssetLoad(format!(
                "Image exceeds {} byte limit",
                self.config.max_image_bytes
            )));
        }
        Ok(())
    }

    /// Get the number of cached images.
    pub fn cache_size(&self) -> u64 {
        self.cache.as_ref().map_or(0, |c| c.entry_count())
    }

    /// Clear all cached images.
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            cache.run_pending_tasks().await;
        }
    }

    /// Check if a source is cached.
    pub async fn is_cached(&self, source: &str) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match ImageSource::parse(source).ok().and_then(|s| s.cache_key()) {
            Some(key) => cache.get(&key).await.is_some(),
            None => false,
        }
    }
}

#[async_trait]
impl AssetLoader for ImageFetcher {
    async fn load(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        self.fetch(source).await
    }

    async fn load_base(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        self.fetch_uncached(source).await
    }
}

/// Decode an encoded image, sniffing the format.
pub fn decode_image(data: &[u8], hint: &str) -> Result<DynamicImage, WatermarkError> {
    let format = detect_image_format(data, hint)?;
    image::load_from_memory_with_format(data, format)
        .map_err(|e| WatermarkError::AssetLoad(format!("Failed to decode image: {e}")))
}

/// Detect image format from bytes or filename extension.
pub fn detect_image_format(data: &[u8], path: &str) -> Result<ImageFormat, WatermarkError> {
    if let Ok(format) = image::guess_format(data) {
        return Ok(format);
    }

    let ext = path
        .rsplit('.')
        .next()
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "gif" => Ok(ImageFormat::Gif),
        "webp" => Ok(ImageFormat::WebP),
        _ => Err(WatermarkError::AssetLoad(format!(
            "Unsupported image format: {ext}"
        ))),
    }
}
