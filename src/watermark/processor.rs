//! Watermark processor: the composition pipeline.
//!
//! Every call follows the same steps:
//!
//! 1. Load the base photo (failure is fatal for the call)
//! 2. Allocate a surface at the photo's natural size and draw the photo
//! 3. Normalize the watermark into [`PlacedElement`]s: advanced sets are
//!    scaled from design space, legacy configs are synthesized by keyword
//! 4. Prefetch logo assets concurrently, then paint in array order; a failing
//!    element is logged and skipped
//! 5. Encode the surface (failure is fatal)
//!
//! Nothing is shared between calls except the asset cache, so any number of
//! compositions may run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use boothmark::watermark::processor::WatermarkProcessor;
//!
//! let processor = WatermarkProcessor::new(Arc::new(fetcher), Arc::new(fonts));
//! let output = processor
//!     .composite_project(&project, "https://bucket.example.com/IMG_0001.jpg", OutputFormat::default())
//!     .await?;
//! ```

use super::compositor::{paint_image, Surface};
use super::config::{LegacyWatermarkConfig, ProjectRecord};
use super::element::{parse_watermark_set, PlacedElement, WatermarkElement};
use super::encoder::{encode_surface, EncodedImage, OutputFormat};
use super::image_fetcher::AssetLoader;
use super::legacy::{
    legacy_logo_element, legacy_text_element, LEGACY_LOGO_ID, LEGACY_TEXT_ID,
};
use super::position::{fit_design_canvas, ImageDimensions};
use super::scale::scale_all;
use super::text_renderer::{paint_text, FontBook};
use super::WatermarkError;
use crate::metrics::{CompositionPath, Metrics};
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

type AssetMap = HashMap<String, Result<Arc<DynamicImage>, WatermarkError>>;

/// Which watermark a project gets.
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkPlan {
    /// A non-empty, parseable watermark set; legacy fields are ignored.
    Advanced(Vec<WatermarkElement>),
    Legacy(LegacyWatermarkConfig),
}

impl WatermarkPlan {
    /// Pick the watermark for a project.
    ///
    /// The advanced set wins whenever it parses to at least one element,
    /// regardless of `watermark_enabled`. A missing, empty or unparseable set
    /// falls back to the legacy fields.
    pub fn for_project(project: &ProjectRecord) -> Self {
        let raw = project
            .watermark_elements
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty() && *raw != "null");

        if let Some(raw) = raw {
            match parse_watermark_set(raw) {
                Ok(elements) if !elements.is_empty() => return WatermarkPlan::Advanced(elements),
                Ok(_) => tracing::debug!("Watermark set is empty, using legacy fields"),
                Err(e) => tracing::warn!(error = %e, "Watermark set unusable, using legacy fields"),
            }
        }

        WatermarkPlan::Legacy(LegacyWatermarkConfig::from(project))
    }
}

/// An element that was not painted.
#[derive(Debug, Clone)]
pub struct SkippedElement {
    pub id: String,
    pub element_type: &'static str,
    pub error: WatermarkError,
}

/// Outcome of painting one set of elements.
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    /// Ids of painted elements, in paint order
    pub painted: Vec<String>,
    pub skipped: Vec<SkippedElement>,
}

impl RenderReport {
    fn record_failure(&mut self, id: &str, element_type: &'static str, error: WatermarkError) {
        self.skipped.push(SkippedElement {
            id: id.to_string(),
            element_type,
            error,
        });
    }
}

/// Watermark processor for compositing watermarks onto photos.
#[derive(Clone)]
pub struct WatermarkProcessor {
    loader: Arc<dyn AssetLoader>,
    fonts: Arc<FontBook>,
    metrics: Arc<Metrics>,
}

impl WatermarkProcessor {
    /// Create a processor loading assets through `loader`.
    pub fn new(loader: Arc<dyn AssetLoader>, fonts: Arc<FontBook>) -> Self {
        Self {
            loader,
            fonts,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Record into a shared metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    /// Composite a design-space watermark set onto the base photo.
    #[tracing::instrument(skip_all, fields(elements = elements.len()))]
    pub async fn composite_advanced(
        &self,
        base_ref: &str,
        elements: &[WatermarkElement],
        format: OutputFormat,
    ) -> Result<EncodedImage, WatermarkError> {
        let started = Instant::now();
        let result: Result<(EncodedImage, CompositionPath), WatermarkError> = async {
            let mut surface = self.load_base_surface(base_ref).await?;
            let path = if elements.is_empty() {
                CompositionPath::Passthrough
            } else {
                self.paint_advanced(&mut surface, elements).await;
                CompositionPath::Advanced
            };
            Ok((encode_surface(&surface, format)?, path))
        }
        .await;

        self.finish(result, started)
    }

    /// Composite a flat legacy configuration onto the base photo.
    #[tracing::instrument(skip_all, fields(enabled = config.enabled))]
    pub async fn composite_legacy(
        &self,
        base_ref: &str,
        config: &LegacyWatermarkConfig,
        format: OutputFormat,
    ) -> Result<EncodedImage, WatermarkError> {
        let started = Instant::now();
        let result: Result<(EncodedImage, CompositionPath), WatermarkError> = async {
            let mut surface = self.load_base_surface(base_ref).await?;
            let path = if config.has_content() {
                self.paint_legacy(&mut surface, config).await;
                CompositionPath::Legacy
            } else {
                CompositionPath::Passthrough
            };
            Ok((encode_surface(&surface, format)?, path))
        }
        .await;

        self.finish(result, started)
    }

    /// Composite whichever watermark the project carries.
    pub async fn composite_project(
        &self,
        project: &ProjectRecord,
        base_ref: &str,
        format: OutputFormat,
    ) -> Result<EncodedImage, WatermarkError> {
        match WatermarkPlan::for_project(project) {
            WatermarkPlan::Advanced(elements) => {
                self.composite_advanced(base_ref, &elements, format).await
            }
            WatermarkPlan::Legacy(config) => self.composite_legacy(base_ref, &config, format).await,
        }
    }

    /// Render a reduced preview as a `data:image/jpeg;base64,...` URI.
    ///
    /// The preview keeps the editor canvas' 800:1200 ratio, fitted into the
    /// `box_width × box_height` box; the base photo is stretched to fill it.
    #[tracing::instrument(skip_all, fields(box_width = box_width, box_height = box_height))]
    pub async fn generate_preview(
        &self,
        base_ref: &str,
        project: &ProjectRecord,
        box_width: u32,
        box_height: u32,
    ) -> Result<String, WatermarkError> {
        let started = Instant::now();
        let result: Result<(EncodedImage, CompositionPath), WatermarkError> = async {
            let size = fit_design_canvas(box_width, box_height);
            let base = self.load_base(base_ref).await?;
            let mut surface = Surface::from_image_resized(&base, size.width, size.height);

            match WatermarkPlan::for_project(project) {
                WatermarkPlan::Advanced(elements) => {
                    self.paint_advanced(&mut surface, &elements).await;
                }
                WatermarkPlan::Legacy(config) => {
                    if config.has_content() {
                        self.paint_legacy(&mut surface, &config).await;
                    }
                }
            }

            let encoded = encode_surface(&surface, OutputFormat::default())?;
            Ok((encoded, CompositionPath::Preview))
        }
        .await;

        self.finish(result, started)
            .map(|encoded| encoded.to_data_uri())
    }

    /// Scale `elements` onto the surface and paint them in order.
    pub async fn paint_advanced(
        &self,
        surface: &mut Surface,
        elements: &[WatermarkElement],
    ) -> RenderReport {
        let placed = scale_all(elements, surface.width(), surface.height());
        let assets = self.prefetch_assets(&placed).await;

        let mut report = RenderReport::default();
        self.paint_all(surface, &placed, &assets, &mut report);
        report
    }

    /// Synthesize the legacy text and logo for this surface and paint them.
    pub async fn paint_legacy(
        &self,
        surface: &mut Surface,
        config: &LegacyWatermarkConfig,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        if !config.enabled {
            return report;
        }

        let dims = ImageDimensions {
            width: surface.width(),
            height: surface.height(),
        };
        let mut placed = Vec::with_capacity(2);
        let mut assets = AssetMap::new();

        match legacy_text_element(config, &dims, &self.fonts) {
            Ok(Some(text)) => placed.push(text),
            Ok(None) => {}
            Err(e) => self.skip(&mut report, LEGACY_TEXT_ID, "text", e),
        }

        if let Some(src) = config.logo_url() {
            match self.load_asset(src).await {
                Ok(logo) => {
                    if let Some(element) = legacy_logo_element(config, &dims, &logo) {
                        placed.push(element);
                    }
                    assets.insert(src.to_string(), Ok(logo));
                }
                Err(e) => self.skip(&mut report, LEGACY_LOGO_ID, "logo", e),
            }
        }

        self.paint_all(surface, &placed, &assets, &mut report);
        report
    }

    async fn load_base(&self, base_ref: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        if base_ref.trim().is_empty() {
            return Err(WatermarkError::BaseImageLoad(
                "Empty base image reference".to_string(),
            ));
        }

        let base = self
            .loader
            .load_base(base_ref)
            .await
            .map_err(WatermarkError::into_base_image_error)?;

        if base.width() == 0 || base.height() == 0 {
            return Err(WatermarkError::BaseImageLoad(
                "Base image has no pixels".to_string(),
            ));
        }
        Ok(base)
    }

    async fn load_base_surface(&self, base_ref: &str) -> Result<Surface, WatermarkError> {
        let base = self.load_base(base_ref).await?;
        tracing::debug!(width = base.width(), height = base.height(), "Base image loaded");
        Ok(Surface::from_image(&base))
    }

    async fn load_asset(&self, src: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        if src.trim().is_empty() {
            return Err(WatermarkError::AssetLoad("Empty image source".to_string()));
        }
        self.loader.load(src).await
    }

    /// Load every distinct logo source concurrently.
    async fn prefetch_assets(&self, placed: &[PlacedElement]) -> AssetMap {
        let mut sources: Vec<&str> = placed
            .iter()
            .filter_map(|p| match p.element() {
                WatermarkElement::Logo(logo) => Some(logo.src.as_str()),
                WatermarkElement::Text(_) => None,
            })
            .collect();
        sources.sort_unstable();
        sources.dedup();

        let loads = sources.into_iter().map(|src| async move {
            let loaded = self.load_asset(src).await;
            (src.to_string(), loaded)
        });

        futures::future::join_all(loads).await.into_iter().collect()
    }

    fn paint_all(
        &self,
        surface: &mut Surface,
        placed: &[PlacedElement],
        assets: &AssetMap,
        report: &mut RenderReport,
    ) {
        for placed in placed {
            let element = placed.element();
            match self.paint_element(surface, element, assets) {
                Ok(()) => {
                    self.metrics.increment_elements_painted();
                    report.painted.push(element.id().to_string());
                }
                Err(e) => self.skip(report, element.id(), element.kind(), e),
            }
        }
    }

    fn paint_element(
        &self,
        surface: &mut Surface,
        element: &WatermarkElement,
        assets: &AssetMap,
    ) -> Result<(), WatermarkError> {
        match element {
            WatermarkElement::Text(text) => paint_text(surface, text, &self.fonts),
            WatermarkElement::Logo(logo) => {
                let image = assets
                    .get(&logo.src)
                    .cloned()
                    .unwrap_or_else(|| {
                        Err(WatermarkError::AssetLoad(format!(
                            "Asset was not loaded: {}",
                            logo.src
                        )))
                    })?;
                paint_image(surface, logo, &image)
            }
        }
    }

    fn skip(
        &self,
        report: &mut RenderReport,
        id: &str,
        element_type: &'static str,
        error: WatermarkError,
    ) {
        tracing::warn!(
            element_id = %id,
            element_type,
            error_kind = error.kind(),
            error = %error,
            "Skipping watermark element"
        );
        self.metrics.increment_element_failure(error.kind());
        report.record_failure(id, element_type, error);
    }

    fn finish(
        &self,
        result: Result<(EncodedImage, CompositionPath), WatermarkError>,
        started: Instant,
    ) -> Result<EncodedImage, WatermarkError> {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_duration(elapsed_ms);

        match result {
            Ok((encoded, path)) => {
                self.metrics.increment_composition(path);
                tracing::info!(
                    path = path.as_str(),
                    width = encoded.width,
                    height = encoded.height,
                    bytes = encoded.data.len(),
                    elapsed_ms,
                    "Composition finished"
                );
                Ok(encoded)
            }
            Err(e) => {
                self.metrics.increment_fatal_failure(e.kind());
                tracing::error!(error_kind = e.kind(), error = %e, elapsed_ms, "Composition failed");
                Err(e)
            }
        }
    }
}
