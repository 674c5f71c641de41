// Shared fixtures: an in-memory asset loader and image helpers

use async_trait::async_trait;
use boothmark::watermark::{AssetLoader, EncodedImage, FontBook, WatermarkError, WatermarkProcessor};
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Serves solid-color images registered by name and counts every load.
#[derive(Default)]
pub struct MemoryLoader {
    images: HashMap<String, Arc<DynamicImage>>,
    loads: Mutex<Vec<String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solid(mut self, src: &str, width: u32, height: u32, color: [u8; 4]) -> Self {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        self.images
            .insert(src.to_string(), Arc::new(DynamicImage::ImageRgba8(image)));
        self
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }
}

#[async_trait]
impl AssetLoader for MemoryLoader {
    async fn load(&self, source: &str) -> Result<Arc<DynamicImage>, WatermarkError> {
        self.loads.lock().push(source.to_string());
        self.images
            .get(source)
            .cloned()
            .ok_or_else(|| WatermarkError::AssetLoad(format!("no such asset: {}", source)))
    }
}

/// A processor with no fonts at all.
pub fn processor_without_fonts(loader: Arc<MemoryLoader>) -> WatermarkProcessor {
    let fonts = FontBook::from_database(fontdb::Database::new(), None);
    WatermarkProcessor::new(loader, Arc::new(fonts))
}

/// A processor with the system fonts, or `None` when the host has none.
pub fn processor_with_system_fonts(loader: Arc<MemoryLoader>) -> Option<WatermarkProcessor> {
    let fonts = FontBook::system();
    if fonts.face_count() == 0 {
        eprintln!("skipping: no system fonts available");
        return None;
    }
    Some(WatermarkProcessor::new(loader, Arc::new(fonts)))
}

pub fn decode(encoded: &EncodedImage) -> RgbaImage {
    image::load_from_memory(&encoded.data)
        .expect("composited output decodes")
        .to_rgba8()
}

/// Count pixels in a rectangle that differ from `background`.
pub fn changed_pixels(
    image: &RgbaImage,
    background: Rgba<u8>,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
) -> usize {
    let mut count = 0;
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            if *image.get_pixel(x, y) != background {
                count += 1;
            }
        }
    }
    count
}
