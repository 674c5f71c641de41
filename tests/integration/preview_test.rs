// Preview rendering: fitted box, data URI output, shared pipeline

use super::test_harness::{processor_without_fonts, MemoryLoader};
use base64::Engine as _;
use boothmark::metrics::CompositionPath;
use boothmark::watermark::ProjectRecord;
use image::{Rgba, RgbaImage};
use std::sync::Arc;

fn decode_data_uri(uri: &str) -> RgbaImage {
    let payload = uri
        .strip_prefix("data:image/jpeg;base64,")
        .expect("preview is a JPEG data URI");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .expect("valid base64");
    image::load_from_memory(&bytes).unwrap().to_rgba8()
}

fn near(pixel: &Rgba<u8>, expected: [u8; 3]) -> bool {
    pixel
        .0
        .iter()
        .zip(expected)
        .all(|(a, b)| (*a as i16 - b as i16).abs() <= 8)
}

/// Test: The preview keeps the editor aspect ratio inside the requested box
#[tokio::test]
async fn test_preview_fits_design_ratio() {
    let loader = Arc::new(MemoryLoader::new().with_solid("photo", 1024, 1536, [200, 200, 200, 255]));
    let processor = processor_without_fonts(loader);

    for ((box_w, box_h), expected) in [
        ((400, 600), (400, 600)),
        ((800, 600), (400, 600)),
        ((300, 900), (300, 450)),
    ] {
        let uri = processor
            .generate_preview("photo", &ProjectRecord::default(), box_w, box_h)
            .await
            .unwrap();
        assert_eq!(decode_data_uri(&uri).dimensions(), expected);
    }

    assert_eq!(
        processor.metrics().composition_count(CompositionPath::Preview),
        3
    );
}

/// Test: Preview paints the advanced set in preview coordinates
#[tokio::test]
async fn test_preview_paints_scaled_logo() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 3000, 4500, [255, 255, 255, 255])
            .with_solid("red", 16, 16, [255, 0, 0, 255]),
    );
    let processor = processor_without_fonts(loader);

    // Editor (400,600) 200x200 -> preview 400x600: (200,300) 100x100
    let project = ProjectRecord {
        watermark_elements: Some(
            r#"[{"type":"logo","src":"red","x":400,"y":600,"width":200,"height":200,"opacity":1}]"#
                .to_string(),
        ),
        ..Default::default()
    };
    let uri = processor
        .generate_preview("photo", &project, 400, 600)
        .await
        .unwrap();
    let preview = decode_data_uri(&uri);

    assert!(near(preview.get_pixel(250, 350), [255, 0, 0]));
    assert!(near(preview.get_pixel(100, 100), [255, 255, 255]));
}

/// Test: A missing base photo fails the preview
#[tokio::test]
async fn test_preview_without_base_fails() {
    let processor = processor_without_fonts(Arc::new(MemoryLoader::new()));
    let err = processor
        .generate_preview("missing", &ProjectRecord::default(), 400, 600)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}
