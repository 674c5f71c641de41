// Full-resolution composition: scaling, ordering and fault isolation

use super::test_harness::{
    changed_pixels, decode, processor_with_system_fonts, processor_without_fonts, MemoryLoader,
};
use boothmark::metrics::CompositionPath;
use boothmark::watermark::{
    parse_watermark_set, scale, OutputFormat, ProjectRecord, WatermarkElement,
};
use image::Rgba;
use std::sync::Arc;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Test: End-to-end text watermark on a 1024×1536 photo
///
/// The text authored at (650, 1130) in editor space lands at (832, 1446)
/// with a 61px font, and the photo keeps its dimensions.
#[tokio::test]
async fn test_end_to_end_text_scenario() {
    let set = parse_watermark_set(
        r##"[{"type":"text","text":"© Acme","x":650,"y":1130,"fontSize":48,"color":"#FFFFFF"}]"##,
    )
    .expect("set parses");

    let placed = scale(&set[0], 1024, 1536);
    let WatermarkElement::Text(text) = placed.element() else {
        panic!("expected a text element");
    };
    assert_eq!((text.base.x, text.base.y), (832.0, 1446.0));
    assert_eq!(text.font_size, 61.0);

    let loader = Arc::new(MemoryLoader::new().with_solid("photo", 1024, 1536, [0, 0, 0, 255]));
    let Some(processor) = processor_with_system_fonts(loader) else {
        return;
    };

    let encoded = processor
        .composite_advanced("photo", &set, OutputFormat::Png)
        .await
        .expect("composition succeeds");
    let pixels = decode(&encoded);

    assert_eq!(pixels.dimensions(), (1024, 1536));
    assert_eq!((encoded.width, encoded.height), (1024, 1536));

    // Glyphs sit above the baseline, to the right of the anchor
    let background = Rgba([0, 0, 0, 255]);
    assert!(changed_pixels(&pixels, background, 832, 1446 - 61, 1024, 1446 + 10) > 0);
    // Nothing is painted in the top-left corner
    assert_eq!(changed_pixels(&pixels, background, 0, 0, 400, 400), 0);
}

/// Test: An empty set leaves the photo untouched
#[tokio::test]
async fn test_empty_set_passthrough_keeps_pixels() {
    let loader = Arc::new(MemoryLoader::new().with_solid("photo", 640, 480, [12, 34, 56, 255]));
    let processor = processor_without_fonts(loader);

    let encoded = processor
        .composite_advanced("photo", &[], OutputFormat::Png)
        .await
        .unwrap();
    let pixels = decode(&encoded);

    assert_eq!(pixels.dimensions(), (640, 480));
    assert!(pixels.pixels().all(|p| *p == Rgba([12, 34, 56, 255])));
    assert_eq!(
        processor.metrics().composition_count(CompositionPath::Passthrough),
        1
    );
}

/// Test: JPEG output keeps dimensions and carries the composite headers
#[tokio::test]
async fn test_jpeg_output_metadata() {
    let loader = Arc::new(MemoryLoader::new().with_solid("photo", 1024, 1536, WHITE));
    let processor = processor_without_fonts(loader);

    let encoded = processor
        .composite_advanced("photo", &[], OutputFormat::jpeg(80))
        .await
        .unwrap();

    assert_eq!(encoded.content_type(), "image/jpeg");
    assert_eq!(encoded.cache_control(), "public, max-age=31536000, immutable");
    assert_eq!(decode(&encoded).dimensions(), (1024, 1536));
}

/// Test: The middle element's unreachable source does not affect its neighbours
#[tokio::test]
async fn test_unreachable_middle_logo_is_isolated() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 800, 1200, WHITE)
            .with_solid("red", 8, 8, RED),
    );
    let processor = processor_without_fonts(loader);

    let set = parse_watermark_set(
        r#"[
            {"id":"one","type":"logo","src":"red","x":100,"y":100,"width":50,"height":50,"opacity":1},
            {"id":"two","type":"logo","src":"https://unreachable.invalid/logo.png","x":300,"y":100,"width":50,"height":50,"opacity":1},
            {"id":"three","type":"image","src":"red","x":500,"y":100,"width":50,"height":50,"opacity":1}
        ]"#,
    )
    .unwrap();

    let encoded = processor
        .composite_advanced("photo", &set, OutputFormat::Png)
        .await
        .expect("one bad element must not fail the call");
    let pixels = decode(&encoded);

    assert_eq!(*pixels.get_pixel(125, 125), Rgba(RED));
    assert_eq!(*pixels.get_pixel(325, 125), Rgba(WHITE));
    assert_eq!(*pixels.get_pixel(525, 125), Rgba(RED));

    assert_eq!(processor.metrics().element_failure_count("asset_load"), 1);
    assert_eq!(processor.metrics().elements_painted(), 2);
}

/// Test: The later element in the array is on top
#[tokio::test]
async fn test_z_order_follows_array_order() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 800, 1200, WHITE)
            .with_solid("red", 8, 8, RED)
            .with_solid("blue", 8, 8, BLUE),
    );
    let processor = processor_without_fonts(loader);

    let set = parse_watermark_set(
        r#"[
            {"type":"logo","src":"blue","x":200,"y":200,"width":100,"height":100,"opacity":1},
            {"type":"logo","src":"red","x":200,"y":200,"width":100,"height":100,"opacity":1}
        ]"#,
    )
    .unwrap();

    let encoded = processor
        .composite_advanced("photo", &set, OutputFormat::Png)
        .await
        .unwrap();
    assert_eq!(*decode(&encoded).get_pixel(250, 250), Rgba(RED));
}

/// Test: Logo geometry scales per axis on a non-editor aspect ratio
#[tokio::test]
async fn test_logo_scales_per_axis() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 1600, 1200, WHITE)
            .with_solid("blue", 8, 8, BLUE),
    );
    let processor = processor_without_fonts(loader);

    // x scales by 2, y by 1: (100,100) 50x50 -> (200,100) 100x50
    let set = parse_watermark_set(
        r#"[{"type":"logo","src":"blue","x":100,"y":100,"width":50,"height":50,"opacity":1}]"#,
    )
    .unwrap();
    let encoded = processor
        .composite_advanced("photo", &set, OutputFormat::Png)
        .await
        .unwrap();
    let pixels = decode(&encoded);

    assert_eq!(*pixels.get_pixel(205, 105), Rgba(BLUE));
    assert_eq!(*pixels.get_pixel(294, 144), Rgba(BLUE));
    assert_eq!(*pixels.get_pixel(195, 125), Rgba(WHITE));
    assert_eq!(*pixels.get_pixel(305, 125), Rgba(WHITE));
    assert_eq!(*pixels.get_pixel(250, 155), Rgba(WHITE));
}

/// Test: Half-opaque logos blend with the photo
#[tokio::test]
async fn test_logo_opacity_blends() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 800, 1200, WHITE)
            .with_solid("red", 8, 8, RED),
    );
    let processor = processor_without_fonts(loader);

    let set = parse_watermark_set(
        r#"[{"type":"logo","src":"red","x":0,"y":0,"width":100,"height":100,"opacity":0.5}]"#,
    )
    .unwrap();
    let encoded = processor
        .composite_advanced("photo", &set, OutputFormat::Png)
        .await
        .unwrap();
    let pixel = *decode(&encoded).get_pixel(50, 50);

    assert_eq!(pixel[0], 255);
    assert!((127..=128).contains(&pixel[1]), "got {:?}", pixel);
    assert!((127..=128).contains(&pixel[2]), "got {:?}", pixel);
}

/// Test: A rotated logo turns about its centre
#[tokio::test]
async fn test_rotated_logo_turns_about_center() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 800, 1200, WHITE)
            .with_solid("blue", 8, 8, BLUE),
    );
    let processor = processor_without_fonts(loader);

    let set = parse_watermark_set(
        r#"[{"type":"logo","src":"blue","x":300,"y":300,"width":200,"height":200,"rotation":45,"opacity":1}]"#,
    )
    .unwrap();
    let encoded = processor
        .composite_advanced("photo", &set, OutputFormat::Png)
        .await
        .unwrap();
    let pixels = decode(&encoded);

    // Centre stays covered, the unrotated box corners are exposed
    assert_eq!(*pixels.get_pixel(400, 400), Rgba(BLUE));
    assert_eq!(*pixels.get_pixel(305, 305), Rgba(WHITE));
    assert_eq!(*pixels.get_pixel(494, 494), Rgba(WHITE));
    // The diamond reaches beyond the unrotated box along the axes
    assert_eq!(*pixels.get_pixel(400, 290), Rgba(BLUE));
}

/// Test: A parseable advanced set wins over legacy fields
#[tokio::test]
async fn test_advanced_set_takes_precedence() {
    let loader = Arc::new(
        MemoryLoader::new()
            .with_solid("photo", 800, 1200, WHITE)
            .with_solid("red", 8, 8, RED)
            .with_solid("blue", 8, 8, BLUE),
    );
    let processor = processor_without_fonts(loader.clone());

    let project = ProjectRecord {
        watermark_enabled: false,
        watermark_elements: Some(
            r#"[{"type":"logo","src":"red","x":0,"y":0,"width":40,"height":40,"opacity":1}]"#
                .to_string(),
        ),
        watermark_logo_url: Some("blue".to_string()),
        watermark_position: Some("bottom-right".to_string()),
        ..Default::default()
    };

    let encoded = processor
        .composite_project(&project, "photo", OutputFormat::Png)
        .await
        .unwrap();
    let pixels = decode(&encoded);

    assert_eq!(*pixels.get_pixel(20, 20), Rgba(RED));
    assert_eq!(*pixels.get_pixel(770, 1170), Rgba(WHITE));
    assert!(!loader.loads().iter().any(|src| src == "blue"));
    assert_eq!(
        processor.metrics().composition_count(CompositionPath::Advanced),
        1
    );
}

/// Test: A missing base photo is the one failure that escapes
#[tokio::test]
async fn test_missing_base_is_fatal() {
    let loader = Arc::new(MemoryLoader::new().with_solid("red", 8, 8, RED));
    let processor = processor_without_fonts(loader);

    let err = processor
        .composite_project(&ProjectRecord::default(), "gone", OutputFormat::Png)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(err.kind(), "base_image_load");
    assert!(processor
        .metrics()
        .export_prometheus()
        .contains("watermark_composition_failures_total{kind=\"base_image_load\"} 1"));
}
