// End-to-end composition through the real ImageFetcher

use base64::Engine as _;
use boothmark::watermark::{
    FontBook, ImageFetcher, ImageFetcherConfig, OutputFormat, ProjectRecord, WatermarkError,
    WatermarkProcessor,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn data_uri(bytes: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn processor(fetcher: Arc<ImageFetcher>) -> WatermarkProcessor {
    let fonts = FontBook::from_database(fontdb::Database::new(), None);
    WatermarkProcessor::new(fetcher, Arc::new(fonts))
}

fn http_fetcher(max_image_bytes: usize) -> Arc<ImageFetcher> {
    Arc::new(
        ImageFetcher::new(ImageFetcherConfig {
            allow_http: true,
            timeout: Duration::from_millis(100),
            max_image_bytes,
            ..Default::default()
        })
        .unwrap(),
    )
}

/// Accepts connections and never answers them.
async fn stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}/logo.png", addr)
}

/// Answers every request with `head` followed by `body`, then closes.
async fn canned_server(head: String, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let head = head.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/logo.png", addr)
}

/// Test: Data URI base with a file logo, cached after first use
#[tokio::test]
async fn test_data_uri_base_and_file_logo() {
    let dir = tempfile::tempdir().unwrap();
    let logo_path = dir.path().join("logo.png");
    std::fs::write(&logo_path, png_bytes(8, 8, [0, 255, 0, 255])).unwrap();

    let fetcher = Arc::new(
        ImageFetcher::new(ImageFetcherConfig {
            allow_file_sources: true,
            ..Default::default()
        })
        .unwrap(),
    );
    let processor = processor(fetcher.clone());

    let logo_src = format!("file://{}", logo_path.display());
    let project = ProjectRecord {
        watermark_elements: Some(format!(
            r#"[{{"type":"logo","src":"{}","x":0,"y":0,"width":80,"height":120,"opacity":1}}]"#,
            logo_src
        )),
        ..Default::default()
    };

    let base = data_uri(&png_bytes(800, 1200, [255, 255, 255, 255]));
    let encoded = processor
        .composite_project(&project, &base, OutputFormat::Png)
        .await
        .unwrap();
    let pixels = image::load_from_memory(&encoded.data).unwrap().to_rgba8();

    assert_eq!(pixels.dimensions(), (800, 1200));
    assert_eq!(*pixels.get_pixel(40, 60), Rgba([0, 255, 0, 255]));
    assert_eq!(*pixels.get_pixel(100, 60), Rgba([255, 255, 255, 255]));

    assert!(fetcher.is_cached(&logo_src).await);
    assert!(!fetcher.is_cached(&base).await);
}

/// Test: File sources are refused unless enabled
#[tokio::test]
async fn test_file_base_refused_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.png");
    std::fs::write(&photo, png_bytes(10, 10, [0, 0, 0, 255])).unwrap();

    let fetcher = Arc::new(ImageFetcher::new(ImageFetcherConfig::default()).unwrap());
    let err = processor(fetcher)
        .composite_advanced(&photo.display().to_string(), &[], OutputFormat::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, WatermarkError::BaseImageLoad(ref msg) if msg.contains("disabled")));
}

/// Test: A plain-http logo is skipped, not fatal, when http is off
#[tokio::test]
async fn test_http_logo_skipped_when_disabled() {
    let fetcher = Arc::new(ImageFetcher::new(ImageFetcherConfig::default()).unwrap());
    let processor = processor(fetcher);

    let set = boothmark::watermark::parse_watermark_set(
        r#"[{"type":"logo","src":"http://insecure.example.com/logo.png","x":0,"y":0}]"#,
    )
    .unwrap();
    let base = data_uri(&png_bytes(80, 120, [9, 9, 9, 255]));

    let encoded = processor
        .composite_advanced(&base, &set, OutputFormat::Png)
        .await
        .unwrap();
    assert_eq!((encoded.width, encoded.height), (80, 120));
    assert_eq!(processor.metrics().element_failure_count("asset_load"), 1);
}

/// Test: Oversized payloads are rejected before decoding
#[tokio::test]
async fn test_size_limit_applies_to_base() {
    let fetcher = Arc::new(
        ImageFetcher::new(ImageFetcherConfig {
            max_image_bytes: 16,
            ..Default::default()
        })
        .unwrap(),
    );
    let base = data_uri(&png_bytes(200, 200, [1, 1, 1, 255]));

    let err = processor(fetcher)
        .composite_advanced(&base, &[], OutputFormat::Png)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

/// Test: A logo from an unresponsive host times out and is skipped
#[tokio::test]
async fn test_stalled_logo_times_out_and_is_skipped() {
    let url = stalling_server().await;
    let processor = processor(http_fetcher(1024 * 1024));

    let set = boothmark::watermark::parse_watermark_set(&format!(
        r#"[{{"type":"logo","src":"{}","x":0,"y":0}}]"#,
        url
    ))
    .unwrap();
    let base = data_uri(&png_bytes(80, 120, [9, 9, 9, 255]));

    let started = Instant::now();
    let encoded = processor
        .composite_advanced(&base, &set, OutputFormat::Png)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!((encoded.width, encoded.height), (80, 120));
    assert_eq!(processor.metrics().element_failure_count("asset_load"), 1);
}

/// Test: A base photo from an unresponsive host is fatal
#[tokio::test]
async fn test_stalled_base_is_fatal() {
    let url = stalling_server().await;

    let err = processor(http_fetcher(1024 * 1024))
        .composite_advanced(&url, &[], OutputFormat::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, WatermarkError::BaseImageLoad(_)));
}

/// Test: Non-success statuses are asset errors
#[tokio::test]
async fn test_http_404_is_asset_error() {
    let url = canned_server(
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        Vec::new(),
    )
    .await;

    let err = http_fetcher(1024 * 1024).fetch(&url).await.unwrap_err();
    assert!(matches!(err, WatermarkError::AssetLoad(ref msg) if msg.contains("404")));
}

/// Test: A logo served over plain http is decoded and cached
#[tokio::test]
async fn test_http_logo_loads_and_caches() {
    let body = png_bytes(6, 4, [0, 0, 255, 255]);
    let url = canned_server(
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        ),
        body,
    )
    .await;

    let fetcher = http_fetcher(1024 * 1024);
    let image = fetcher.fetch(&url).await.unwrap();

    assert_eq!((image.width(), image.height()), (6, 4));
    assert!(fetcher.is_cached(&url).await);
}

/// Test: A declared Content-Length over the cap is refused up front
#[tokio::test]
async fn test_http_content_length_over_limit() {
    let url = canned_server(
        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 1000000\r\n\r\n".to_string(),
        Vec::new(),
    )
    .await;

    let err = http_fetcher(1024).fetch(&url).await.unwrap_err();
    assert!(matches!(err, WatermarkError::AssetLoad(ref msg) if msg.contains("byte limit")));
}

/// Test: A body without Content-Length is cut off once it passes the cap
#[tokio::test]
async fn test_http_streamed_body_over_limit() {
    let url = canned_server(
        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nConnection: close\r\n\r\n".to_string(),
        vec![0u8; 4096],
    )
    .await;

    let err = http_fetcher(1024).fetch(&url).await.unwrap_err();
    assert!(matches!(err, WatermarkError::AssetLoad(ref msg) if msg.contains("byte limit")));
}
