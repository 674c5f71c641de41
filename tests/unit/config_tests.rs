// Configuration tests: YAML loading through the public API

use boothmark::config::{Config, LogFormat};
use boothmark::watermark::{ImageFetcherConfig, OutputFormat};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(yaml.as_bytes()).expect("write config");
    file.flush().expect("flush config");
    file
}

/// Test: A full configuration file round-trips into every section
#[test]
fn test_full_config_file() {
    let file = write_config(
        r#"
fetcher:
  timeout_ms: 1500
  max_cache_entries: 0
  cache_ttl_seconds: 60
  allow_http: true
  allow_file_sources: true
  max_image_bytes: 1048576
fonts:
  load_system_fonts: false
  default_family: Inter
output:
  jpeg_quality: 85
preview:
  width: 300
  height: 450
logging:
  level: warn
  format: json
"#,
    );

    let config = Config::from_file(file.path()).expect("config loads");
    assert!(config.validate().is_ok());

    assert_eq!(config.fetcher.timeout_ms, 1500);
    assert!(config.fetcher.allow_file_sources);
    assert!(!config.fonts.load_system_fonts);
    assert_eq!(config.fonts.default_family.as_deref(), Some("Inter"));
    assert_eq!(config.output.jpeg_format(), OutputFormat::Jpeg { quality: 85 });
    assert_eq!((config.preview.width, config.preview.height), (300, 450));
    assert_eq!(config.logging.format, LogFormat::Json);
}

/// Test: Fetcher section converts into the loader's runtime config
#[test]
fn test_fetcher_config_conversion() {
    let file = write_config(
        r#"
fetcher:
  timeout_ms: 2500
  cache_ttl_seconds: 90
  allow_http: true
"#,
    );
    let config = Config::from_file(file.path()).expect("config loads");
    let runtime = ImageFetcherConfig::from(&config.fetcher);

    assert_eq!(runtime.timeout, Duration::from_millis(2500));
    assert_eq!(runtime.cache_ttl, Duration::from_secs(90));
    assert_eq!(runtime.max_cache_entries, 100);
    assert!(runtime.allow_http);
    assert!(!runtime.allow_file_sources);
}

/// Test: Sections may be omitted independently
#[test]
fn test_partial_config_keeps_other_defaults() {
    let file = write_config("preview:\n  width: 200\n");
    let config = Config::from_file(file.path()).expect("config loads");

    assert_eq!(config.preview.width, 200);
    assert_eq!(config.preview.height, 600);
    assert_eq!(config.output.jpeg_quality, 95);
    assert_eq!(config.fetcher.timeout_ms, 5000);
}

/// Test: Out-of-range values parse but fail validation
#[test]
fn test_invalid_quality_fails_validation() {
    let file = write_config("output:\n  jpeg_quality: 101\n");
    let config = Config::from_file(file.path()).expect("config parses");
    let err = config.validate().unwrap_err();
    assert!(err.contains("jpeg_quality"), "unexpected error: {}", err);
}

/// Test: Unknown log formats are rejected at parse time
#[test]
fn test_unknown_log_format_is_rejected() {
    let file = write_config("logging:\n  format: xml\n");
    assert!(Config::from_file(file.path()).is_err());
}
