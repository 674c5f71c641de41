// Logging tests: subscriber installation and filter construction

use boothmark::config::{LogFormat, LoggingConfig};
use boothmark::logging::{build_filter, init_subscriber};

/// Test: Can initialize tracing subscriber
///
/// Initialization must succeed, and a second call (tests share one process,
/// and the CLI may be embedded) must be a harmless no-op rather than an error.
#[test]
fn test_can_initialize_tracing_subscriber() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
    };

    let result = init_subscriber(&config);
    assert!(result.is_ok(), "Failed to initialize tracing subscriber");

    tracing::info!(component = "logging_tests", "subscriber installed");

    let result = init_subscriber(&LoggingConfig::default());
    assert!(result.is_ok(), "Second initialization should be a no-op");
}

/// Test: Per-target directives are accepted as the level
#[test]
fn test_filter_accepts_target_directives() {
    let config = LoggingConfig {
        level: "boothmark::watermark=trace,info".to_string(),
        format: LogFormat::Pretty,
    };
    assert!(build_filter(&config).is_ok());
}
