//! Logging initialization.
//!
//! Thin wrapper over the observability crate so the binary has a single
//! call to make at startup.

use crate::Paths;
use observability::LogConfig;

/// Initialize the logging system.
///
/// Writes JSONL to `<base>/logs/fixitkit.jsonl`. `RUST_LOG` takes precedence
/// over `level`. Stderr output is enabled only when `also_stderr` is set, so
/// that command output stays clean by default.
pub fn init_logging(paths: &Paths, level: &str, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: "fixitkit-cli".into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
