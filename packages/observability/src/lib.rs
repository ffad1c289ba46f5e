//! # Observability
//!
//! Structured logging for the FixItKit workspace.
//!
//! Crates are **log producers** only. They use the standard `tracing` macros
//! and never decide where output goes. The binary calls
//! `observability::init_with_config()` once at startup, which installs:
//!
//! - a JSONL file layer (`~/.fixitkit/logs/fixitkit.jsonl` by default), one
//!   object per line with timestamp, level, service, pid, target, message and
//!   structured fields
//! - an optional compact stderr layer for interactive feedback
//!
//! Fields whose names look like credentials (`password`, `access_token`, ...)
//! are redacted before they reach any sink.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "cli".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file_writer;
mod json_layer;

use file_writer::WriterFactory;
use json_layer::JsonLayer;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_writer::LogFileWriter;
pub use json_layer::{is_sensitive_field, LogEntry, REDACTED};

/// Name of the per-user directory that holds logs and local state.
pub const BASE_DIR_NAME: &str = ".fixitkit";

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "cli").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.fixitkit/logs/fixitkit.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default log file location, or `None` when no home directory exists.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(BASE_DIR_NAME)
            .join("logs")
            .join("fixitkit.jsonl")
    })
}

/// Initialize logging with default settings for a service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// If the log file cannot be opened, file output is skipped and a stderr
/// layer is installed instead so that logs are never silently lost.
/// Calling this more than once is a no-op after the first call.
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().or_else(default_log_path);

    let file_layer = log_path.as_ref().and_then(|path| {
        match LogFileWriter::new(path) {
            Ok(writer) => Some(
                JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                    .with_filter(env_filter(&config.default_level)),
            ),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    let stderr_layer = if config.also_stderr || file_layer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?log_path,
            "observability initialized"
        );
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
