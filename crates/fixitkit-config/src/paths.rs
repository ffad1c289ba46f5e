//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Name of the base directory under the user's home.
const BASE_DIR_NAME: &str = ".fixitkit";
/// Environment variable that relocates the base directory.
const ENV_HOME: &str = "FIXITKIT_HOME";

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for local state (~/.fixitkit)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance.
    ///
    /// Uses `$FIXITKIT_HOME` when set, otherwise `~/.fixitkit`.
    pub fn new() -> CoreResult<Self> {
        if let Some(custom) = std::env::var_os(ENV_HOME).filter(|v| !v.is_empty()) {
            return Ok(Self::with_base_dir(PathBuf::from(custom)));
        }

        let home = dirs::home_dir().ok_or_else(|| {
            CoreError::Path("Could not determine home directory; set FIXITKIT_HOME".to_string())
        })?;

        Ok(Self::with_base_dir(home.join(BASE_DIR_NAME)))
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.fixitkit).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.fixitkit/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persisted session file path (~/.fixitkit/session.json).
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Get the logs directory (~/.fixitkit/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.fixitkit/logs/fixitkit.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("fixitkit.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
