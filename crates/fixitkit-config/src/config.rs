//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be set at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://fixitkit.supabase.co",
};

/// Default Supabase anon key (can be set at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_SUPABASE_URL: &str = "FIXITKIT_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "FIXITKIT_SUPABASE_ANON_KEY";
const ENV_LOG_LEVEL: &str = "FIXITKIT_LOG_LEVEL";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to expose).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
        }
    }
}

impl Config {
    /// Load configuration from the config file (if any), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = read(ENV_SUPABASE_URL) {
            self.supabase_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = read(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = key;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Check that the connection settings are usable.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.supabase_url()?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(CoreError::Config(format!(
                "supabase_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(CoreError::Config(
                "supabase_anon_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
