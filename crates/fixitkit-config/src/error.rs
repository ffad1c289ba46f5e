//! Errors raised while locating the FixItKit home and loading `config.json`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Connection settings that cannot reach a project: a non-http(s)
    /// `supabase_url` or an empty anon key, whether from `config.json` or
    /// the `FIXITKIT_SUPABASE_*` overrides.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading `config.json` or creating the FixItKit home failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `supabase_url` does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// `config.json` is not valid JSON or has the wrong shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory and `FIXITKIT_HOME` unset, so there is nowhere to
    /// keep the session or `config.json`.
    #[error("Path error: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
