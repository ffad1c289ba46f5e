//! Local session storage for the FixItKit client.
//!
//! - [`FileStorage`]: JSON map in `~/.fixitkit/session.json`, owner-only
//! - [`MemoryStorage`]: process-local, for tests and throwaway runs
//!
//! [`SessionVault`] layers the auth session layout on top of either.

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;
pub use vault::{is_expiring, SessionMeta, SessionVault, StoredSession, EXPIRY_MARGIN_SECS};

use fixitkit_config::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default on-disk storage under the given paths.
pub fn create_storage(paths: &Paths) -> Box<dyn SecureStorage> {
    Box::new(FileStorage::new(paths.session_file()))
}

/// Create a [`SessionVault`] over the default on-disk storage.
pub fn create_session_vault(paths: &Paths) -> SessionVault {
    SessionVault::new(create_storage(paths))
}
