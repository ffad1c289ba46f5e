//! Error types for record store operations.

use fixitkit_auth::AuthError;
use thiserror::Error;

/// Error type for entry store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No session. Raised locally before any request is made.
    #[error("Sign in required")]
    SignInRequired,

    /// Rejected locally before any request was made.
    #[error("Invalid record: {0}")]
    Validation(String),

    /// No row matched the identifying filter for the current user.
    #[error("No {table} record with id {id}")]
    NotFound { table: &'static str, id: String },

    /// The signed-in user changed while the call was in flight; its result
    /// was discarded.
    #[error("Session changed while the request was in flight")]
    IdentityChanged,

    /// Supabase returned a non-success HTTP status.
    ///
    /// Common causes: expired JWT, RLS policy violation, constraint violation.
    #[error("Supabase error: {status} - {message}")]
    Remote { status: u16, message: String },

    /// Success status but a body that does not match the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Could not obtain a usable access token.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Network or transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl StoreError {
    /// True for the local "requires sign-in" rejection, as opposed to a
    /// failed remote operation.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, StoreError::SignInRequired)
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Remote { status, .. } => *status >= 500,
            StoreError::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            StoreError::Auth(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Convenience Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display() {
        let err = StoreError::Remote {
            status: 401,
            message: "JWT expired".to_string(),
        };
        assert_eq!(err.to_string(), "Supabase error: 401 - JWT expired");
    }

    #[test]
    fn sign_in_required_is_distinct_from_remote_failures() {
        assert!(StoreError::SignInRequired.requires_sign_in());
        assert!(!StoreError::Remote {
            status: 401,
            message: String::new()
        }
        .requires_sign_in());
        assert!(!StoreError::Auth(AuthError::NotLoggedIn).requires_sign_in());
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Remote {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!StoreError::Remote {
            status: 409,
            message: String::new()
        }
        .is_transient());
        assert!(StoreError::Auth(AuthError::NetworkUnavailable).is_transient());
        assert!(!StoreError::SignInRequired.is_transient());
    }
}
