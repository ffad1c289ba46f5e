//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Rejected locally before any request was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Account created, but the provider wants the address confirmed first
    #[error("Check {email} for a confirmation link before signing in")]
    EmailConfirmationRequired { email: String },

    /// Token refresh rejected
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// No session
    #[error("Not logged in")]
    NotLoggedIn,

    /// Session was invalidated server-side (revoked, logged out elsewhere, etc.)
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Another auth operation is still running
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Non-success response from the auth service
    #[error("Auth service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] fixitkit_storage::StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] fixitkit_config::CoreError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable
    /// - HTTP errors with 5xx status codes
    /// - Connection timeouts
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable => true,
            AuthError::Api { status, .. } => *status >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// True when the server says the token is no longer any good.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AuthError::SessionInvalid(_) => true,
            AuthError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_network_unavailable() {
        assert!(AuthError::NetworkUnavailable.is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = AuthError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        assert!(!AuthError::InvalidCredentials("bad password".to_string()).is_transient());
        assert!(!AuthError::NotLoggedIn.is_transient());
        assert!(!AuthError::RefreshExhausted(3).is_transient());
        assert!(!AuthError::Api {
            status: 422,
            message: "weak password".into()
        }
        .is_transient());
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(AuthError::SessionInvalid("revoked".into()).is_unauthorized());
        assert!(AuthError::Api {
            status: 401,
            message: String::new()
        }
        .is_unauthorized());
        assert!(AuthError::Api {
            status: 403,
            message: String::new()
        }
        .is_unauthorized());
        assert!(!AuthError::NetworkUnavailable.is_unauthorized());
    }

    #[test]
    fn test_email_confirmation_message_names_address() {
        let err = AuthError::EmailConfirmationRequired {
            email: "sam@example.com".into(),
        };
        assert!(err.to_string().contains("sam@example.com"));
    }
}
