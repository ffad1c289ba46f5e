//! Remote auth provider seam.

use crate::{AuthResult, Session, User};
use async_trait::async_trait;

/// Operations the session provider needs from the remote auth service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Create an account. `None` means the account exists but no session
    /// was issued (email confirmation pending).
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;

    /// Look up the user behind `access_token`. Rejects revoked tokens.
    async fn get_user(&self, access_token: &str) -> AuthResult<User>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<Session>;
}
