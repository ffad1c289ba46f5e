//! Session and user types.

use chrono::{DateTime, Utc};
use fixitkit_storage::{is_expiring, SessionMeta, StoredSession};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// True when the access token expires within the refresh margin.
    pub fn is_expiring(&self) -> bool {
        is_expiring(self.expires_at, Utc::now())
    }

    pub(crate) fn to_stored(&self) -> StoredSession {
        StoredSession {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            meta: SessionMeta {
                user_id: self.user.id.clone(),
                email: self.user.email.clone(),
                expires_at: self.expires_at,
            },
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            user: User {
                id: stored.meta.user_id,
                email: stored.meta.email,
            },
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored.meta.expires_at,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Kind of session transition delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Payload passed to `on_session_change` callbacks.
#[derive(Debug, Clone)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}
