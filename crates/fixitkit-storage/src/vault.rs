//! Persisted auth session.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds of remaining validity below which a session counts as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Non-secret part of a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Everything needed to resume a session after a restart.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub meta: SessionMeta,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("meta", &self.meta)
            .finish()
    }
}

/// Reads and writes the session through a [`SecureStorage`] backend.
pub struct SessionVault {
    storage: Box<dyn SecureStorage>,
}

impl SessionVault {
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    pub fn get_session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            None => Ok(None),
        }
    }

    /// True when both tokens and the metadata are present.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.storage.has(StorageKeys::ACCESS_TOKEN)?
            && self.storage.has(StorageKeys::REFRESH_TOKEN)?
            && self.storage.has(StorageKeys::SESSION_META)?)
    }

    /// A missing session is reported as expired.
    pub fn is_session_expired(&self) -> StorageResult<bool> {
        Ok(match self.get_session_meta()? {
            Some(meta) => is_expiring(meta.expires_at, Utc::now()),
            None => true,
        })
    }

    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        user_id: &str,
        email: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let meta = SessionMeta {
            user_id: user_id.to_string(),
            email: email.map(String::from),
            expires_at,
        };
        let json =
            serde_json::to_string(&meta).map_err(|e| StorageError::Encoding(e.to_string()))?;

        self.storage.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        self.storage.set(StorageKeys::REFRESH_TOKEN, refresh_token)?;
        self.storage.set(StorageKeys::SESSION_META, &json)?;
        Ok(())
    }

    pub fn save(&self, session: &StoredSession) -> StorageResult<()> {
        self.set_session(
            &session.access_token,
            &session.refresh_token,
            &session.meta.user_id,
            session.meta.email.as_deref(),
            session.meta.expires_at,
        )
    }

    /// Load the full session. Partial leftovers read as no session.
    pub fn load(&self) -> StorageResult<Option<StoredSession>> {
        let access_token = self.get_access_token()?;
        let refresh_token = self.get_refresh_token()?;
        let meta = self.get_session_meta()?;

        Ok(match (access_token, refresh_token, meta) {
            (Some(access_token), Some(refresh_token), Some(meta)) => Some(StoredSession {
                access_token,
                refresh_token,
                meta,
            }),
            _ => None,
        })
    }

    /// Remove every session key. Keeps going past individual failures and
    /// reports the first one.
    pub fn clear_session(&self) -> StorageResult<()> {
        let mut first_error = None;
        for key in [
            StorageKeys::ACCESS_TOKEN,
            StorageKeys::REFRESH_TOKEN,
            StorageKeys::SESSION_META,
        ] {
            if let Err(e) = self.storage.delete(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Whether `expires_at` falls within the expiry margin of `now`.
pub fn is_expiring(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at.signed_duration_since(now).num_seconds() < EXPIRY_MARGIN_SECS
}
