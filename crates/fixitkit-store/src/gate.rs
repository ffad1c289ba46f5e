//! Write gate: check for a session before offering a write.
//!
//! This is a client-side convenience. The row-level security policies in
//! `supabase/migrations` are what actually refuse unauthenticated writes.

use crate::{StoreError, StoreResult};
use fixitkit_auth::{Session, SessionProvider};

/// Outcome of [`authorize_write`].
#[derive(Debug, Clone)]
pub enum WriteGate {
    /// A session is present; go ahead with the write.
    Proceed(Session),
    /// Nobody is signed in; show the sign-in prompt instead.
    PromptSignIn,
}

impl WriteGate {
    pub fn is_open(&self) -> bool {
        matches!(self, WriteGate::Proceed(_))
    }

    pub fn into_result(self) -> StoreResult<Session> {
        match self {
            WriteGate::Proceed(session) => Ok(session),
            WriteGate::PromptSignIn => Err(StoreError::SignInRequired),
        }
    }
}

/// Decide whether a write may be attempted. Makes no remote call.
pub fn authorize_write(provider: &SessionProvider) -> WriteGate {
    match provider.current_session() {
        Some(session) => WriteGate::Proceed(session),
        None => WriteGate::PromptSignIn,
    }
}
