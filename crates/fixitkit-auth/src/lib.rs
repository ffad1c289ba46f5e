//! Session provider for the FixItKit client.
//!
//! [`SessionProvider`] owns the one authoritative [`Session`]. It talks to
//! the remote auth service through the [`AuthBackend`] trait
//! ([`SupabaseAuthClient`] in production), tracks in-flight work with a
//! rust-fsm state machine, and persists the session in a
//! [`fixitkit_storage::SessionVault`] so a restart resumes where it left off.
//!
//! ```rust,ignore
//! let backend = Arc::new(SupabaseAuthClient::from_config(&config)?);
//! let provider = Arc::new(SessionProvider::new(backend, create_session_vault(&paths)));
//! provider.get_current_session().await?;
//! let _sub = provider.on_session_change(|change| println!("{:?}", change.event));
//! ```

pub mod auth_fsm;
mod backend;
mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
mod provider;
mod session;
mod supabase_auth;

pub use auth_fsm::{AuthPhase, RefreshConfig};
pub use backend::AuthBackend;
pub use error::{AuthError, AuthResult};
pub use provider::{SessionProvider, Subscription};
pub use session::{AuthEvent, AuthStateChange, Session, User};
pub use supabase_auth::SupabaseAuthClient;
