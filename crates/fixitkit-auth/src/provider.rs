//! The session provider: single owner of the current session.
//!
//! The session lives in a `watch` channel so every consumer observes the
//! same value. Callback listeners registered with
//! [`SessionProvider::on_session_change`] receive each transition together
//! with the event that caused it.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthPhase, RefreshConfig};
use crate::{AuthBackend, AuthError, AuthEvent, AuthResult, AuthStateChange, Session, User};
use fixitkit_storage::SessionVault;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

type Listener = Arc<dyn Fn(&AuthStateChange) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Registration returned by [`SessionProvider::on_session_change`].
///
/// The callback stays registered until this handle is dropped or
/// [`Subscription::unsubscribe`] is called.
#[must_use = "dropping a Subscription unregisters the callback"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owns the authoritative session and every transition of it.
pub struct SessionProvider {
    backend: Arc<dyn AuthBackend>,
    vault: SessionVault,
    fsm: Mutex<AuthMachine>,
    session_tx: watch::Sender<Option<Session>>,
    listeners: Arc<Mutex<Listeners>>,
    refresh_config: RefreshConfig,
    /// Held for the whole of a sign-in, sign-up, sign-out or refresh.
    session_lock: tokio::sync::Mutex<()>,
}

impl SessionProvider {
    pub fn new(backend: Arc<dyn AuthBackend>, vault: SessionVault) -> Self {
        Self::with_refresh_config(backend, vault, RefreshConfig::default())
    }

    pub fn with_refresh_config(
        backend: Arc<dyn AuthBackend>,
        vault: SessionVault,
        refresh_config: RefreshConfig,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            backend,
            vault,
            fsm: Mutex::new(AuthMachine::new()),
            session_tx,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            refresh_config,
            session_lock: tokio::sync::Mutex::new(()),
        }
    }

    // ==========================================
    // Read side
    // ==========================================

    pub fn current_session(&self) -> Option<Session> {
        self.session_tx.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session_tx.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_tx.borrow().is_some()
    }

    pub fn phase(&self) -> AuthPhase {
        AuthPhase::from(self.fsm.lock().state())
    }

    /// True while a restore, sign-in, sign-up or sign-out is in flight.
    pub fn loading(&self) -> bool {
        self.phase().is_loading()
    }

    /// Receiver that observes every session change.
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    /// Register a callback for session transitions.
    ///
    /// Callbacks run synchronously on the task that caused the change, in
    /// registration order.
    pub fn on_session_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthStateChange) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(callback)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    // ==========================================
    // Transitions
    // ==========================================

    fn transition(&self, input: &AuthMachineInput) -> AuthResult<AuthPhase> {
        let mut fsm = self.fsm.lock();
        let old_phase = AuthPhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_phase = AuthPhase::from(fsm.state());
        if old_phase != new_phase {
            debug!(old_phase = ?old_phase, new_phase = ?new_phase, "Auth phase transition");
        }
        Ok(new_phase)
    }

    /// Claim the session lock for a user-initiated sign-in, failing fast
    /// when another operation owns it.
    fn try_claim(&self) -> AuthResult<tokio::sync::MutexGuard<'_, ()>> {
        self.session_lock.try_lock().map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Another session operation is in progress ({:?})",
                self.phase()
            ))
        })
    }

    fn publish(&self, event: AuthEvent, session: Option<Session>) {
        self.session_tx.send_replace(session.clone());

        let change = AuthStateChange { event, session };
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(&change);
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.vault.save(&session.to_stored()) {
            warn!(error = %e, "Failed to persist session; it will not survive a restart");
        }
    }

    fn forget(&self) {
        if let Err(e) = self.vault.clear_session() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    // ==========================================
    // Operations
    // ==========================================

    /// Resolve the session persisted by a previous run.
    ///
    /// Runs the restore once; later calls return the current value without
    /// touching the network.
    pub async fn get_current_session(&self) -> AuthResult<Option<Session>> {
        if self.phase() != AuthPhase::Restoring {
            return Ok(self.current_session());
        }

        let stored = match self.vault.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read persisted session");
                self.transition(&AuthMachineInput::NoSession)?;
                self.publish(AuthEvent::InitialSession, None);
                return Err(e.into());
            }
        };

        let Some(stored) = stored else {
            info!("No persisted session");
            self.transition(&AuthMachineInput::NoSession)?;
            self.publish(AuthEvent::InitialSession, None);
            return Ok(None);
        };

        let session = Session::from(stored);
        let verified = if session.is_expiring() {
            info!(user_id = %session.user.id, "Persisted session expired, refreshing");
            self.refresh_with_backoff(&session.refresh_token).await
        } else {
            self.backend
                .get_user(&session.access_token)
                .await
                .map(|user| Session {
                    user,
                    ..session.clone()
                })
        };

        match verified {
            Ok(current) => {
                info!(user_id = %current.user.id, "Session restored");
                self.persist(&current);
                self.transition(&AuthMachineInput::SessionRestored)?;
                self.publish(AuthEvent::InitialSession, Some(current.clone()));
                Ok(Some(current))
            }
            Err(e) if e.is_transient() => {
                warn!(
                    user_id = %session.user.id,
                    error = %e,
                    "Could not reach auth service, keeping persisted session"
                );
                self.transition(&AuthMachineInput::SessionRestored)?;
                self.publish(AuthEvent::InitialSession, Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) => {
                warn!(user_id = %session.user.id, error = %e, "Persisted session rejected, clearing");
                self.forget();
                self.transition(&AuthMachineInput::NoSession)?;
                self.publish(AuthEvent::InitialSession, None);
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = validate_credentials(email, password)?;
        let _claim = self.try_claim()?;
        self.transition(&AuthMachineInput::Attempt)?;

        match self.backend.sign_up(&email, password).await {
            Ok(Some(session)) => Ok(self.complete_sign_in(session)?),
            Ok(None) => {
                info!(email = %email, "Sign up pending email confirmation");
                self.transition(&AuthMachineInput::AuthFailed)?;
                Err(AuthError::EmailConfirmationRequired { email })
            }
            Err(e) => {
                warn!(error = %e, "Sign up failed");
                self.transition(&AuthMachineInput::AuthFailed)?;
                Err(e)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = validate_credentials(email, password)?;
        let _claim = self.try_claim()?;
        self.transition(&AuthMachineInput::Attempt)?;

        match self.backend.sign_in_with_password(&email, password).await {
            Ok(session) => self.complete_sign_in(session),
            Err(e) => {
                warn!(error = %e, "Sign in failed");
                self.transition(&AuthMachineInput::AuthFailed)?;
                Err(e)
            }
        }
    }

    fn complete_sign_in(&self, session: Session) -> AuthResult<Session> {
        self.persist(&session);
        self.transition(&AuthMachineInput::AuthSucceeded)?;
        info!(user_id = %session.user.id, "Signed in");
        self.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Sign out. Without a session this is a local no-op.
    ///
    /// A background refresh in flight is waited out first. A re-sign-in or
    /// another sign-out in flight rejects the call.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if !self.is_authenticated() {
            debug!("Sign out requested without a session");
            return Ok(());
        }

        let phase = self.phase();
        if matches!(phase, AuthPhase::Reauthenticating | AuthPhase::SigningOut) {
            return Err(AuthError::InvalidStateTransition(format!(
                "Cannot sign out while {:?}",
                phase
            )));
        }

        let _guard = self.session_lock.lock().await;

        // A rejected refresh may have signed us out while we waited.
        let Some(session) = self.current_session() else {
            debug!("Session ended before sign out ran");
            return Ok(());
        };

        self.transition(&AuthMachineInput::SignOutRequested)?;

        match self.backend.sign_out(&session.access_token).await {
            Ok(()) => {}
            Err(e) if e.is_unauthorized() => {
                debug!(error = %e, "Session already revoked remotely");
            }
            Err(e) => {
                warn!(error = %e, "Sign out failed, keeping session");
                self.transition(&AuthMachineInput::SignOutFailed)?;
                return Err(e);
            }
        }

        self.forget();
        self.transition(&AuthMachineInput::SignOutComplete)?;
        info!(user_id = %session.user.id, "Signed out");
        self.publish(AuthEvent::SignedOut, None);
        Ok(())
    }

    /// Current session with a token valid for at least the expiry margin,
    /// refreshing first when needed.
    pub async fn valid_session(&self) -> AuthResult<Session> {
        let session = self.current_session().ok_or(AuthError::NotLoggedIn)?;
        if !session.is_expiring() {
            return Ok(session);
        }

        let _guard = self.session_lock.lock().await;

        // A refresh or re-sign-in may have replaced the session while we waited.
        let session = self.current_session().ok_or(AuthError::NotLoggedIn)?;
        if !session.is_expiring() {
            return Ok(session);
        }

        info!(user_id = %session.user.id, "Token expiring, refreshing");
        self.transition(&AuthMachineInput::TokenExpiring)?;

        match self.refresh_with_backoff(&session.refresh_token).await {
            Ok(refreshed) => {
                self.persist(&refreshed);
                self.transition(&AuthMachineInput::RefreshSucceeded)?;
                self.publish(AuthEvent::TokenRefreshed, Some(refreshed.clone()));
                Ok(refreshed)
            }
            Err(e) if e.is_transient() => {
                self.transition(&AuthMachineInput::RefreshDeferred)?;
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Refresh rejected, signing out locally");
                self.forget();
                self.transition(&AuthMachineInput::RefreshFailed)?;
                self.publish(AuthEvent::SignedOut, None);
                Err(e)
            }
        }
    }

    /// Access token valid for at least the expiry margin.
    pub async fn access_token(&self) -> AuthResult<String> {
        Ok(self.valid_session().await?.access_token)
    }

    async fn refresh_with_backoff(&self, refresh_token: &str) -> AuthResult<Session> {
        let max = self.refresh_config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max {
            match self.backend.refresh(refresh_token).await {
                Ok(session) => {
                    info!(user_id = %session.user.id, "Token refreshed");
                    return Ok(session);
                }
                Err(e) if e.is_transient() => {
                    if attempt + 1 < max {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = max,
                            delay_ms = delay.as_millis() as u64,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        warn!("Refresh failed after {} attempts", max);
        Err(last_error.unwrap_or(AuthError::RefreshExhausted(max)))
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidInput("a valid email is required".into()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password must not be empty".into()));
    }
    Ok(email.to_string())
}
