//! In-memory [`AuthBackend`] for tests.
//!
//! Accounts, tokens and revocations live in a map. Every call is counted,
//! failures can be queued per operation, and a call can be held open to
//! simulate a request that is still in flight.

use crate::{AuthBackend, AuthError, AuthResult, Session, User};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// Backend operation, for call counts and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOp {
    SignUp,
    SignIn,
    SignOut,
    GetUser,
    Refresh,
}

/// Handle on a call that will block until released.
#[derive(Clone)]
pub struct HeldCall {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Default for HeldCall {
    fn default() -> Self {
        Self::new()
    }
}

impl HeldCall {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    /// Called from inside the held operation: signal arrival, then block
    /// until released.
    pub async fn arrive(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    /// Wait until the held call has reached the backend.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

struct Account {
    user: User,
    password: String,
}

struct State {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, User>,
    refresh_tokens: HashMap<String, User>,
    failures: HashMap<AuthOp, VecDeque<AuthError>>,
    holds: HashMap<AuthOp, HeldCall>,
    calls: HashMap<AuthOp, usize>,
    next_id: u64,
    token_ttl: Duration,
    require_confirmation: bool,
}

/// Map-backed stand-in for the GoTrue service.
pub struct MemoryAuthBackend {
    state: Mutex<State>,
}

impl Default for MemoryAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                accounts: HashMap::new(),
                access_tokens: HashMap::new(),
                refresh_tokens: HashMap::new(),
                failures: HashMap::new(),
                holds: HashMap::new(),
                calls: HashMap::new(),
                next_id: 1,
                token_ttl: Duration::hours(1),
                require_confirmation: false,
            }),
        }
    }

    /// Register an account directly, without counting a call.
    pub fn add_user(&self, email: &str, password: &str) -> User {
        let mut state = self.state.lock();
        let user = User {
            id: format!("user-{}", state.next_id),
            email: Some(email.to_string()),
        };
        state.next_id += 1;
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Issue a session for an existing account without counting a call.
    pub fn issue_session(&self, email: &str) -> Option<Session> {
        let mut state = self.state.lock();
        let user = state.accounts.get(email)?.user.clone();
        Some(issue(&mut state, user))
    }

    /// Lifetime of sessions issued from now on.
    pub fn set_token_ttl(&self, ttl: Duration) {
        self.state.lock().token_ttl = ttl;
    }

    /// When set, sign-up creates the account but issues no session.
    pub fn require_email_confirmation(&self, required: bool) {
        self.state.lock().require_confirmation = required;
    }

    /// Fail the next call of `op` with `error`. Queued errors are used in order.
    pub fn fail_next(&self, op: AuthOp, error: AuthError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Block the next call of `op` until the returned handle is released.
    pub fn hold(&self, op: AuthOp) -> HeldCall {
        let held = HeldCall::new();
        self.state.lock().holds.insert(op, held.clone());
        held
    }

    /// Invalidate every token issued so far.
    pub fn revoke_all(&self) {
        let mut state = self.state.lock();
        state.access_tokens.clear();
        state.refresh_tokens.clear();
    }

    pub fn calls(&self, op: AuthOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Resolve a live access token the way row-level security would.
    pub fn user_for_token(&self, access_token: &str) -> Option<User> {
        self.state.lock().access_tokens.get(access_token).cloned()
    }

    async fn enter(&self, op: AuthOp) -> AuthResult<()> {
        let held = {
            let mut state = self.state.lock();
            *state.calls.entry(op).or_insert(0) += 1;
            state.holds.remove(&op)
        };

        if let Some(held) = held {
            held.arrive().await;
        }

        let failure = self
            .state
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn issue(state: &mut State, user: User) -> Session {
    let n = state.next_id;
    state.next_id += 1;

    let session = Session {
        user: user.clone(),
        access_token: format!("access-{}", n),
        refresh_token: format!("refresh-{}", n),
        expires_at: Utc::now() + state.token_ttl,
    };
    state
        .access_tokens
        .insert(session.access_token.clone(), user.clone());
    state
        .refresh_tokens
        .insert(session.refresh_token.clone(), user);
    session
}

#[async_trait]
impl AuthBackend for MemoryAuthBackend {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>> {
        self.enter(AuthOp::SignUp).await?;

        if password.len() < 6 {
            return Err(AuthError::Api {
                status: 422,
                message: "Password should be at least 6 characters".into(),
            });
        }

        let require_confirmation = {
            let state = self.state.lock();
            if state.accounts.contains_key(email) {
                return Err(AuthError::Api {
                    status: 422,
                    message: "User already registered".into(),
                });
            }
            state.require_confirmation
        };

        self.add_user(email, password);
        if require_confirmation {
            return Ok(None);
        }
        Ok(self.issue_session(email))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.enter(AuthOp::SignIn).await?;

        let mut state = self.state.lock();
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(AuthError::InvalidCredentials(
                    "Invalid login credentials".into(),
                ))
            }
        };
        Ok(issue(&mut state, user))
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        self.enter(AuthOp::SignOut).await?;

        let mut state = self.state.lock();
        match state.access_tokens.remove(access_token) {
            Some(user) => {
                state.refresh_tokens.retain(|_, owner| owner.id != user.id);
                Ok(())
            }
            None => Err(AuthError::Api {
                status: 401,
                message: "invalid JWT".into(),
            }),
        }
    }

    async fn get_user(&self, access_token: &str) -> AuthResult<User> {
        self.enter(AuthOp::GetUser).await?;

        self.state
            .lock()
            .access_tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| AuthError::SessionInvalid("invalid JWT".into()))
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<Session> {
        self.enter(AuthOp::Refresh).await?;

        let mut state = self.state.lock();
        let user = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AuthError::TokenRefresh("Invalid Refresh Token".into()))?;
        Ok(issue(&mut state, user))
    }
}
