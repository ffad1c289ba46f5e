//! Authentication phases as a rust-fsm state machine.
//!
//! ```text
//!            ┌────────────┐
//!            │ Restoring  │ (initial)
//!            └─────┬──────┘
//!     NoSession    │    SessionRestored
//!        ┌─────────┴──────────┐
//!        ▼                    ▼
//! ┌────────────┐  Attempt  ┌──────────────┐
//! │ Anonymous  │ ────────► │Authenticating│
//! └────────────┘ ◄──────── └──────┬───────┘
//!        ▲         AuthFailed     │ AuthSucceeded
//!        │                        ▼
//!        │  SignOutComplete ┌──────────────┐ TokenExpiring ┌────────────┐
//!        ├───────────────── │Authenticated │ ────────────► │ Refreshing │
//!        │                  └──────────────┘ ◄──────────── └────────────┘
//!        │                    │        ▲     RefreshSucceeded/Deferred
//!        │   SignOutRequested │        │ SignOutFailed
//!        │                    ▼        │
//!        │                  ┌──────────────┐
//!        └───────────────── │  SigningOut  │
//!                           └──────────────┘
//! ```
//!
//! `Reauthenticating` is the sign-in-while-signed-in detour: success or
//! failure both land back in `Authenticated`.
//!
//! The machine only ever sees one in-flight operation. `SessionProvider`
//! serializes them behind a single lock: a sign-out that arrives during
//! `Refreshing` waits for the refresh to settle, and a token refresh that
//! comes due during `Reauthenticating` waits for the new session and then
//! re-checks it. Overlapping sign-ins are rejected instead of queued.

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Restoring)

    Restoring => {
        NoSession => Anonymous,
        SessionRestored => Authenticated
    },
    Anonymous => {
        Attempt => Authenticating
    },
    Authenticating => {
        AuthSucceeded => Authenticated,
        AuthFailed => Anonymous
    },
    Authenticated => {
        Attempt => Reauthenticating,
        TokenExpiring => Refreshing,
        SignOutRequested => SigningOut
    },
    Reauthenticating => {
        AuthSucceeded => Authenticated,
        AuthFailed => Authenticated
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        // Transient failure: keep the session, try again on next use
        RefreshDeferred => Authenticated,
        RefreshFailed => Anonymous
    },
    SigningOut => {
        SignOutComplete => Anonymous,
        SignOutFailed => Authenticated
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Public view of the auth state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// Persisted session not yet checked.
    Restoring,
    Anonymous,
    /// Sign-in or sign-up in flight with no prior session.
    Authenticating,
    Authenticated,
    /// Sign-in or sign-up in flight while another session is active.
    Reauthenticating,
    Refreshing,
    SigningOut,
}

impl AuthPhase {
    /// True for the phases that should disable auth controls.
    ///
    /// Refreshing happens behind the caller's back and does not count.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            AuthPhase::Restoring
                | AuthPhase::Authenticating
                | AuthPhase::Reauthenticating
                | AuthPhase::SigningOut
        )
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthPhase::Authenticated | AuthPhase::Reauthenticating | AuthPhase::Refreshing
        )
    }
}

impl From<&AuthMachineState> for AuthPhase {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Restoring => AuthPhase::Restoring,
            AuthMachineState::Anonymous => AuthPhase::Anonymous,
            AuthMachineState::Authenticating => AuthPhase::Authenticating,
            AuthMachineState::Authenticated => AuthPhase::Authenticated,
            AuthMachineState::Reauthenticating => AuthPhase::Reauthenticating,
            AuthMachineState::Refreshing => AuthPhase::Refreshing,
            AuthMachineState::SigningOut => AuthPhase::SigningOut,
        }
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Delay before retrying after the given (0-indexed) attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> AuthMachine {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        machine.consume(&AuthMachineInput::Attempt).unwrap();
        machine.consume(&AuthMachineInput::AuthSucceeded).unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_restoring() {
        let machine = AuthMachine::new();
        assert_eq!(*machine.state(), AuthMachineState::Restoring);
        assert!(AuthPhase::from(machine.state()).is_loading());
    }

    #[test]
    fn test_restore_outcomes() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::SessionRestored).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);

        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_cannot_sign_in_before_restore_finishes() {
        let mut machine = AuthMachine::new();
        assert!(machine.consume(&AuthMachineInput::Attempt).is_err());
    }

    #[test]
    fn test_failed_sign_in_returns_to_anonymous() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        machine.consume(&AuthMachineInput::Attempt).unwrap();
        machine.consume(&AuthMachineInput::AuthFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_overlapping_attempt_is_rejected() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        machine.consume(&AuthMachineInput::Attempt).unwrap();
        assert!(machine.consume(&AuthMachineInput::Attempt).is_err());
        assert!(machine
            .consume(&AuthMachineInput::SignOutRequested)
            .is_err());
    }

    #[test]
    fn test_failed_reauthentication_keeps_session() {
        let mut machine = signed_in();
        machine.consume(&AuthMachineInput::Attempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Reauthenticating);
        machine.consume(&AuthMachineInput::AuthFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_refresh_paths() {
        let mut machine = signed_in();
        machine.consume(&AuthMachineInput::TokenExpiring).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Refreshing);
        machine.consume(&AuthMachineInput::RefreshDeferred).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);

        machine.consume(&AuthMachineInput::TokenExpiring).unwrap();
        machine.consume(&AuthMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_sign_out_paths() {
        let mut machine = signed_in();
        machine.consume(&AuthMachineInput::SignOutRequested).unwrap();
        machine.consume(&AuthMachineInput::SignOutFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);

        machine.consume(&AuthMachineInput::SignOutRequested).unwrap();
        machine.consume(&AuthMachineInput::SignOutComplete).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_sign_out_requires_session() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        assert!(machine
            .consume(&AuthMachineInput::SignOutRequested)
            .is_err());
    }

    #[test]
    fn test_loading_phases() {
        assert!(AuthPhase::Restoring.is_loading());
        assert!(AuthPhase::Authenticating.is_loading());
        assert!(AuthPhase::Reauthenticating.is_loading());
        assert!(AuthPhase::SigningOut.is_loading());
        assert!(!AuthPhase::Anonymous.is_loading());
        assert!(!AuthPhase::Authenticated.is_loading());
        assert!(!AuthPhase::Refreshing.is_loading());
    }

    #[test]
    fn test_refresh_config_delay_exponential_backoff() {
        let config = RefreshConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(64), Duration::from_millis(5000));
    }
}
