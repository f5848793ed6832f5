//! Session state published to the application shell

use crate::errors::AuthFailure;
use crate::models::Identity;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The startup sequence has not reached a definitive answer yet
    Initializing,
    Ready,
}

/// Error surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A sign-in attempt failed; dismissible, with a retry affordance
    #[error("sign-in failed: {0}")]
    SignIn(AuthFailure),
    /// Anonymous session creation failed; not retried automatically
    #[error("authentication unavailable: {0}")]
    Fatal(AuthFailure),
}

impl SessionError {
    #[must_use]
    pub fn failure(&self) -> &AuthFailure {
        match self {
            SessionError::SignIn(failure) | SessionError::Fatal(failure) => failure,
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Fatal(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    pub error: Option<SessionError>,
}

impl SessionState {
    #[must_use]
    pub fn initializing() -> Self {
        Self {
            phase: SessionPhase::Initializing,
            identity: None,
            error: None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    /// Signed in with a non-anonymous identity
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| !identity.is_anonymous)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initializing()
    }
}
