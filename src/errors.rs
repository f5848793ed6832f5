//! Provider error surface and its classification
//!
//! Every provider failure, whether it came from a popup or from a redirect
//! result, goes through [`ErrorClass::classify`]. The recovery rules live in
//! one place (`flow::recovery`) and only ever see an `ErrorClass`.

use crate::models::Credential;
use std::fmt;
use thiserror::Error;

/// Error codes reported by the identity provider
pub mod codes {
    pub const POPUP_BLOCKED: &str = "auth/popup-blocked";
    pub const OPERATION_NOT_SUPPORTED: &str = "auth/operation-not-supported-in-this-environment";
    pub const POPUP_CLOSED_BY_USER: &str = "auth/popup-closed-by-user";
    pub const CANCELLED_POPUP_REQUEST: &str = "auth/cancelled-popup-request";
    pub const USER_CANCELLED: &str = "auth/user-cancelled";
    pub const CREDENTIAL_ALREADY_IN_USE: &str = "auth/credential-already-in-use";
    pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";
    pub const INTERNAL_ERROR: &str = "auth/internal-error";
}

/// Raw error returned by an identity-provider operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    /// Credential attached to credential-already-in-use errors
    pub credential: Option<Credential>,
}

impl ProviderError {
    #[must_use]
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            credential: None,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// Closed classification of provider errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// The environment prevented the requested flow
    Blocked,
    /// The user closed the popup or another popup superseded it
    Cancelled,
    /// The credential already belongs to a different account
    Conflict(Credential),
    /// Network or unknown failure
    Transient,
}

impl ErrorClass {
    #[must_use]
    pub fn classify(error: &ProviderError) -> Self {
        match error.code.as_str() {
            codes::POPUP_BLOCKED | codes::OPERATION_NOT_SUPPORTED => Self::Blocked,
            codes::POPUP_CLOSED_BY_USER | codes::CANCELLED_POPUP_REQUEST | codes::USER_CANCELLED => {
                Self::Cancelled
            }
            codes::CREDENTIAL_ALREADY_IN_USE => match &error.credential {
                Some(credential) => Self::Conflict(credential.clone()),
                // Nothing to merge toward
                None => Self::Transient,
            },
            _ => Self::Transient,
        }
    }

    #[must_use]
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::Blocked => AuthErrorKind::Blocked,
            Self::Cancelled => AuthErrorKind::Cancelled,
            Self::Conflict(_) => AuthErrorKind::Conflict,
            Self::Transient => AuthErrorKind::Transient,
        }
    }
}

/// Error taxonomy used for surfaced failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Blocked,
    Cancelled,
    Conflict,
    Transient,
    /// Reconciliation exceeded its budget while a flow was known pending
    Timeout,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::Blocked => write!(f, "blocked"),
            AuthErrorKind::Cancelled => write!(f, "cancelled"),
            AuthErrorKind::Conflict => write!(f, "conflict"),
            AuthErrorKind::Transient => write!(f, "transient"),
            AuthErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// User-visible sign-in failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct AuthFailure {
    pub kind: AuthErrorKind,
    /// Provider error code, when the failure came from the provider
    pub code: Option<String>,
    pub message: String,
}

impl AuthFailure {
    #[must_use]
    pub fn from_provider(kind: AuthErrorKind, error: &ProviderError) -> Self {
        Self {
            kind,
            code: Some(error.code.clone()),
            message: error.message.clone(),
        }
    }

    /// A redirect was pending but no identity arrived within the budget
    #[must_use]
    pub fn redirect_incomplete() -> Self {
        Self {
            kind: AuthErrorKind::Timeout,
            code: None,
            message: "redirect sign-in did not complete".to_string(),
        }
    }

    /// Whether the shell should offer a retry affordance
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            AuthErrorKind::Transient | AuthErrorKind::Timeout | AuthErrorKind::Blocked
        )
    }
}
