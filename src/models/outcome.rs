//! Transient results of flow-completing operations

use crate::errors::AuthFailure;
use crate::models::Identity;

/// How a flow-completing operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// A provider-linked identity is now current
    Success,
    /// The user aborted; not an error and never a trigger for fallback
    Cancelled,
    /// Navigation for a redirect flow has begun; the next process reconciles it
    RedirectStarted,
    /// Nothing was attempted (cold start with no flow in flight)
    Neutral,
    /// The attempt failed and the failure should be surfaced
    Failed,
}

/// Outcome of `sign_in` or `reconcile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    pub status: OutcomeStatus,
    /// True iff a non-anonymous, provider-linked identity is now current
    pub identity_established: bool,
    /// True iff an intent record existed when this outcome was computed
    pub was_flow_pending: bool,
    pub error: Option<AuthFailure>,
    /// Identity current at the time the outcome was computed
    pub identity: Option<Identity>,
}

impl SignInOutcome {
    #[must_use]
    pub fn success(identity: Identity, was_flow_pending: bool) -> Self {
        Self {
            status: OutcomeStatus::Success,
            identity_established: !identity.is_anonymous,
            was_flow_pending,
            error: None,
            identity: Some(identity),
        }
    }

    #[must_use]
    pub fn cancelled(was_flow_pending: bool, identity: Option<Identity>) -> Self {
        Self {
            status: OutcomeStatus::Cancelled,
            identity_established: false,
            was_flow_pending,
            error: None,
            identity,
        }
    }

    #[must_use]
    pub fn redirect_started(identity: Option<Identity>) -> Self {
        Self {
            status: OutcomeStatus::RedirectStarted,
            identity_established: false,
            was_flow_pending: true,
            error: None,
            identity,
        }
    }

    /// Nothing expected, nothing happened; reflects whatever identity exists
    #[must_use]
    pub fn neutral(identity: Option<Identity>, identity_established: bool) -> Self {
        Self {
            status: OutcomeStatus::Neutral,
            identity_established,
            was_flow_pending: false,
            error: None,
            identity,
        }
    }

    #[must_use]
    pub fn failed(failure: AuthFailure, was_flow_pending: bool, identity: Option<Identity>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            identity_established: false,
            was_flow_pending,
            error: Some(failure),
            identity,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == OutcomeStatus::Cancelled
    }

    /// A flow was attempted and definitely did not complete
    #[must_use]
    pub fn is_definite_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}
