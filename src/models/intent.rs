//! Durable intent records
//!
//! A record is written before the operation that may destroy in-memory state
//! (opening a popup, navigating for a redirect) and is always written or
//! removed as a whole unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of sign-in flow an intent record describes
///
/// Each kind is stored under its own key so clearing a popup attempt never
/// clears a genuine redirect record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    PopupPending,
    RedirectPending,
}

impl FlowKind {
    pub const ALL: [FlowKind; 2] = [FlowKind::PopupPending, FlowKind::RedirectPending];

    /// Storage key suffix for this kind
    #[must_use]
    pub fn key_suffix(self) -> &'static str {
        match self {
            Self::PopupPending => "popup_pending",
            Self::RedirectPending => "redirect_pending",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PopupPending => write!(f, "popup"),
            Self::RedirectPending => write!(f, "redirect"),
        }
    }
}

/// Durable marker that a flow was started and not yet confirmed complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIntentRecord {
    pub kind: FlowKind,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl AuthIntentRecord {
    #[must_use]
    pub fn new(kind: FlowKind, created_at: i64) -> Self {
        Self { kind, created_at }
    }

    /// Age of the record at `now_ms`; clock skew into the past counts as zero
    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.created_at).max(0)
    }

    /// A record older than `max_age_ms` is abandoned
    #[must_use]
    pub fn is_stale(&self, now_ms: i64, max_age_ms: i64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }
}
