#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

//! Sign-in flow reconciliation for a federated identity provider
//!
//! Popup and redirect flows record a durable intent before they start, so a
//! process that comes up mid-flow can tell "still signing in" apart from
//! "nobody is signed in" and only fall back to an anonymous session in the
//! latter case.

/// Version of the authsync library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod flow;
pub mod intent;
pub mod models;
pub mod provider;
pub mod session;
pub mod settings;
pub mod storage;
pub mod utils;

// Test utilities shared by unit and integration tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::{AuthErrorKind, AuthFailure, ErrorClass, ProviderError};
pub use flow::FlowOrchestrator;
pub use intent::IntentStore;
pub use models::{AuthIntentRecord, FlowKind, Identity, OutcomeStatus, SignInOutcome};
pub use provider::{IdentityProvider, ProviderPolicy};
pub use session::{SessionError, SessionLifecycle, SessionPhase, SessionState};
pub use settings::AuthsyncSettings;
