//! Core data types shared across the sign-in flows
//!
//! - [`identity`] - the provider-owned identity handle and credentials
//! - [`intent`] - durable records describing an in-flight sign-in attempt
//! - [`outcome`] - transient results returned by flow-completing operations

pub mod identity;
pub mod intent;
pub mod outcome;

pub use identity::{Credential, FlowOperation, Identity, RedirectResult};
pub use intent::{AuthIntentRecord, FlowKind};
pub use outcome::{OutcomeStatus, SignInOutcome};
