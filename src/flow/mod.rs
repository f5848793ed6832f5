//! Sign-in flows
//!
//! - [`orchestrator`] - user-initiated sign-in: popup first, redirect when blocked
//! - [`recovery`] - the single dispatcher applying recovery rules to classified
//!   provider errors, shared by the popup path and redirect reconciliation

pub mod orchestrator;
pub mod recovery;

pub use orchestrator::FlowOrchestrator;
pub use recovery::{FlowContext, RecoveryDispatcher};
