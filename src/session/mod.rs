//! Session lifecycle
//!
//! # Modules
//!
//! - [`stabilization`] - bounded wait for the provider's session restoration
//! - [`reconciler`] - settles a redirect that spanned a process restart
//! - [`lifecycle`] - startup sequencing and the application-shell surface
//! - [`state`] - session state published to the shell

pub mod lifecycle;
pub mod reconciler;
pub mod stabilization;
pub mod state;

pub use lifecycle::SessionLifecycle;
pub use reconciler::RedirectReconciler;
pub use stabilization::StabilizationWaiter;
pub use state::{SessionError, SessionPhase, SessionState};
