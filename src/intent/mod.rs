//! Intent store
//!
//! Durable records of in-flight sign-in attempts. The durable record is the
//! single source of truth; the in-process cache only short-circuits storage
//! reads for records this process wrote, and every durable write updates it.

pub mod store;

pub use store::{IntentStore, PendingFlowGuard};
