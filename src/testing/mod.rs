//! Testing utilities for authsync
//!
//! ## Organization
//!
//! - [`fixtures`] - pre-built intent stores, settings and simulated processes
//! - [`mock`] - scriptable identity provider and a manual wall clock
//!
//! ## Usage
//!
//! ```ignore
//! use authsync::testing::{TestHarness, constants::TEST_PROVIDER_ID};
//! use authsync::models::Identity;
//!
//! # async fn example() {
//! let harness = TestHarness::new();
//! let process = harness.start_process();
//! process.provider.set_identity(Some(Identity::linked("user-1", TEST_PROVIDER_ID)));
//! let state = process.lifecycle.initialize().await;
//! assert!(state.is_signed_in());
//! # }
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::{TestFixtures, TestHarness, TestProcess};
pub use mock::{ManualClock, MockIdentityProvider, ProviderCall};

/// Common test constants
pub mod constants {
    /// Provider targeted by the default settings
    pub const TEST_PROVIDER_ID: &str = "google.com";

    /// Uid of the anonymous identity used across scenarios
    pub const TEST_ANONYMOUS_UID: &str = "anon-device-1";

    /// Uid of the pre-existing account a conflicting credential belongs to
    pub const TEST_ACCOUNT_UID: &str = "account-x";

    /// Wall-clock start for manual clocks (2023-11-14T22:13:20Z)
    pub const TEST_START_MILLIS: i64 = 1_700_000_000_000;
}
