//! Pre-built test data and simulated processes

use crate::intent::IntentStore;
use crate::session::SessionLifecycle;
use crate::settings::{AuthsyncSettings, IntentSettings};
use crate::storage::memory::MemoryStore;
use std::sync::Arc;

use super::mock::{ManualClock, MockIdentityProvider};

/// Factory methods for commonly used test objects
pub struct TestFixtures;

impl TestFixtures {
    /// Default settings; tests tweak individual fields as needed
    #[must_use]
    pub fn settings() -> AuthsyncSettings {
        AuthsyncSettings::default()
    }

    /// Intent store over fresh in-memory storage and a manual clock
    #[must_use]
    pub fn intent_store() -> Arc<IntentStore> {
        Self::intent_store_with(&MemoryStore::new(), &ManualClock::default())
    }

    /// Intent store sharing `storage` and `clock` with the caller
    #[must_use]
    pub fn intent_store_with(storage: &MemoryStore, clock: &ManualClock) -> Arc<IntentStore> {
        Arc::new(IntentStore::new(
            Arc::new(storage.clone()),
            Arc::new(clock.clone()),
            IntentSettings::default(),
        ))
    }
}

/// One simulated application process
///
/// The provider is fresh per process; everything durable lives in the
/// [`TestHarness`] that started it.
pub struct TestProcess {
    pub provider: Arc<MockIdentityProvider>,
    pub lifecycle: SessionLifecycle,
}

/// Durable state that survives across simulated processes
///
/// Starting a second process over the same harness models a full-page
/// navigation: in-memory caches are gone, the intent records are not.
pub struct TestHarness {
    pub storage: MemoryStore,
    pub clock: ManualClock,
    pub settings: AuthsyncSettings,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: MemoryStore::new(),
            clock: ManualClock::default(),
            settings: TestFixtures::settings(),
        }
    }

    /// Start a process with a fresh, unscripted provider
    #[must_use]
    pub fn start_process(&self) -> TestProcess {
        self.start_process_with(Arc::new(MockIdentityProvider::new()))
    }

    /// Start a process around an already scripted provider
    #[must_use]
    pub fn start_process_with(&self, provider: Arc<MockIdentityProvider>) -> TestProcess {
        let lifecycle = SessionLifecycle::new(
            provider.clone(),
            Arc::new(self.storage.clone()),
            Arc::new(self.clock.clone()),
            &self.settings,
        );
        TestProcess {
            provider,
            lifecycle,
        }
    }

    /// A fresh view of the durable intent records, as a new process would see them
    #[must_use]
    pub fn intents(&self) -> Arc<IntentStore> {
        Arc::new(IntentStore::new(
            Arc::new(self.storage.clone()),
            Arc::new(self.clock.clone()),
            self.settings.intents.clone(),
        ))
    }
}
