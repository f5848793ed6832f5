//! Startup sequencing and the surface exposed to the application shell
//!
//! `initialize` decides, strictly in order, between accepting an existing
//! identity, waiting on a flow that is still in flight, surfacing a failed
//! flow, and falling back to an anonymous session. The identity-change
//! listener is attached last so intermediate states are never observed as final.

use crate::errors::{AuthErrorKind, AuthFailure};
use crate::flow::{FlowOrchestrator, RecoveryDispatcher};
use crate::intent::IntentStore;
use crate::models::{Identity, OutcomeStatus, SignInOutcome};
use crate::provider::{IdentityProvider, ProviderPolicy};
use crate::session::reconciler::RedirectReconciler;
use crate::session::stabilization::StabilizationWaiter;
use crate::session::state::{SessionError, SessionPhase, SessionState};
use crate::settings::{AuthsyncSettings, StabilizationSettings};
use crate::storage::KeyValueStore;
use crate::utils::clock::Clock;
use crate::utils::logging::LoggingHelper;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;

pub struct SessionLifecycle {
    provider: Arc<dyn IdentityProvider>,
    intents: Arc<IntentStore>,
    waiter: StabilizationWaiter,
    reconciler: RedirectReconciler,
    orchestrator: FlowOrchestrator,
    stabilization: StabilizationSettings,
    state: Arc<watch::Sender<SessionState>>,
    startup: OnceCell<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionLifecycle {
    /// Wire every component from settings around the given collaborators
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        settings: &AuthsyncSettings,
    ) -> Self {
        let intents = Arc::new(IntentStore::new(storage, clock, settings.intents.clone()));
        Self::with_intents(provider, intents, settings)
    }

    /// Same as [`Self::new`] with a caller-owned intent store
    #[must_use]
    pub fn with_intents(
        provider: Arc<dyn IdentityProvider>,
        intents: Arc<IntentStore>,
        settings: &AuthsyncSettings,
    ) -> Self {
        let policy = ProviderPolicy::from_settings(&settings.provider);
        let waiter = StabilizationWaiter::new(provider.clone(), &settings.stabilization);
        let dispatcher = RecoveryDispatcher::new(provider.clone(), intents.clone(), policy.clone());
        let reconciler = RedirectReconciler::new(
            provider.clone(),
            intents.clone(),
            waiter.clone(),
            dispatcher.clone(),
            policy.clone(),
            settings.stabilization.clone(),
        );
        let orchestrator =
            FlowOrchestrator::new(provider.clone(), intents.clone(), dispatcher, policy);
        let (state, _) = watch::channel(SessionState::initializing());

        Self {
            provider,
            intents,
            waiter,
            reconciler,
            orchestrator,
            stabilization: settings.stabilization.clone(),
            state: Arc::new(state),
            startup: OnceCell::new(),
            listener: Mutex::new(None),
        }
    }

    /// Run the startup sequence once and return the resulting state
    ///
    /// Later calls return the current state without re-running anything.
    pub async fn initialize(&self) -> SessionState {
        self.startup.get_or_init(|| self.run_startup()).await;
        self.state()
    }

    async fn run_startup(&self) {
        if let Err(e) = self.provider.configure_persistence().await {
            log::warn!("Durable session persistence unavailable, continuing with provider default: {e}");
        }

        let reconciled = self.reconciler.reconcile().await;
        if reconciled.identity_established {
            self.mark_ready(reconciled.identity, None);
            self.attach_listener();
            return;
        }

        // A failed flow is surfaced whatever identity survived the restart
        let failure = if reconciled.is_definite_failure() {
            reconciled.error.clone()
        } else {
            None
        };
        if let Some(failure) = failure.as_ref() {
            LoggingHelper::log_surfaced_failure(failure, false);
        }
        let surfaced = failure.map(SessionError::SignIn);

        let settled = self
            .waiter
            .wait_for_settled_identity(self.stabilization.startup_wait())
            .await;

        if settled.is_some() {
            self.mark_ready(settled, surfaced);
        } else if self.intents.is_any_pending() {
            LoggingHelper::log_anonymous_suppressed("a sign-in flow is still in progress");
            self.mark_ready(None, surfaced);
        } else if surfaced.is_some() {
            LoggingHelper::log_anonymous_suppressed("the last sign-in attempt failed");
            self.mark_ready(None, surfaced);
        } else if reconciled.status == OutcomeStatus::Cancelled {
            LoggingHelper::log_anonymous_suppressed("the last sign-in attempt was cancelled");
            self.mark_ready(None, None);
        } else {
            self.create_anonymous_session().await;
        }

        self.attach_listener();
    }

    async fn create_anonymous_session(&self) {
        LoggingHelper::log_anonymous_fallback();
        match self.provider.sign_in_anonymously().await {
            Ok(identity) => self.mark_ready(Some(identity), None),
            Err(error) => {
                let failure = AuthFailure::from_provider(AuthErrorKind::Transient, &error);
                LoggingHelper::log_surfaced_failure(&failure, true);
                self.mark_ready(None, Some(SessionError::Fatal(failure)));
            }
        }
    }

    fn mark_ready(&self, identity: Option<Identity>, error: Option<SessionError>) {
        LoggingHelper::log_session_ready(identity.as_ref().map(|i| i.uid.as_str()));
        self.state.send_replace(SessionState {
            phase: SessionPhase::Ready,
            identity,
            error,
        });
    }

    /// Forward provider identity changes into the published state; attached once
    fn attach_listener(&self) {
        let mut listener = self
            .listener
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if listener.is_some() {
            return;
        }

        let mut identities = self.provider.subscribe();
        let state = self.state.clone();
        *listener = Some(tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                state.send_if_modified(|current| {
                    if current.identity == identity {
                        false
                    } else {
                        log::debug!(
                            "Identity changed to {}",
                            identity.as_ref().map_or("<none>", |i| i.uid.as_str())
                        );
                        current.identity = identity;
                        true
                    }
                });
                if identities.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    /// User-initiated sign-in; failures are surfaced into the session state
    pub async fn sign_in(&self) -> SignInOutcome {
        let outcome = self.orchestrator.sign_in().await;
        match outcome.status {
            OutcomeStatus::Success => {
                let identity = outcome.identity.clone();
                self.state.send_modify(|state| {
                    state.error = None;
                    state.identity = identity;
                });
            }
            OutcomeStatus::Failed => {
                if let Some(failure) = outcome.error.clone() {
                    self.state
                        .send_modify(|state| state.error = Some(SessionError::SignIn(failure)));
                }
            }
            OutcomeStatus::Cancelled | OutcomeStatus::RedirectStarted | OutcomeStatus::Neutral => {}
        }
        outcome
    }

    /// Whether a popup or redirect flow is currently in progress
    #[must_use]
    pub fn is_flow_in_progress(&self) -> bool {
        self.intents.is_any_pending()
    }

    /// Drop all pending-flow state (explicit user recovery such as "Try Again")
    pub fn clear_pending_flow_state(&self) {
        log::info!("Clearing all pending sign-in flow state");
        self.intents.clear_all();
    }

    /// Dismiss a surfaced error
    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    /// Subscribe to session state changes, including later sign-in and sign-out
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn intents(&self) -> &Arc<IntentStore> {
        &self.intents
    }
}

impl Drop for SessionLifecycle {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}
