use crate::errors::AuthFailure;
use crate::flow::recovery::{FlowContext, RecoveryDispatcher};
use crate::intent::IntentStore;
use crate::models::{FlowKind, FlowOperation, SignInOutcome};
use crate::provider::{IdentityProvider, ProviderPolicy};
use crate::session::stabilization::StabilizationWaiter;
use crate::settings::StabilizationSettings;
use crate::utils::logging::LoggingHelper;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Determines the outcome of a redirect that spanned a process restart
///
/// The redirect intent record is the continuation: this runs at every startup,
/// reads the record, and settles it one way or another. The result is
/// memoised, so later calls in the same process return the first outcome.
pub struct RedirectReconciler {
    provider: Arc<dyn IdentityProvider>,
    intents: Arc<IntentStore>,
    waiter: StabilizationWaiter,
    dispatcher: RecoveryDispatcher,
    policy: ProviderPolicy,
    stabilization: StabilizationSettings,
    outcome: OnceCell<SignInOutcome>,
}

impl RedirectReconciler {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        intents: Arc<IntentStore>,
        waiter: StabilizationWaiter,
        dispatcher: RecoveryDispatcher,
        policy: ProviderPolicy,
        stabilization: StabilizationSettings,
    ) -> Self {
        Self {
            provider,
            intents,
            waiter,
            dispatcher,
            policy,
            stabilization,
            outcome: OnceCell::new(),
        }
    }

    pub async fn reconcile(&self) -> SignInOutcome {
        self.outcome.get_or_init(|| self.run()).await.clone()
    }

    async fn run(&self) -> SignInOutcome {
        // Read before anything else can clear it
        let was_pending = self.intents.is_pending(FlowKind::RedirectPending);

        let settled = self
            .waiter
            .wait_for_settled_identity(self.stabilization.reconcile_wait(was_pending))
            .await;

        // The provider's own persistence may already have completed the flow
        if let Some(identity) = settled.as_ref() {
            if self.policy.is_established(identity) {
                self.intents.clear_pending(FlowKind::RedirectPending);
                let outcome = SignInOutcome::success(identity.clone(), was_pending);
                LoggingHelper::log_reconcile_outcome(&outcome);
                return outcome;
            }
        }

        let outcome = match self.provider.fetch_redirect_result().await {
            Ok(Some(result)) => {
                LoggingHelper::log_redirect_result(&result);
                self.intents.clear_pending(FlowKind::RedirectPending);
                SignInOutcome::success(result.identity, was_pending)
            }
            Ok(None) if was_pending => {
                // Last-moment restoration
                let rechecked = self
                    .waiter
                    .wait_for_settled_identity(self.stabilization.recheck_wait())
                    .await;
                self.intents.clear_pending(FlowKind::RedirectPending);
                match rechecked {
                    Some(identity) if self.policy.is_established(&identity) => {
                        SignInOutcome::success(identity, true)
                    }
                    rechecked => {
                        SignInOutcome::failed(AuthFailure::redirect_incomplete(), true, rechecked)
                    }
                }
            }
            Ok(None) => {
                let current = self.provider.current_identity();
                let established = self.policy.is_established_opt(current.as_ref());
                SignInOutcome::neutral(current, established)
            }
            Err(error) => {
                self.dispatcher
                    .recover(
                        error,
                        FlowContext {
                            kind: FlowKind::RedirectPending,
                            operation: FlowOperation::for_identity(settled.as_ref()),
                            was_flow_pending: was_pending,
                        },
                    )
                    .await
            }
        };

        LoggingHelper::log_reconcile_outcome(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{codes, AuthErrorKind, ProviderError};
    use crate::models::{Credential, Identity, OutcomeStatus, RedirectResult};
    use crate::storage::MemoryStore;
    use crate::testing::{ManualClock, MockIdentityProvider, ProviderCall, TestFixtures};
    use std::time::Duration;
    use tokio::time::Instant;

    fn reconciler(
        provider: &Arc<MockIdentityProvider>,
        intents: &Arc<IntentStore>,
    ) -> RedirectReconciler {
        let settings = StabilizationSettings::default();
        let policy = ProviderPolicy::default();
        RedirectReconciler::new(
            provider.clone(),
            intents.clone(),
            StabilizationWaiter::new(provider.clone(), &settings),
            RecoveryDispatcher::new(provider.clone(), intents.clone(), policy.clone()),
            policy,
            settings,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_redirect_without_identity_fails_and_clears() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        let intents = TestFixtures::intent_store();
        intents.set_pending(FlowKind::RedirectPending);

        let started = Instant::now();
        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.was_flow_pending);
        assert_eq!(outcome.error.unwrap().kind, AuthErrorKind::Timeout);
        assert!(!intents.is_pending(FlowKind::RedirectPending));
        // Full pending budget plus the re-check
        assert_eq!(started.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_without_identity_is_neutral() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        let storage = MemoryStore::new();
        let intents = TestFixtures::intent_store_with(&storage, &ManualClock::default());

        let started = Instant::now();
        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert_eq!(outcome.status, OutcomeStatus::Neutral);
        assert!(!outcome.is_definite_failure());
        assert!(!outcome.was_flow_pending);
        assert!(!outcome.identity_established);
        assert!(storage.is_empty());
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_result_establishes_identity() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_redirect_result(Ok(Some(RedirectResult {
            identity: Identity::linked("user-1", "google.com"),
            credential: None,
            operation: FlowOperation::SignIn,
        })));
        let intents = TestFixtures::intent_store();
        intents.set_pending(FlowKind::RedirectPending);

        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert!(outcome.is_success());
        assert!(outcome.identity_established);
        assert!(outcome.was_flow_pending);
        assert!(!intents.is_pending(FlowKind::RedirectPending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_identity_short_circuits_redirect_result() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.restore_identity_after(
            Duration::from_millis(800),
            Identity::linked("user-1", "google.com"),
        );
        let intents = TestFixtures::intent_store();
        intents.set_pending(FlowKind::RedirectPending);

        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert!(outcome.is_success());
        assert!(!provider.was_called(&ProviderCall::FetchRedirectResult));
        assert!(!intents.is_pending(FlowKind::RedirectPending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_moment_restoration_counts_as_success() {
        let provider = Arc::new(MockIdentityProvider::new());
        // Lands after the 3000 ms budget but inside the re-check
        provider.restore_identity_after(
            Duration::from_millis(3200),
            Identity::linked("user-1", "google.com"),
        );
        let intents = TestFixtures::intent_store();
        intents.set_pending(FlowKind::RedirectPending);

        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert!(outcome.is_success());
        assert!(provider.was_called(&ProviderCall::FetchRedirectResult));
        assert!(!intents.is_pending(FlowKind::RedirectPending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_conflict_merges_like_popup() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        let credential = Credential::new("google.com", Some("id-token-x"), None);
        provider.set_redirect_result(Err(ProviderError::new(
            codes::CREDENTIAL_ALREADY_IN_USE,
            "in use",
        )
        .with_credential(credential.clone())));
        provider.set_credential_account(Identity::linked("account-x", "google.com"));
        let intents = TestFixtures::intent_store();
        intents.set_pending(FlowKind::RedirectPending);

        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert!(outcome.is_success());
        assert_eq!(provider.current_identity().unwrap().uid, "account-x");
        assert!(provider.was_called(&ProviderCall::SignInWithCredential(credential)));
        assert!(!intents.is_any_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_network_error_is_surfaced() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_redirect_result(Err(ProviderError::new(
            codes::NETWORK_REQUEST_FAILED,
            "offline",
        )));
        let intents = TestFixtures::intent_store();
        intents.set_pending(FlowKind::RedirectPending);

        let outcome = reconciler(&provider, &intents).reconcile().await;

        assert!(outcome.is_definite_failure());
        assert_eq!(outcome.error.unwrap().kind, AuthErrorKind::Transient);
        assert!(!intents.is_any_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_runs_once_per_process() {
        let provider = Arc::new(MockIdentityProvider::new());
        let intents = TestFixtures::intent_store();
        let reconciler = reconciler(&provider, &intents);

        let first = reconciler.reconcile().await;
        let second = reconciler.reconcile().await;

        assert_eq!(first, second);
        assert_eq!(provider.call_count(&ProviderCall::FetchRedirectResult), 1);
    }
}
