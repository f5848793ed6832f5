use crate::flow::recovery::{FlowContext, RecoveryDispatcher};
use crate::intent::IntentStore;
use crate::models::{FlowKind, FlowOperation, SignInOutcome};
use crate::provider::{IdentityProvider, ProviderPolicy};
use crate::utils::logging::LoggingHelper;
use std::sync::Arc;

/// User-initiated sign-in
///
/// Tries the popup flow first. Anonymous identities are linked rather than
/// replaced so their data carries over; provider errors go through the shared
/// [`RecoveryDispatcher`].
#[derive(Clone)]
pub struct FlowOrchestrator {
    provider: Arc<dyn IdentityProvider>,
    intents: Arc<IntentStore>,
    dispatcher: RecoveryDispatcher,
    policy: ProviderPolicy,
}

impl FlowOrchestrator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        intents: Arc<IntentStore>,
        dispatcher: RecoveryDispatcher,
        policy: ProviderPolicy,
    ) -> Self {
        Self {
            provider,
            intents,
            dispatcher,
            policy,
        }
    }

    /// Sign in with the configured provider; only call from an explicit user action
    ///
    /// Returns `RedirectStarted` when the popup was blocked and navigation for
    /// the redirect flow has begun; the outcome of that flow is reported by
    /// reconciliation in the next process.
    pub async fn sign_in(&self) -> SignInOutcome {
        let current = self.provider.current_identity();
        if let Some(identity) = current.as_ref() {
            if self.policy.is_established(identity) {
                log::debug!("Identity {} already signed in; nothing to do", identity.uid);
                return SignInOutcome::success(identity.clone(), false);
            }
        }

        let operation = FlowOperation::for_identity(current.as_ref());
        let provider_id = self.policy.provider_id.as_str();

        // Durable before the popup opens; the guard clears it on every exit path
        let _popup = self.intents.begin(FlowKind::PopupPending);
        LoggingHelper::log_popup_flow_started(operation, provider_id);

        let result = match operation {
            FlowOperation::Link => self.provider.link_with_popup(provider_id).await,
            FlowOperation::SignIn => self.provider.sign_in_with_popup(provider_id).await,
        };

        match result {
            Ok(identity) => {
                self.intents.clear_pending(FlowKind::PopupPending);
                log::info!("✅ Popup {} completed for {}", operation.as_str(), identity.uid);
                SignInOutcome::success(identity, true)
            }
            Err(error) => {
                self.dispatcher
                    .recover(
                        error,
                        FlowContext {
                            kind: FlowKind::PopupPending,
                            operation,
                            was_flow_pending: true,
                        },
                    )
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{codes, AuthErrorKind, ProviderError};
    use crate::models::{Credential, Identity, OutcomeStatus};
    use crate::testing::{MockIdentityProvider, ProviderCall, TestFixtures};

    fn orchestrator(provider: &Arc<MockIdentityProvider>) -> (FlowOrchestrator, Arc<IntentStore>) {
        let intents = TestFixtures::intent_store();
        let policy = ProviderPolicy::default();
        let dispatcher = RecoveryDispatcher::new(provider.clone(), intents.clone(), policy.clone());
        (
            FlowOrchestrator::new(provider.clone(), intents.clone(), dispatcher, policy),
            intents,
        )
    }

    #[tokio::test]
    async fn test_already_linked_identity_is_a_no_op() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::linked("user-1", "google.com")));
        let (orchestrator, intents) = orchestrator(&provider);

        let outcome = orchestrator.sign_in().await;

        assert!(outcome.is_success());
        assert!(outcome.identity_established);
        assert!(!outcome.was_flow_pending);
        assert!(provider.calls().is_empty());
        assert!(!intents.is_any_pending());
    }

    #[tokio::test]
    async fn test_anonymous_identity_is_linked_via_popup() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        provider.push_popup(Ok(Identity::linked("anon-1", "google.com")));
        let (orchestrator, intents) = orchestrator(&provider);

        let outcome = orchestrator.sign_in().await;

        assert!(outcome.is_success());
        assert!(outcome.identity_established);
        assert_eq!(outcome.identity.unwrap().uid, "anon-1");
        assert!(provider.was_called(&ProviderCall::LinkWithPopup));
        assert!(!intents.is_pending(FlowKind::PopupPending));
    }

    #[tokio::test]
    async fn test_no_identity_uses_plain_popup_sign_in() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.push_popup(Ok(Identity::linked("user-9", "google.com")));
        let (orchestrator, _intents) = orchestrator(&provider);

        let outcome = orchestrator.sign_in().await;

        assert!(outcome.is_success());
        assert!(provider.was_called(&ProviderCall::SignInWithPopup));
        assert!(!provider.was_called(&ProviderCall::LinkWithPopup));
    }

    #[tokio::test]
    async fn test_popup_intent_is_durable_while_popup_is_open() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        provider.push_popup(Ok(Identity::linked("anon-1", "google.com")));
        let (orchestrator, intents) = orchestrator(&provider);

        let observer = intents.clone();
        provider.on_popup(move || {
            assert!(observer.is_pending(FlowKind::PopupPending));
        });

        assert!(orchestrator.sign_in().await.is_success());
        assert_eq!(provider.hook_invocations(), 1);
    }

    #[tokio::test]
    async fn test_blocked_popup_switches_to_redirect_after_persisting_intent() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        provider.push_popup(Err(ProviderError::new(codes::POPUP_BLOCKED, "blocked")));
        let (orchestrator, intents) = orchestrator(&provider);

        let observer = intents.clone();
        provider.on_redirect(move || {
            assert!(!observer.is_pending(FlowKind::PopupPending));
            assert!(observer.is_pending(FlowKind::RedirectPending));
        });

        let outcome = orchestrator.sign_in().await;

        assert_eq!(outcome.status, OutcomeStatus::RedirectStarted);
        assert!(outcome.was_flow_pending);
        assert!(provider.was_called(&ProviderCall::LinkWithRedirect));
        assert_eq!(provider.hook_invocations(), 1);
        // The redirect record is what the next process reconciles against
        assert!(intents.is_pending(FlowKind::RedirectPending));
        assert!(!intents.is_pending(FlowKind::PopupPending));
    }

    #[tokio::test]
    async fn test_credential_conflict_adopts_existing_account() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        let credential = Credential::new("google.com", Some("id-token-x"), None);
        provider.push_popup(Err(ProviderError::new(
            codes::CREDENTIAL_ALREADY_IN_USE,
            "already linked to another account",
        )
        .with_credential(credential.clone())));
        provider.set_credential_account(Identity::linked("account-x", "google.com"));
        let (orchestrator, intents) = orchestrator(&provider);

        let outcome = orchestrator.sign_in().await;

        assert!(outcome.is_success());
        assert!(outcome.identity_established);
        let current = provider.current_identity().unwrap();
        assert_eq!(current.uid, "account-x");
        assert!(!current.is_anonymous);
        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::LinkWithPopup,
                ProviderCall::SignOut,
                ProviderCall::SignInWithCredential(credential),
            ]
        );
        assert!(!intents.is_pending(FlowKind::PopupPending));
    }

    #[tokio::test]
    async fn test_user_cancel_is_not_an_error() {
        for code in [codes::POPUP_CLOSED_BY_USER, codes::CANCELLED_POPUP_REQUEST] {
            let provider = Arc::new(MockIdentityProvider::new());
            provider.set_identity(Some(Identity::anonymous("anon-1")));
            provider.push_popup(Err(ProviderError::new(code, "closed")));
            let (orchestrator, intents) = orchestrator(&provider);

            let outcome = orchestrator.sign_in().await;

            assert!(outcome.is_cancelled());
            assert!(outcome.error.is_none());
            assert!(!outcome.identity_established);
            assert_eq!(provider.current_identity().unwrap().uid, "anon-1");
            assert!(!intents.is_any_pending());
        }
    }

    #[tokio::test]
    async fn test_network_failure_is_surfaced_and_keeps_prior_session() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        provider.push_popup(Err(ProviderError::new(
            codes::NETWORK_REQUEST_FAILED,
            "network down",
        )));
        let (orchestrator, intents) = orchestrator(&provider);

        let outcome = orchestrator.sign_in().await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, AuthErrorKind::Transient);
        assert!(failure.is_retryable());
        assert_eq!(provider.current_identity().unwrap().uid, "anon-1");
        assert!(!provider.was_called(&ProviderCall::SignOut));
        assert!(!intents.is_any_pending());
    }

    #[tokio::test]
    async fn test_dropped_sign_in_clears_popup_intent() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        provider.hang_popups();
        let (orchestrator, intents) = orchestrator(&provider);

        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            orchestrator.sign_in(),
        )
        .await;

        assert!(attempt.is_err());
        assert!(!intents.is_pending(FlowKind::PopupPending));
    }
}
