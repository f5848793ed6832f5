use crate::errors::{AuthErrorKind, AuthFailure, ErrorClass, ProviderError};
use crate::intent::IntentStore;
use crate::models::{Credential, FlowKind, FlowOperation, SignInOutcome};
use crate::provider::{IdentityProvider, ProviderPolicy};
use crate::utils::logging::LoggingHelper;
use std::sync::Arc;

/// The flow a provider error interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowContext {
    pub kind: FlowKind,
    pub operation: FlowOperation,
    pub was_flow_pending: bool,
}

/// Applies recovery rules to classified provider errors
///
/// | Class | Popup flow | Redirect flow |
/// |---|---|---|
/// | Blocked | switch to redirect | surface (retryable) |
/// | Conflict | sign out, sign in with the carried credential | same |
/// | Cancelled | cancelled outcome, no fallback | same |
/// | Transient | surface (retryable) | same |
///
/// Every branch clears the intent record of the interrupted flow.
#[derive(Clone)]
pub struct RecoveryDispatcher {
    provider: Arc<dyn IdentityProvider>,
    intents: Arc<IntentStore>,
    policy: ProviderPolicy,
}

impl RecoveryDispatcher {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        intents: Arc<IntentStore>,
        policy: ProviderPolicy,
    ) -> Self {
        Self {
            provider,
            intents,
            policy,
        }
    }

    pub async fn recover(&self, error: ProviderError, context: FlowContext) -> SignInOutcome {
        let class = ErrorClass::classify(&error);
        let kind = class.kind();
        LoggingHelper::log_provider_failure(context.kind, &error.code, &class);

        match class {
            ErrorClass::Blocked if context.kind == FlowKind::PopupPending => {
                self.switch_to_redirect(context.operation).await
            }
            ErrorClass::Conflict(credential) => {
                self.adopt_existing_account(&credential, context).await
            }
            ErrorClass::Cancelled => {
                self.intents.clear_pending(context.kind);
                SignInOutcome::cancelled(
                    context.was_flow_pending,
                    self.provider.current_identity(),
                )
            }
            ErrorClass::Blocked | ErrorClass::Transient => {
                self.intents.clear_pending(context.kind);
                self.surface(kind, &error, context.was_flow_pending)
            }
        }
    }

    /// Continue a blocked popup flow as a full-page redirect
    ///
    /// The redirect record is durable before the navigating call is issued;
    /// on success the page goes away and the record is all that survives.
    async fn switch_to_redirect(&self, operation: FlowOperation) -> SignInOutcome {
        let provider_id = self.policy.provider_id.as_str();
        LoggingHelper::log_switch_to_redirect(operation, provider_id);

        self.intents.clear_pending(FlowKind::PopupPending);
        self.intents.set_pending(FlowKind::RedirectPending);

        let started = match operation {
            FlowOperation::Link => self.provider.link_with_redirect(provider_id).await,
            FlowOperation::SignIn => self.provider.sign_in_with_redirect(provider_id).await,
        };

        match started {
            Ok(()) => SignInOutcome::redirect_started(self.provider.current_identity()),
            Err(error) => {
                // Navigation never began, so nothing will reconcile this record
                self.intents.clear_pending(FlowKind::RedirectPending);
                let class = ErrorClass::classify(&error);
                LoggingHelper::log_provider_failure(FlowKind::RedirectPending, &error.code, &class);
                if class == ErrorClass::Cancelled {
                    SignInOutcome::cancelled(true, self.provider.current_identity())
                } else {
                    self.surface(class.kind(), &error, true)
                }
            }
        }
    }

    /// Merge toward the account that already owns the credential
    async fn adopt_existing_account(
        &self,
        credential: &Credential,
        context: FlowContext,
    ) -> SignInOutcome {
        let current = self.provider.current_identity();
        LoggingHelper::log_conflict_merge(context.kind, current.as_ref().map(|i| i.uid.as_str()));

        let adopted = match self.provider.sign_out().await {
            Ok(()) => self.provider.sign_in_with_credential(credential).await,
            Err(error) => Err(error),
        };
        self.intents.clear_pending(context.kind);

        match adopted {
            Ok(identity) => SignInOutcome::success(identity, context.was_flow_pending),
            Err(error) => self.surface(AuthErrorKind::Transient, &error, context.was_flow_pending),
        }
    }

    fn surface(
        &self,
        kind: AuthErrorKind,
        error: &ProviderError,
        was_flow_pending: bool,
    ) -> SignInOutcome {
        let failure = AuthFailure::from_provider(kind, error);
        LoggingHelper::log_surfaced_failure(&failure, false);
        SignInOutcome::failed(failure, was_flow_pending, self.provider.current_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use crate::models::{Identity, OutcomeStatus};
    use crate::testing::{MockIdentityProvider, ProviderCall, TestFixtures};

    fn dispatcher(provider: &Arc<MockIdentityProvider>) -> (RecoveryDispatcher, Arc<IntentStore>) {
        let intents = TestFixtures::intent_store();
        let dispatcher = RecoveryDispatcher::new(
            provider.clone(),
            intents.clone(),
            ProviderPolicy::default(),
        );
        (dispatcher, intents)
    }

    fn redirect_context() -> FlowContext {
        FlowContext {
            kind: FlowKind::RedirectPending,
            operation: FlowOperation::Link,
            was_flow_pending: true,
        }
    }

    #[tokio::test]
    async fn test_blocked_redirect_is_surfaced_not_switched() {
        let provider = Arc::new(MockIdentityProvider::new());
        let (dispatcher, intents) = dispatcher(&provider);
        intents.set_pending(FlowKind::RedirectPending);

        let outcome = dispatcher
            .recover(
                ProviderError::new(codes::OPERATION_NOT_SUPPORTED, "no redirects here"),
                redirect_context(),
            )
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind, AuthErrorKind::Blocked);
        assert!(!intents.is_any_pending());
        assert!(!provider.was_called(&ProviderCall::SignInWithRedirect));
        assert!(!provider.was_called(&ProviderCall::LinkWithRedirect));
    }

    #[tokio::test]
    async fn test_failed_merge_is_transient_and_clears_record() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.set_identity(Some(Identity::anonymous("anon-1")));
        let (dispatcher, intents) = dispatcher(&provider);
        intents.set_pending(FlowKind::RedirectPending);

        // No account scripted for the credential, so the sign-in fails
        let error = ProviderError::new(codes::CREDENTIAL_ALREADY_IN_USE, "in use")
            .with_credential(Credential::new("google.com", Some("token"), None));
        let outcome = dispatcher.recover(error, redirect_context()).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind, AuthErrorKind::Transient);
        assert!(!intents.is_any_pending());
    }

    #[tokio::test]
    async fn test_redirect_start_failure_clears_redirect_record() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.push_redirect_start(Err(ProviderError::new(
            codes::NETWORK_REQUEST_FAILED,
            "offline",
        )));
        let (dispatcher, intents) = dispatcher(&provider);
        intents.set_pending(FlowKind::PopupPending);

        let outcome = dispatcher
            .recover(
                ProviderError::new(codes::POPUP_BLOCKED, "blocked"),
                FlowContext {
                    kind: FlowKind::PopupPending,
                    operation: FlowOperation::SignIn,
                    was_flow_pending: true,
                },
            )
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind, AuthErrorKind::Transient);
        assert!(provider.was_called(&ProviderCall::SignInWithRedirect));
        assert!(!intents.is_any_pending());
    }
}
