//! Mock objects and fake implementations for testing
//!
//! [`MockIdentityProvider`] behaves like the provider SDK from the point of
//! view of this crate: successful popups, credential sign-ins and redirect
//! results replace the current identity and notify subscribers.

use crate::errors::{codes, ProviderError};
use crate::models::{Credential, Identity, RedirectResult};
use crate::provider::IdentityProvider;
use crate::utils::clock::Clock;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

use super::constants::TEST_START_MILLIS;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Provider operations recorded by the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ConfigurePersistence,
    SignInWithPopup,
    LinkWithPopup,
    SignInWithRedirect,
    LinkWithRedirect,
    FetchRedirectResult,
    SignInAnonymously,
    SignOut,
    SignInWithCredential(Credential),
}

#[derive(Default)]
struct Script {
    popups: VecDeque<Result<Identity, ProviderError>>,
    hang_popups: bool,
    redirect_starts: VecDeque<Result<(), ProviderError>>,
    redirect_result: Option<Result<Option<RedirectResult>, ProviderError>>,
    credential_account: Option<Identity>,
    anonymous_error: Option<ProviderError>,
    persistence_error: Option<ProviderError>,
    ready_delay: Duration,
    popup_hook: Option<Hook>,
    redirect_hook: Option<Hook>,
}

/// Scriptable identity provider
pub struct MockIdentityProvider {
    identity: watch::Sender<Option<Identity>>,
    script: Mutex<Script>,
    calls: Mutex<Vec<ProviderCall>>,
    hook_invocations: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    /// Provider with no current identity and nothing scripted
    #[must_use]
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            identity,
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Vec::new()),
            hook_invocations: AtomicUsize::new(0),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, call: ProviderCall) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
    }

    fn run_hook(&self, hook: Option<Hook>) {
        if let Some(hook) = hook {
            self.hook_invocations.fetch_add(1, Ordering::SeqCst);
            hook();
        }
    }

    /// Replace the current identity and notify subscribers
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.identity.send_replace(identity);
    }

    /// Simulate the provider restoring a persisted session after `delay`
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn restore_identity_after(self: &Arc<Self>, delay: Duration, identity: Identity) {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            provider.set_identity(Some(identity));
        });
    }

    /// Queue the result of the next popup (sign-in or link)
    pub fn push_popup(&self, result: Result<Identity, ProviderError>) {
        self.script().popups.push_back(result);
    }

    /// Popups never resolve, as if the user left the window open
    pub fn hang_popups(&self) {
        self.script().hang_popups = true;
    }

    /// Queue the result of the next redirect start; defaults to navigation beginning
    pub fn push_redirect_start(&self, result: Result<(), ProviderError>) {
        self.script().redirect_starts.push_back(result);
    }

    /// Result returned by the next `fetch_redirect_result`; defaults to `Ok(None)`
    pub fn set_redirect_result(&self, result: Result<Option<RedirectResult>, ProviderError>) {
        self.script().redirect_result = Some(result);
    }

    /// Account that `sign_in_with_credential` signs into
    pub fn set_credential_account(&self, identity: Identity) {
        self.script().credential_account = Some(identity);
    }

    pub fn fail_anonymous(&self, error: ProviderError) {
        self.script().anonymous_error = Some(error);
    }

    pub fn fail_persistence(&self, error: ProviderError) {
        self.script().persistence_error = Some(error);
    }

    /// Delay before the ready signal resolves
    pub fn set_ready_delay(&self, delay: Duration) {
        self.script().ready_delay = delay;
    }

    /// Run `hook` at the instant a popup is opened
    pub fn on_popup(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.script().popup_hook = Some(Arc::new(hook));
    }

    /// Run `hook` at the instant a redirect is issued, before it resolves
    pub fn on_redirect(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.script().redirect_hook = Some(Arc::new(hook));
    }

    /// How many times popup or redirect hooks ran
    #[must_use]
    pub fn hook_invocations(&self) -> usize {
        self.hook_invocations.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn was_called(&self, call: &ProviderCall) -> bool {
        self.call_count(call) > 0
    }

    #[must_use]
    pub fn call_count(&self, call: &ProviderCall) -> usize {
        self.calls().iter().filter(|recorded| *recorded == call).count()
    }

    async fn popup(&self, call: ProviderCall) -> Result<Identity, ProviderError> {
        self.record(call);
        let (hook, hang, next) = {
            let mut script = self.script();
            let hang = script.hang_popups;
            let next = if hang { None } else { script.popups.pop_front() };
            (script.popup_hook.clone(), hang, next)
        };
        self.run_hook(hook);

        if hang {
            std::future::pending::<()>().await;
        }

        let result = next.unwrap_or_else(|| {
            Err(ProviderError::new(
                codes::INTERNAL_ERROR,
                "no scripted popup result",
            ))
        });
        if let Ok(identity) = &result {
            self.set_identity(Some(identity.clone()));
        }
        result
    }

    fn redirect(&self, call: ProviderCall) -> Result<(), ProviderError> {
        self.record(call);
        let (hook, next) = {
            let mut script = self.script();
            (script.redirect_hook.clone(), script.redirect_starts.pop_front())
        };
        self.run_hook(hook);
        next.unwrap_or(Ok(()))
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn configure_persistence(&self) -> Result<(), ProviderError> {
        self.record(ProviderCall::ConfigurePersistence);
        match self.script().persistence_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn ready(&self) -> Result<(), ProviderError> {
        let delay = self.script().ready_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in_with_popup(&self, _provider_id: &str) -> Result<Identity, ProviderError> {
        self.popup(ProviderCall::SignInWithPopup).await
    }

    async fn link_with_popup(&self, _provider_id: &str) -> Result<Identity, ProviderError> {
        self.popup(ProviderCall::LinkWithPopup).await
    }

    async fn sign_in_with_redirect(&self, _provider_id: &str) -> Result<(), ProviderError> {
        self.redirect(ProviderCall::SignInWithRedirect)
    }

    async fn link_with_redirect(&self, _provider_id: &str) -> Result<(), ProviderError> {
        self.redirect(ProviderCall::LinkWithRedirect)
    }

    async fn fetch_redirect_result(&self) -> Result<Option<RedirectResult>, ProviderError> {
        self.record(ProviderCall::FetchRedirectResult);
        let result = self.script().redirect_result.take().unwrap_or(Ok(None));
        if let Ok(Some(redirect)) = &result {
            self.set_identity(Some(redirect.identity.clone()));
        }
        result
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError> {
        self.record(ProviderCall::SignInAnonymously);
        if let Some(error) = self.script().anonymous_error.clone() {
            return Err(error);
        }
        let identity = Identity::anonymous(&uuid::Uuid::new_v4().to_string());
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.record(ProviderCall::SignOut);
        self.set_identity(None);
        Ok(())
    }

    async fn sign_in_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<Identity, ProviderError> {
        self.record(ProviderCall::SignInWithCredential(credential.clone()));
        let account = self.script().credential_account.clone();
        match account {
            Some(identity) => {
                self.set_identity(Some(identity.clone()));
                Ok(identity)
            }
            None => Err(ProviderError::new(
                codes::INTERNAL_ERROR,
                "no account scripted for credential",
            )),
        }
    }
}

/// Wall clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn advance_millis(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(TEST_START_MILLIS)
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
