//! Identity-provider collaborator
//!
//! This module defines the interface this crate consumes from the identity
//! provider SDK, plus the policy deciding which identities count as
//! "signed in with the provider".

pub mod policy;

pub use policy::ProviderPolicy;

use crate::errors::ProviderError;
use crate::models::{Credential, Identity, RedirectResult};
use async_trait::async_trait;
use tokio::sync::watch;

/// Operations consumed from the identity provider
///
/// Every call may suspend. The redirect operations navigate away from the
/// current process when they succeed, so their `Ok(())` means "navigation has
/// begun", not "signed in".
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Configure durable session persistence; resolves once the provider confirms it
    ///
    /// # Errors
    /// Returns an error if the provider rejects the persistence mode.
    async fn configure_persistence(&self) -> Result<(), ProviderError>;

    /// Resolves once the provider has finished restoring any persisted session
    ///
    /// # Errors
    /// Returns an error if restoration failed.
    async fn ready(&self) -> Result<(), ProviderError>;

    /// Identity readable right now (possibly premature during restoration)
    fn current_identity(&self) -> Option<Identity>;

    /// Subscribe to identity changes
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// # Errors
    /// Returns the provider error on failure.
    async fn sign_in_with_popup(&self, provider_id: &str) -> Result<Identity, ProviderError>;

    /// # Errors
    /// Returns the provider error on failure.
    async fn link_with_popup(&self, provider_id: &str) -> Result<Identity, ProviderError>;

    /// # Errors
    /// Returns the provider error if navigation could not begin.
    async fn sign_in_with_redirect(&self, provider_id: &str) -> Result<(), ProviderError>;

    /// # Errors
    /// Returns the provider error if navigation could not begin.
    async fn link_with_redirect(&self, provider_id: &str) -> Result<(), ProviderError>;

    /// Result of a redirect that completed before this process started, if any
    ///
    /// # Errors
    /// Returns the provider error the redirect finished with.
    async fn fetch_redirect_result(&self) -> Result<Option<RedirectResult>, ProviderError>;

    /// # Errors
    /// Returns the provider error on failure.
    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError>;

    /// # Errors
    /// Returns the provider error on failure.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// # Errors
    /// Returns the provider error on failure.
    async fn sign_in_with_credential(&self, credential: &Credential)
        -> Result<Identity, ProviderError>;
}
