use crate::models::Identity;
use crate::settings::ProviderSettings;

/// Decides whether an identity counts as signed in with the target provider
///
/// With `accept_any_linked` set, any non-anonymous identity is accepted,
/// whichever provider it is linked to. Otherwise the identity must carry
/// `provider_id` specifically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: String,
    pub accept_any_linked: bool,
}

impl ProviderPolicy {
    #[must_use]
    pub fn new(provider_id: &str, accept_any_linked: bool) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            accept_any_linked,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(&settings.provider_id, settings.accept_any_linked_identity)
    }

    #[must_use]
    pub fn is_established(&self, identity: &Identity) -> bool {
        if identity.is_anonymous {
            return false;
        }
        self.accept_any_linked || identity.has_provider(&self.provider_id)
    }

    /// Same as [`Self::is_established`] for an optional identity
    #[must_use]
    pub fn is_established_opt(&self, identity: Option<&Identity>) -> bool {
        identity.is_some_and(|identity| self.is_established(identity))
    }
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_is_never_established() {
        let policy = ProviderPolicy::new("google.com", true);
        assert!(!policy.is_established(&Identity::anonymous("anon")));
        assert!(!policy.is_established_opt(None));
    }

    #[test]
    fn test_broad_policy_accepts_other_providers() {
        let broad = ProviderPolicy::new("google.com", true);
        let strict = ProviderPolicy::new("google.com", false);
        let github = Identity::linked("user-1", "github.com");

        assert!(broad.is_established(&github));
        assert!(!strict.is_established(&github));
        assert!(strict.is_established(&Identity::linked("user-2", "google.com")));
    }

    #[test]
    fn test_default_policy_targets_google() {
        let policy = ProviderPolicy::default();
        assert_eq!(policy.provider_id, "google.com");
        assert!(policy.accept_any_linked);
    }
}
