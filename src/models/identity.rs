//! Identity handle exposed by the identity provider
//!
//! The provider owns the identity; this crate only reads it and asks the
//! provider to mutate it through its defined operations.

use std::collections::BTreeSet;

/// Read-only view of the provider's current identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable unique id assigned by the provider
    pub uid: String,
    pub is_anonymous: bool,
    /// Linked external providers (e.g. `google.com`)
    pub provider_ids: BTreeSet<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    /// Create an anonymous identity with no linked providers
    #[must_use]
    pub fn anonymous(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            is_anonymous: true,
            provider_ids: BTreeSet::new(),
            display_name: None,
            email: None,
        }
    }

    /// Create an identity linked to a single external provider
    #[must_use]
    pub fn linked(uid: &str, provider_id: &str) -> Self {
        Self {
            uid: uid.to_string(),
            is_anonymous: false,
            provider_ids: BTreeSet::from([provider_id.to_string()]),
            display_name: None,
            email: None,
        }
    }

    /// Builder-style email setter
    #[must_use]
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    #[must_use]
    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.provider_ids.contains(provider_id)
    }
}

/// Provider credential, e.g. the one carried by a credential-already-in-use error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl Credential {
    #[must_use]
    pub fn new(provider_id: &str, id_token: Option<&str>, access_token: Option<&str>) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            id_token: id_token.map(ToString::to_string),
            access_token: access_token.map(ToString::to_string),
        }
    }
}

/// Which provider operation a flow performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOperation {
    /// Attach the provider credential to the current anonymous identity
    Link,
    /// Replace the current identity with the provider identity
    SignIn,
}

impl FlowOperation {
    /// Link when the current identity is anonymous, plain sign-in otherwise
    #[must_use]
    pub fn for_identity(identity: Option<&Identity>) -> Self {
        match identity {
            Some(identity) if identity.is_anonymous => Self::Link,
            _ => Self::SignIn,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::SignIn => "sign-in",
        }
    }
}

/// Result of a redirect that completed across a process restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResult {
    pub identity: Identity,
    pub credential: Option<Credential>,
    pub operation: FlowOperation,
}
