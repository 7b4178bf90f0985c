//! The user carried by an authenticated session.
//!
//! Identity providers decide what a user id means (an OIDC subject, a
//! directory account name, a badge number). The manager never interprets
//! it; it only copies it through role mapping.

use serde::{Deserialize, Serialize};

/// A user as reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    /// Provider-scoped unique identifier.
    id: String,
    /// Human readable name, if the provider knows one.
    display_name: Option<String>,
    /// Email address, if the provider knows one.
    email: Option<String>,
}

impl IdentityUser {
    /// Creates a user with only an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
