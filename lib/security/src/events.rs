//! Change notifications consumed and provider events published by the
//! security manager.

use std::fmt;
use warden_identity::IDENTITY_CATEGORY;

/// A change in the host's configuration or package inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    ConfigurationAdded {
        category: String,
        configuration_id: String,
    },
    ConfigurationRemoved {
        category: String,
        configuration_id: String,
    },
    PackageAdded {
        category: String,
        package_id: String,
    },
    PackageRemoved {
        category: String,
        package_id: String,
    },
}

impl ChangeEvent {
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::ConfigurationAdded { category, .. }
            | Self::ConfigurationRemoved { category, .. }
            | Self::PackageAdded { category, .. }
            | Self::PackageRemoved { category, .. } => category,
        }
    }

    /// Returns true for changes to identity configurations or packages.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.category().eq_ignore_ascii_case(IDENTITY_CATEGORY)
    }

    /// Shorthand for an identity configuration being added or changed.
    #[must_use]
    pub fn identity_configuration_added(configuration_id: impl Into<String>) -> Self {
        Self::ConfigurationAdded {
            category: IDENTITY_CATEGORY.to_string(),
            configuration_id: configuration_id.into(),
        }
    }

    /// Shorthand for an identity configuration being removed.
    #[must_use]
    pub fn identity_configuration_removed(configuration_id: impl Into<String>) -> Self {
        Self::ConfigurationRemoved {
            category: IDENTITY_CATEGORY.to_string(),
            configuration_id: configuration_id.into(),
        }
    }
}

/// Published when the set of loaded providers changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Added { provider_id: String },
    Removed { provider_id: String },
}

impl ProviderEvent {
    #[must_use]
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Added { provider_id } | Self::Removed { provider_id } => provider_id,
        }
    }
}

impl fmt::Display for ProviderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { provider_id } => write!(f, "provider added: {provider_id}"),
            Self::Removed { provider_id } => write!(f, "provider removed: {provider_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_category_is_case_insensitive() {
        let event = ChangeEvent::PackageAdded {
            category: "Identity".to_string(),
            package_id: "warden.oidc".to_string(),
        };
        assert!(event.is_identity());

        let event = ChangeEvent::ConfigurationAdded {
            category: "api".to_string(),
            configuration_id: "x".to_string(),
        };
        assert!(!event.is_identity());
    }

    #[test]
    fn provider_event_display() {
        let event = ProviderEvent::Removed {
            provider_id: "sso".to_string(),
        };
        assert_eq!(event.provider_id(), "sso");
        assert_eq!(event.to_string(), "provider removed: sso");
    }
}
