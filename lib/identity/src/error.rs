//! Error types for identity provider plugins.
//!
//! Provider construction is the only fallible step in the plugin contract.
//! Authentication outcomes are never errors: they are expressed as
//! [`IdentityAction`](crate::IdentityAction) values.

use std::fmt;

/// Errors raised while constructing an identity provider from its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// A required configuration parameter is absent.
    MissingParameter { provider: String, parameter: String },
    /// A configuration parameter has the wrong shape.
    InvalidParameter {
        provider: String,
        parameter: String,
        reason: String,
    },
    /// The provider's storage volume could not be prepared.
    VolumeUnavailable { volume_id: String, reason: String },
    /// The plugin failed while building the provider instance.
    ConstructionFailed { package: String, reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter {
                provider,
                parameter,
            } => {
                write!(f, "provider '{provider}' is missing parameter '{parameter}'")
            }
            Self::InvalidParameter {
                provider,
                parameter,
                reason,
            } => {
                write!(
                    f,
                    "provider '{provider}' has invalid parameter '{parameter}': {reason}"
                )
            }
            Self::VolumeUnavailable { volume_id, reason } => {
                write!(f, "volume '{volume_id}' is unavailable: {reason}")
            }
            Self::ConstructionFailed { package, reason } => {
                write!(f, "package '{package}' failed to construct provider: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_display() {
        let err = ProviderError::MissingParameter {
            provider: "corp-sso".to_string(),
            parameter: "users".to_string(),
        };
        assert!(err.to_string().contains("corp-sso"));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn construction_failed_display() {
        let err = ProviderError::ConstructionFailed {
            package: "warden.static".to_string(),
            reason: "panicked".to_string(),
        };
        assert!(err.to_string().contains("warden.static"));
        assert!(err.to_string().contains("panicked"));
    }
}
