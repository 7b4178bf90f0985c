//! Persistence error types.

use std::fmt;

/// Errors raised while reading or writing security profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Filesystem access failed.
    Io {
        /// The path being accessed.
        path: String,
        /// Error details.
        reason: String,
    },
    /// A profile could not be serialized.
    Serialize {
        /// The profile being written.
        profile_id: String,
        /// Error details.
        reason: String,
    },
    /// A profile id cannot be used as a file name.
    InvalidProfileId {
        /// The offending id.
        profile_id: String,
    },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, reason } => {
                write!(f, "failed to access '{}': {}", path, reason)
            }
            Self::Serialize { profile_id, reason } => {
                write!(f, "failed to serialize profile '{}': {}", profile_id, reason)
            }
            Self::InvalidProfileId { profile_id } => {
                write!(f, "invalid profile id '{}'", profile_id)
            }
        }
    }
}

impl std::error::Error for PersistenceError {}
