//! Storage handles passed to identity providers at construction.

use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque storage a provider may use for its own state (key material,
/// cached directory data, pending flow state).
pub trait Volume: Send + Sync + fmt::Debug {
    /// Identifier of the volume.
    fn id(&self) -> &str;

    /// On-disk root of the volume, if it is backed by a directory.
    fn root(&self) -> Option<&Path>;
}

/// Volume backed by a directory on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryVolume {
    id: String,
    root: PathBuf,
}

impl DirectoryVolume {
    #[must_use]
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }
}

impl Volume for DirectoryVolume {
    fn id(&self) -> &str {
        &self.id
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
