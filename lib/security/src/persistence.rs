//! Durable storage for security profiles.
//!
//! Profiles are stored one per file as `{id}.config.json` under a
//! configuration directory. Files that fail to parse are skipped with a
//! warning so a single bad edit does not take every profile offline.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use warden_core::Result;
use warden_identity::SecurityProfile;

use crate::error::PersistenceError;

const PROFILE_SUFFIX: &str = ".config.json";

/// Storage backend for security profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Reads every stored profile.
    async fn load_all(&self) -> Result<Vec<SecurityProfile>, PersistenceError>;

    /// Writes one profile, replacing any stored copy.
    async fn save(&self, profile: &SecurityProfile) -> Result<(), PersistenceError>;

    /// Deletes a stored profile. Deleting a missing profile succeeds.
    async fn delete(&self, profile_id: &str) -> Result<(), PersistenceError>;
}

/// Stores profiles as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, profile_id: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !profile_id.is_empty()
            && profile_id != "."
            && profile_id != ".."
            && !profile_id.contains(['/', '\\']);
        if !valid {
            return Err(PersistenceError::InvalidProfileId {
                profile_id: profile_id.to_string(),
            }
            .into());
        }
        Ok(self.dir.join(format!("{profile_id}{PROFILE_SUFFIX}")))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn load_all(&self) -> Result<Vec<SecurityProfile>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("profile directory does not exist");
                return Ok(Vec::new());
            }
            Err(err) => return Err(io_error(&self.dir, err).into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            let is_profile = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(PROFILE_SUFFIX));
            if is_profile {
                paths.push(path);
            }
        }
        paths.sort();

        let mut profiles = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = tokio::fs::read(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            match serde_json::from_slice::<SecurityProfile>(&contents) {
                Ok(profile) => profiles.push(profile),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable security profile"
                    );
                }
            }
        }

        debug!(count = profiles.len(), "loaded security profiles");
        Ok(profiles)
    }

    #[instrument(skip(self, profile), fields(profile_id = %profile.id))]
    async fn save(&self, profile: &SecurityProfile) -> Result<(), PersistenceError> {
        let path = self.path_for(&profile.id)?;
        let contents =
            serde_json::to_vec_pretty(profile).map_err(|e| PersistenceError::Serialize {
                profile_id: profile.id.clone(),
                reason: e.to_string(),
            })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(path = %path.display(), "security profile written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, profile_id: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(profile_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path, err).into()),
        }
    }
}

/// Keeps profiles in memory. Useful for tests and embedded hosts that
/// persist elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<BTreeMap<String, SecurityProfile>>,
}

impl InMemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_profiles(profiles: impl IntoIterator<Item = SecurityProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            profiles: Mutex::new(profiles),
        }
    }

    /// Returns a copy of a stored profile.
    #[must_use]
    pub fn get(&self, profile_id: &str) -> Option<SecurityProfile> {
        self.profiles.lock().get(profile_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.lock().is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load_all(&self) -> Result<Vec<SecurityProfile>, PersistenceError> {
        Ok(self.profiles.lock().values().cloned().collect())
    }

    async fn save(&self, profile: &SecurityProfile) -> Result<(), PersistenceError> {
        self.profiles
            .lock()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn delete(&self, profile_id: &str) -> Result<(), PersistenceError> {
        self.profiles.lock().remove(profile_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_identity::IdentityAssignment;

    fn profile(id: &str) -> SecurityProfile {
        SecurityProfile::new(id)
            .with_provider("sso")
            .with_priority(5)
            .with_assignment(
                IdentityAssignment::new(format!("{id}-a1"), "app:*")
                    .with_roles(["admin"])
                    .with_permissions(["read"]),
            )
    }

    #[tokio::test]
    async fn file_store_round_trips_profiles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileProfileStore::new(dir.path().join("identity"));

        store.save(&profile("p1")).await.expect("save p1");
        store.save(&profile("p2")).await.expect("save p2");
        assert!(dir.path().join("identity/p1.config.json").exists());

        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded, vec![profile("p1"), profile("p2")]);

        store.delete("p1").await.expect("delete");
        store.delete("p1").await.expect("delete is idempotent");
        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded, vec![profile("p2")]);
    }

    #[tokio::test]
    async fn missing_directory_loads_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileProfileStore::new(dir.path().join("absent"));
        assert!(store.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileProfileStore::new(dir.path());

        store.save(&profile("good")).await.expect("save");
        std::fs::write(dir.path().join("bad.config.json"), b"{ not json").expect("write");
        std::fs::write(dir.path().join("notes.txt"), b"ignored").expect("write");

        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded, vec![profile("good")]);
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileProfileStore::new(dir.path());

        let err = store.save(&profile("../escape")).await.expect_err("rejected");
        assert!(err.to_string().contains("invalid profile id '../escape'"));
        assert!(store.delete("").await.is_err());
    }

    #[tokio::test]
    async fn memory_store_replaces_by_id() {
        let store = InMemoryProfileStore::with_profiles([profile("p1")]);
        store
            .save(&profile("p1").with_priority(9))
            .await
            .expect("save");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("p1").map(|p| p.priority), Some(9));

        store.delete("p1").await.expect("delete");
        assert!(store.is_empty());
    }
}
