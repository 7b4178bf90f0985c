//! Provider configurations read from a JSON file.

use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};
use warden_identity::{IDENTITY_CATEGORY, ProviderConfiguration};
use warden_security::{ChangeEvent, ConfigurationSource};

/// Reads a JSON array of provider configurations on every scan.
///
/// A missing file yields no configurations. A file that cannot be read or
/// parsed is logged and the last good list is kept, so a half-saved edit
/// does not unload every provider.
#[derive(Debug)]
pub struct FileConfigurationSource {
    path: PathBuf,
    last_good: Mutex<Vec<ProviderConfiguration>>,
}

impl FileConfigurationSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(Vec::new()),
        }
    }

    /// The change event announcing that this file was edited.
    #[must_use]
    pub fn changed_event(&self) -> ChangeEvent {
        ChangeEvent::ConfigurationAdded {
            category: IDENTITY_CATEGORY.to_string(),
            configuration_id: self.path.display().to_string(),
        }
    }
}

impl ConfigurationSource for FileConfigurationSource {
    fn provider_configurations(&self) -> Vec<ProviderConfiguration> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "provider configuration file not found");
                self.last_good.lock().clear();
                return Vec::new();
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to read provider configurations"
                );
                return self.last_good.lock().clone();
            }
        };

        match serde_json::from_slice::<Vec<ProviderConfiguration>>(&contents) {
            Ok(configurations) => {
                *self.last_good.lock() = configurations.clone();
                configurations
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "invalid provider configuration file"
                );
                self.last_good.lock().clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::static_module;
    use std::sync::Arc;
    use warden_security::{InMemoryProfileStore, SecurityManager, StaticModuleLoader};

    const LOCAL: &str =
        r#"[{"id":"local","package_id":"warden.static","parameters":{"users":{"alice":["admin"]}}}]"#;

    #[test]
    fn reads_configuration_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("providers.json");
        std::fs::write(&path, LOCAL).expect("write");

        let configurations = FileConfigurationSource::new(&path).provider_configurations();
        assert_eq!(configurations.len(), 1);
        assert_eq!(configurations[0].id, "local");
        assert!(configurations[0].parameter("users").is_some());
    }

    #[test]
    fn missing_or_invalid_files_yield_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = FileConfigurationSource::new(dir.path().join("absent.json"));
        assert!(missing.provider_configurations().is_empty());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{").expect("write");
        assert!(FileConfigurationSource::new(&path).provider_configurations().is_empty());
    }

    #[test]
    fn invalid_edit_keeps_last_good_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("providers.json");
        std::fs::write(&path, LOCAL).expect("write");
        let source = FileConfigurationSource::new(&path);
        assert_eq!(source.provider_configurations().len(), 1);

        std::fs::write(&path, "[{").expect("rewrite");
        assert_eq!(source.provider_configurations().len(), 1);

        std::fs::remove_file(&path).expect("remove");
        assert!(source.provider_configurations().is_empty());
    }

    #[test]
    fn change_event_is_in_identity_category() {
        let source = FileConfigurationSource::new("config/providers.json");
        assert!(source.changed_event().is_identity());
    }

    #[tokio::test]
    async fn providers_deleted_from_file_are_unloaded_on_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("providers.json");
        std::fs::write(&path, LOCAL).expect("write");

        let loader = Arc::new(StaticModuleLoader::new());
        loader.register(static_module());
        let manager = SecurityManager::builder()
            .configuration_source(Arc::new(FileConfigurationSource::new(&path)))
            .module_loader(loader)
            .profile_store(Arc::new(InMemoryProfileStore::new()))
            .build();
        manager.load().await;
        assert!(manager.get_provider("local").is_some());

        std::fs::write(&path, "[]").expect("rewrite");
        manager.load().await;
        assert!(manager.get_provider("local").is_none());
    }
}
