//! Collaborators the security manager uses to discover and construct
//! identity providers.
//!
//! A [`ConfigurationSource`] lists provider configurations, a
//! [`ModuleLoader`] resolves each configuration's package to a
//! [`ProviderModule`], and a [`VolumeProvider`] hands out the storage each
//! provider instance receives.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use warden_identity::{DirectoryVolume, ProviderConfiguration, ProviderFactory, Volume};

/// An installed identity plugin package.
#[derive(Clone)]
pub struct ProviderModule {
    pub package_id: String,
    pub package_version: Option<String>,
    /// Content hash of the package. A change triggers a provider rebuild.
    pub package_hash: String,
    pub factory: Arc<dyn ProviderFactory>,
}

impl ProviderModule {
    /// Creates a module whose hash is derived from its id and version.
    pub fn new<F>(
        package_id: impl Into<String>,
        package_version: Option<String>,
        factory: F,
    ) -> Self
    where
        F: ProviderFactory + 'static,
    {
        let package_id = package_id.into();
        let mut hasher = Sha256::new();
        hasher.update(package_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(package_version.as_deref().unwrap_or_default().as_bytes());
        Self {
            package_hash: hex::encode(hasher.finalize()),
            package_id,
            package_version,
            factory: Arc::new(factory),
        }
    }

    /// Overrides the package hash, e.g. with a digest of the package archive.
    #[must_use]
    pub fn with_hash(mut self, package_hash: impl Into<String>) -> Self {
        self.package_hash = package_hash.into();
        self
    }
}

impl fmt::Debug for ProviderModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderModule")
            .field("package_id", &self.package_id)
            .field("package_version", &self.package_version)
            .field("package_hash", &self.package_hash)
            .finish_non_exhaustive()
    }
}

/// Resolves plugin packages by id and optional version.
pub trait ModuleLoader: Send + Sync {
    fn get(&self, package_id: &str, package_version: Option<&str>) -> Option<ProviderModule>;
}

/// Module loader backed by modules registered in process.
///
/// A request without a version resolves to the most recently registered
/// version of the package.
#[derive(Debug, Default)]
pub struct StaticModuleLoader {
    modules: RwLock<HashMap<String, Vec<ProviderModule>>>,
}

impl StaticModuleLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module, replacing one with the same id and version.
    pub fn register(&self, module: ProviderModule) {
        let mut modules = self.modules.write();
        let versions = modules.entry(module.package_id.clone()).or_default();
        versions.retain(|m| m.package_version != module.package_version);
        versions.push(module);
    }

    /// Removes a module. Returns true if it was registered.
    pub fn unregister(&self, package_id: &str, package_version: Option<&str>) -> bool {
        let mut modules = self.modules.write();
        let Some(versions) = modules.get_mut(package_id) else {
            return false;
        };
        let before = versions.len();
        versions.retain(|m| m.package_version.as_deref() != package_version);
        let removed = versions.len() != before;
        if versions.is_empty() {
            modules.remove(package_id);
        }
        removed
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn get(&self, package_id: &str, package_version: Option<&str>) -> Option<ProviderModule> {
        let modules = self.modules.read();
        let versions = modules.get(package_id)?;
        match package_version {
            Some(version) => versions
                .iter()
                .find(|m| m.package_version.as_deref() == Some(version))
                .cloned(),
            None => versions.last().cloned(),
        }
    }
}

/// Hands out storage volumes by id.
pub trait VolumeProvider: Send + Sync {
    fn get_volume(&self, volume_id: &str) -> Arc<dyn Volume>;
}

/// Maps each volume id to a subdirectory of a base directory.
#[derive(Debug, Clone)]
pub struct DirectoryVolumeProvider {
    base: PathBuf,
}

impl DirectoryVolumeProvider {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl VolumeProvider for DirectoryVolumeProvider {
    fn get_volume(&self, volume_id: &str) -> Arc<dyn Volume> {
        Arc::new(DirectoryVolume::new(volume_id, self.base.join(volume_id)))
    }
}

/// Lists the identity provider configurations to load.
pub trait ConfigurationSource: Send + Sync {
    fn provider_configurations(&self) -> Vec<ProviderConfiguration>;
}

/// Configuration source holding configurations in memory.
#[derive(Debug, Default)]
pub struct StaticConfigurationSource {
    configurations: RwLock<Vec<ProviderConfiguration>>,
}

impl StaticConfigurationSource {
    #[must_use]
    pub fn new(configurations: Vec<ProviderConfiguration>) -> Self {
        Self {
            configurations: RwLock::new(configurations),
        }
    }

    /// Adds a configuration, replacing one with the same id.
    pub fn upsert(&self, configuration: ProviderConfiguration) {
        let mut configurations = self.configurations.write();
        match configurations.iter_mut().find(|c| c.id == configuration.id) {
            Some(existing) => *existing = configuration,
            None => configurations.push(configuration),
        }
    }

    pub fn remove(&self, configuration_id: &str) -> Option<ProviderConfiguration> {
        let mut configurations = self.configurations.write();
        let position = configurations.iter().position(|c| c.id == configuration_id)?;
        Some(configurations.remove(position))
    }
}

impl ConfigurationSource for StaticConfigurationSource {
    fn provider_configurations(&self) -> Vec<ProviderConfiguration> {
        self.configurations.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause::Report;
    use warden_identity::{IdentityProvider, ProviderError};

    fn unavailable(
        configuration: &ProviderConfiguration,
        _volume: Arc<dyn Volume>,
    ) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>> {
        Err(ProviderError::ConstructionFailed {
            package: configuration.package_id.clone(),
            reason: "test".to_string(),
        }
        .into())
    }

    #[test]
    fn module_hash_tracks_version() {
        let v1 = ProviderModule::new("warden.static", Some("1.0.0".to_string()), unavailable);
        let v1_again = ProviderModule::new("warden.static", Some("1.0.0".to_string()), unavailable);
        let v2 = ProviderModule::new("warden.static", Some("2.0.0".to_string()), unavailable);

        assert_eq!(v1.package_hash, v1_again.package_hash);
        assert_ne!(v1.package_hash, v2.package_hash);
        assert_eq!(v1.with_hash("abc").package_hash, "abc");
    }

    #[test]
    fn loader_resolves_versions() {
        let loader = StaticModuleLoader::new();
        loader.register(ProviderModule::new("pkg", Some("1.0".to_string()), unavailable));
        loader.register(ProviderModule::new("pkg", Some("2.0".to_string()), unavailable));

        let version = |v: Option<&str>| loader.get("pkg", v).and_then(|m| m.package_version);
        assert_eq!(version(Some("1.0")).as_deref(), Some("1.0"));
        assert_eq!(version(None).as_deref(), Some("2.0"));
        assert_eq!(version(Some("3.0")), None);
        assert!(loader.get("other", None).is_none());

        assert!(loader.unregister("pkg", Some("2.0")));
        assert!(!loader.unregister("pkg", Some("2.0")));
        assert_eq!(version(None).as_deref(), Some("1.0"));
    }

    #[test]
    fn register_replaces_same_version() {
        let loader = StaticModuleLoader::new();
        loader.register(ProviderModule::new("pkg", None, unavailable).with_hash("old"));
        loader.register(ProviderModule::new("pkg", None, unavailable).with_hash("new"));

        assert_eq!(
            loader.get("pkg", None).map(|m| m.package_hash).as_deref(),
            Some("new")
        );
        assert!(loader.unregister("pkg", None));
        assert!(loader.get("pkg", None).is_none());
    }

    #[test]
    fn volumes_live_under_base_directory() {
        let volumes = DirectoryVolumeProvider::new("/var/lib/warden/volumes");
        let volume = volumes.get_volume("corp-sso");
        assert_eq!(volume.id(), "corp-sso");
        assert_eq!(
            volume.root(),
            Some(std::path::Path::new("/var/lib/warden/volumes/corp-sso"))
        );
    }

    #[test]
    fn static_source_upserts_by_id() {
        let source = StaticConfigurationSource::default();
        source.upsert(ProviderConfiguration::new("sso", "warden.oidc"));
        source.upsert(ProviderConfiguration::new("sso", "warden.saml"));
        source.upsert(ProviderConfiguration::new("local", "warden.static"));

        let configurations = source.provider_configurations();
        assert_eq!(configurations.len(), 2);
        assert_eq!(configurations[0].package_id, "warden.saml");

        assert!(source.remove("sso").is_some());
        assert!(source.remove("sso").is_none());
        assert_eq!(source.provider_configurations().len(), 1);
    }
}
