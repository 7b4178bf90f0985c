//! Host configuration.
//!
//! Loaded via the `config` crate from `WARDEN__*` environment variables.
//! See [`SecurityConfig`] for the security manager settings.

use serde::Deserialize;
use std::path::PathBuf;
use warden_security::SecurityConfig;

/// Host configuration composed from library configs.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Security manager configuration.
    pub security: SecurityConfig,

    /// JSON file listing identity provider configurations.
    pub providers_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct HostSettings {
    #[serde(default = "default_providers_file")]
    providers_file: PathBuf,
}

fn default_providers_file() -> PathBuf {
    PathBuf::from("config/providers.json")
}

impl HostConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let settings: HostSettings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(Self {
            security: SecurityConfig::from_env()?,
            providers_file: settings.providers_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_file_has_default() {
        let settings: HostSettings = config::Config::builder()
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");
        assert_eq!(settings.providers_file, PathBuf::from("config/providers.json"));
    }
}
