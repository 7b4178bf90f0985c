//! Security manager configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Security manager configuration.
///
/// Loaded from environment variables prefixed with `WARDEN__`, for example
/// `WARDEN__PROFILES_DIR` or `WARDEN__RELOAD_DEBOUNCE_MS`.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Directory holding one `{id}.config.json` file per security profile.
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,

    /// Base directory for provider volumes.
    #[serde(default = "default_volumes_dir")]
    pub volumes_dir: PathBuf,

    /// Quiet period before a reload runs after a change notification.
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,

    /// Quiet period before profile edits are written to the store.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from("config/identity")
}

fn default_volumes_dir() -> PathBuf {
    PathBuf::from("volumes")
}

fn default_reload_debounce_ms() -> u64 {
    2000
}

fn default_save_debounce_ms() -> u64 {
    1000
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            profiles_dir: default_profiles_dir(),
            volumes_dir: default_volumes_dir(),
            reload_debounce_ms: default_reload_debounce_ms(),
            save_debounce_ms: default_save_debounce_ms(),
        }
    }
}

impl SecurityConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    #[must_use]
    pub fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.reload_debounce_ms)
    }

    #[must_use]
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}
