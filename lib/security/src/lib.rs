//! Security manager for warden.
//!
//! Ties identity providers to protected resources through security
//! profiles. The [`SecurityManager`] authenticates requests by walking the
//! profiles covering a resource in priority order, rewrites provider roles
//! into permissions, remembers which provider issued each session so it can
//! be revoked, and keeps providers and profiles in step with their
//! configuration through debounced reloads and saves.

mod config;
mod debounce;
mod error;
mod events;
mod manager;
mod persistence;
mod plugin;
mod registry;

pub use config::SecurityConfig;
pub use debounce::Debouncer;
pub use error::PersistenceError;
pub use events::{ChangeEvent, ProviderEvent};
pub use manager::{Authorization, SecurityManager, SecurityManagerBuilder};
pub use persistence::{FileProfileStore, InMemoryProfileStore, ProfileStore};
pub use plugin::{
    ConfigurationSource, DirectoryVolumeProvider, ModuleLoader, ProviderModule,
    StaticConfigurationSource, StaticModuleLoader, VolumeProvider,
};
pub use registry::PolicyRegistry;
