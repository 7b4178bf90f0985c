//! The security manager: authenticates requests against identity providers,
//! maps provider roles to permissions, and tracks which provider issued
//! each session.
//!
//! All registries live behind one lock. Providers are never called while it
//! is held, so a provider may query the manager through its
//! [`SecurityContext`] during any flow.

use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use warden_core::{RequestId, Result};
use warden_identity::{
    AuthenticationRequest, AuthenticationResponse, CallbackRequest, CallbackResponse,
    IdentityAction, IdentityAssignment, IdentityProvider, IdentityResource, ProviderConfiguration,
    ResourceType, RoleSet, SecurityContext, SecurityProfile, Session, SessionCloseRequest,
    SessionCloseResponse, SessionId,
};

use crate::config::SecurityConfig;
use crate::debounce::Debouncer;
use crate::error::PersistenceError;
use crate::events::{ChangeEvent, ProviderEvent};
use crate::persistence::{FileProfileStore, ProfileStore};
use crate::plugin::{
    ConfigurationSource, DirectoryVolumeProvider, ModuleLoader, ProviderModule,
    StaticConfigurationSource, StaticModuleLoader, VolumeProvider,
};
use crate::registry::PolicyRegistry;

const EVENT_CAPACITY: usize = 64;

/// Result of checking a session against a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied,
    UnknownResource,
}

impl Authorization {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Hashes of the configuration and package a provider was last built from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstalledProvider {
    configuration_hash: String,
    package_hash: String,
    /// Listed by the configuration source rather than added directly.
    sourced: bool,
}

#[derive(Default)]
struct State {
    registry: PolicyRegistry,
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
    requests: HashMap<RequestId, AuthenticationRequest>,
    session_providers: HashMap<SessionId, String>,
    installed: HashMap<String, InstalledProvider>,
}

struct Inner {
    state: Mutex<State>,
    configurations: Arc<dyn ConfigurationSource>,
    modules: Arc<dyn ModuleLoader>,
    volumes: Arc<dyn VolumeProvider>,
    store: Arc<dyn ProfileStore>,
    events: broadcast::Sender<ProviderEvent>,
    reload: Debouncer,
    persist: Debouncer,
}

/// Orchestrates authentication, revocation and callbacks across identity
/// providers.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SecurityManager {
    inner: Arc<Inner>,
}

/// Builder for [`SecurityManager`].
///
/// Collaborators that are not set fall back to:
/// - an empty [`StaticConfigurationSource`]
/// - an empty [`StaticModuleLoader`]
/// - a [`DirectoryVolumeProvider`] rooted at `volumes_dir`
/// - a [`FileProfileStore`] rooted at `profiles_dir`
#[derive(Default)]
pub struct SecurityManagerBuilder {
    config: SecurityConfig,
    configurations: Option<Arc<dyn ConfigurationSource>>,
    modules: Option<Arc<dyn ModuleLoader>>,
    volumes: Option<Arc<dyn VolumeProvider>>,
    store: Option<Arc<dyn ProfileStore>>,
}

impl SecurityManagerBuilder {
    #[must_use]
    pub fn config(mut self, config: SecurityConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn configuration_source(mut self, source: Arc<dyn ConfigurationSource>) -> Self {
        self.configurations = Some(source);
        self
    }

    #[must_use]
    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.modules = Some(loader);
        self
    }

    #[must_use]
    pub fn volume_provider(mut self, volumes: Arc<dyn VolumeProvider>) -> Self {
        self.volumes = Some(volumes);
        self
    }

    #[must_use]
    pub fn profile_store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityManager {
        let config = self.config;
        let configurations = self
            .configurations
            .unwrap_or_else(|| Arc::new(StaticConfigurationSource::default()));
        let modules = self
            .modules
            .unwrap_or_else(|| Arc::new(StaticModuleLoader::default()));
        let volumes = self
            .volumes
            .unwrap_or_else(|| Arc::new(DirectoryVolumeProvider::new(&config.volumes_dir)));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileProfileStore::new(&config.profiles_dir)));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let reload = {
                let weak = weak.clone();
                Debouncer::new("reload", config.reload_debounce(), move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            SecurityManager { inner }.load().await;
                        }
                    }
                    .boxed()
                })
            };

            let persist = {
                let weak = weak.clone();
                Debouncer::new("save", config.save_debounce(), move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade()
                            && let Err(report) = (SecurityManager { inner }).save().await
                        {
                            warn!(error = %report, "failed to persist security profiles");
                        }
                    }
                    .boxed()
                })
            };

            Inner {
                state: Mutex::new(State::default()),
                configurations,
                modules,
                volumes,
                store,
                events,
                reload,
                persist,
            }
        });

        SecurityManager { inner }
    }
}

impl SecurityManager {
    #[must_use]
    pub fn builder() -> SecurityManagerBuilder {
        SecurityManagerBuilder::default()
    }

    // Authentication

    /// Authenticates a request for a resource.
    ///
    /// Profiles covering the resource are consulted from highest to lowest
    /// priority. The first provider response that carries a session, or that
    /// redirects or fails, is returned. A resource without profiles is open
    /// and receives an unrestricted anonymous session.
    #[instrument(skip_all, fields(request_id = %request.id, resource_id = %request.resource_id))]
    pub async fn authenticate(&self, request: AuthenticationRequest) -> AuthenticationResponse {
        if request.resource_id.is_empty() {
            return AuthenticationResponse::error(&request, "no resource specified");
        }

        let mut profiles = {
            let mut state = self.inner.state.lock();
            state.requests.insert(request.id, request.clone());
            state.registry.profiles_by_resource(&request.resource_id)
        };

        if profiles.is_empty() {
            debug!("no security profile covers resource, granting anonymous access");
            return AuthenticationResponse::new(
                request.id,
                None,
                &request.resource_id,
                IdentityAction::success().with_message(format!(
                    "no identity profile found for resource {}",
                    request.resource_id
                )),
                Some(Session::unrestricted(request.parameters.clone())),
            );
        }

        profiles.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let mut diagnostic = None;
        for profile in &profiles {
            let Some(provider_id) = profile.provider() else {
                debug!(profile_id = %profile.id, "profile has no provider, access is open");
                return AuthenticationResponse::new(
                    request.id,
                    None,
                    &request.resource_id,
                    IdentityAction::success().with_message(format!(
                        "no provider configured for resource {}",
                        request.resource_id
                    )),
                    None,
                );
            };

            let (assignments, provider) = {
                let state = self.inner.state.lock();
                (
                    state
                        .registry
                        .matching_assignments(&profile.id, &request.resource_id),
                    state.providers.get(provider_id).cloned(),
                )
            };

            let Some(assignments) = assignments else {
                warn!(profile_id = %profile.id, "identity profile has no assignments");
                diagnostic = Some(format!("identity profile not found: {}", profile.id));
                continue;
            };
            let Some(provider) = provider else {
                warn!(profile_id = %profile.id, provider_id, "identity provider not found");
                diagnostic = Some(format!("identity provider not found: {provider_id}"));
                continue;
            };

            let response = provider.authenticate(self, &request).await;

            if let Some(session) = &response.session
                && !session.session_id().is_empty()
            {
                self.inner
                    .state
                    .lock()
                    .session_providers
                    .insert(session.session_id().clone(), provider.id().to_string());
            }

            let response = map_session_roles(response, &assignments, provider.id());
            if response.is_terminal() {
                debug!(
                    profile_id = %profile.id,
                    provider_id,
                    action = %response.action_type(),
                    "authentication resolved"
                );
                return response;
            }

            debug!(
                profile_id = %profile.id,
                provider_id,
                action = %response.action_type(),
                "provider did not resolve request, trying next profile"
            );
        }

        let message = diagnostic.unwrap_or_else(|| {
            format!(
                "no identity provider resolved resource {}",
                request.resource_id
            )
        });
        AuthenticationResponse::error(&request, message)
    }

    /// Closes a session through the provider that issued it.
    ///
    /// Returns an empty response if the session or its provider is unknown.
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    pub async fn revoke(&self, request: SessionCloseRequest) -> SessionCloseResponse {
        if request.session_id.is_empty() {
            return SessionCloseResponse::default();
        }

        let provider = {
            let state = self.inner.state.lock();
            state
                .session_providers
                .get(&request.session_id)
                .and_then(|provider_id| state.providers.get(provider_id))
                .cloned()
        };
        let Some(provider) = provider else {
            debug!("no provider recorded for session");
            return SessionCloseResponse::default();
        };

        let response = provider.revoke(self, &request).await;
        let closed = response
            .action
            .as_ref()
            .is_some_and(|action| action.action_type() == warden_identity::ActionType::Success);
        if closed {
            self.inner
                .state
                .lock()
                .session_providers
                .remove(&request.session_id);
        }
        response
    }

    /// Hands a callback to the named provider.
    ///
    /// Returns an empty response if the provider is unknown.
    #[instrument(skip(self, request))]
    pub async fn callback(&self, provider_id: &str, request: CallbackRequest) -> CallbackResponse {
        let Some(provider) = self.get_provider(provider_id) else {
            debug!("callback for unknown provider");
            return CallbackResponse::default();
        };

        let response = provider.handle_callback(self, &request).await;
        if let Some(session) = &response.session
            && !session.session_id().is_empty()
        {
            self.inner
                .state
                .lock()
                .session_providers
                .insert(session.session_id().clone(), provider.id().to_string());
        }
        response
    }

    /// Checks whether a session may access a registered resource.
    ///
    /// An exact registration is preferred over a matching pattern.
    #[must_use]
    pub fn authorize(&self, resource_id: &str, session: &Session) -> Authorization {
        let state = self.inner.state.lock();
        match state.registry.resolve_resource(resource_id) {
            None => Authorization::UnknownResource,
            Some(resource) if resource.permits(session.roles()) => Authorization::Allowed,
            Some(_) => Authorization::Denied,
        }
    }

    #[must_use]
    pub fn get_authentication_request(
        &self,
        request_id: RequestId,
    ) -> Option<AuthenticationRequest> {
        self.inner.state.lock().requests.get(&request_id).cloned()
    }

    /// Drops a cached request once its flow has completed.
    pub fn remove_authentication_request(
        &self,
        request_id: RequestId,
    ) -> Option<AuthenticationRequest> {
        self.inner.state.lock().requests.remove(&request_id)
    }

    /// Returns the provider that issued a session.
    #[must_use]
    pub fn session_provider(&self, session_id: &SessionId) -> Option<String> {
        self.inner.state.lock().session_providers.get(session_id).cloned()
    }

    // Resources

    pub fn add_resource<I, S>(&self, resource_type: ResourceType, resource_id: &str, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resource = IdentityResource::new(resource_type, resource_id, permissions);
        if !self.inner.state.lock().registry.add_resource(resource) {
            debug!("resource with empty id ignored");
        }
    }

    pub fn remove_resource(&self, resource_id: &str) {
        self.inner.state.lock().registry.remove_resource(resource_id);
    }

    #[must_use]
    pub fn get_resource(&self, resource_id: &str) -> Option<IdentityResource> {
        self.inner.state.lock().registry.resource(resource_id).cloned()
    }

    // Profiles

    /// Returns every profile, ordered by id.
    #[must_use]
    pub fn get_profiles(&self) -> Vec<SecurityProfile> {
        let mut profiles: Vec<SecurityProfile> =
            self.inner.state.lock().registry.profiles().cloned().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles
    }

    #[must_use]
    pub fn get_profile(&self, profile_id: &str) -> Option<SecurityProfile> {
        self.inner.state.lock().registry.profile(profile_id).cloned()
    }

    #[must_use]
    pub fn get_profiles_by_resource_id(&self, resource_id: &str) -> Vec<SecurityProfile> {
        self.inner.state.lock().registry.profiles_by_resource(resource_id)
    }

    /// Inserts or replaces a profile and schedules a save.
    #[instrument(skip_all, fields(profile_id = %profile.id))]
    pub fn add_profile(&self, profile: SecurityProfile) {
        if self.inner.state.lock().registry.upsert_profile(profile) {
            self.inner.persist.trigger();
        } else {
            debug!("profile with empty id ignored");
        }
    }

    /// Creates an empty profile bound to a provider.
    pub fn create_profile(&self, profile_id: &str, provider_id: &str, description: Option<&str>) {
        let mut profile = SecurityProfile::new(profile_id).with_provider(provider_id);
        profile.description = description.map(str::to_string);
        self.add_profile(profile);
    }

    /// Adds an assignment to a profile and schedules a save.
    #[instrument(skip(self, assignment), fields(assignment_id = %assignment.id))]
    pub fn add_assignment(&self, profile_id: &str, assignment: IdentityAssignment) {
        if profile_id.is_empty() {
            return;
        }
        if self
            .inner
            .state
            .lock()
            .registry
            .add_assignment(profile_id, assignment)
        {
            self.inner.persist.trigger();
        }
    }

    /// Removes an assignment from whichever profile holds it.
    pub fn remove_assignment(&self, assignment_id: &str) {
        let removed = self
            .inner
            .state
            .lock()
            .registry
            .remove_assignment(assignment_id);
        if removed.is_some() {
            self.inner.persist.trigger();
        }
    }

    /// Removes a profile and deletes its stored copy.
    ///
    /// The in-memory removal stands even if the store fails.
    #[instrument(skip(self))]
    pub async fn remove_profile(&self, profile_id: &str) {
        let removed = self.inner.state.lock().registry.remove_profile(profile_id);
        if removed.is_none() {
            return;
        }

        if let Err(report) = self.inner.store.delete(profile_id).await {
            warn!(error = %report, "failed to delete stored security profile");
        }
    }

    // Providers

    #[must_use]
    pub fn get_providers(&self) -> Vec<Arc<dyn IdentityProvider>> {
        let mut providers: Vec<Arc<dyn IdentityProvider>> =
            self.inner.state.lock().providers.values().cloned().collect();
        providers.sort_by(|a, b| a.id().cmp(b.id()));
        providers
    }

    #[must_use]
    pub fn get_provider(&self, provider_id: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.inner.state.lock().providers.get(provider_id).cloned()
    }

    /// Registers a provider instance, replacing one with the same id.
    pub fn load_provider(&self, provider: Arc<dyn IdentityProvider>) {
        let provider_id = provider.id().to_string();
        if provider_id.is_empty() {
            warn!("identity provider with empty id ignored");
            return;
        }

        self.inner
            .state
            .lock()
            .providers
            .insert(provider_id.clone(), provider);
        info!(provider_id = %provider_id, "identity provider loaded");
        // No receivers is not an error.
        let _ = self.inner.events.send(ProviderEvent::Added { provider_id });
    }

    /// Builds and registers a provider from its configuration right away.
    ///
    /// Returns false if the package is unavailable or construction fails.
    #[instrument(skip_all, fields(configuration_id = %configuration.id))]
    pub fn add_provider_configuration(&self, configuration: &ProviderConfiguration) -> bool {
        let Some(module) = self.resolve_module(configuration) else {
            return false;
        };
        let installed = self.install(&module, configuration);
        self.record_installed(&module, configuration, false);
        installed
    }

    /// Drops the provider built from a configuration.
    #[instrument(skip(self))]
    pub fn remove_provider_configuration(&self, configuration_id: &str) {
        let removed = {
            let mut state = self.inner.state.lock();
            state.installed.remove(configuration_id);
            state.providers.remove(configuration_id)
        };

        if removed.is_some() {
            info!("identity provider removed");
            let _ = self.inner.events.send(ProviderEvent::Removed {
                provider_id: configuration_id.to_string(),
            });
        }
    }

    /// Subscribes to provider added/removed events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.events.subscribe()
    }

    // Loading and persistence

    /// Rebuilds changed providers, then re-adds stored profiles.
    #[instrument(skip(self))]
    pub async fn load(&self) {
        self.load_providers();
        self.load_profiles().await;
    }

    /// Writes every profile to the store.
    ///
    /// # Errors
    ///
    /// Returns the first store failure; profiles after it are not written.
    #[instrument(skip(self))]
    pub async fn save(&self) -> Result<(), PersistenceError> {
        let profiles = self.get_profiles();
        for profile in &profiles {
            self.inner.store.save(profile).await?;
        }
        debug!(count = profiles.len(), "security profiles saved");
        Ok(())
    }

    /// Schedules a debounced reload.
    pub fn schedule_reload(&self) {
        self.inner.reload.trigger();
    }

    /// Reacts to a configuration or package change.
    #[instrument(skip(self))]
    pub fn handle_change(&self, event: ChangeEvent) {
        if !event.is_identity() {
            return;
        }

        if let ChangeEvent::ConfigurationRemoved {
            configuration_id, ..
        } = &event
        {
            self.remove_provider_configuration(configuration_id);
        }
        self.schedule_reload();
    }

    /// Spawns a task applying change events until the channel closes.
    pub fn watch(&self, mut changes: mpsc::Receiver<ChangeEvent>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = changes.recv().await {
                manager.handle_change(event);
            }
            debug!("change stream closed");
        })
    }

    fn load_providers(&self) {
        let mut listed = HashSet::new();
        for configuration in self.inner.configurations.provider_configurations() {
            if configuration.id.is_empty() {
                continue;
            }
            listed.insert(configuration.id.clone());
            let Some(module) = self.resolve_module(&configuration) else {
                continue;
            };

            let unchanged = self
                .inner
                .state
                .lock()
                .installed
                .get(&configuration.id)
                .is_some_and(|installed| {
                    installed.configuration_hash == configuration.content_hash()
                        && installed.package_hash == module.package_hash
                });
            if unchanged {
                continue;
            }

            self.install(&module, &configuration);
            self.record_installed(&module, &configuration, true);
        }

        // Configurations the source no longer lists.
        let stale: Vec<String> = self
            .inner
            .state
            .lock()
            .installed
            .iter()
            .filter(|(id, installed)| installed.sourced && !listed.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for configuration_id in stale {
            self.remove_provider_configuration(&configuration_id);
        }
    }

    async fn load_profiles(&self) {
        match self.inner.store.load_all().await {
            Ok(profiles) => {
                let mut state = self.inner.state.lock();
                for profile in profiles {
                    state.registry.upsert_profile(profile);
                }
            }
            Err(report) => {
                warn!(error = %report, "failed to load security profiles");
            }
        }
    }

    fn resolve_module(&self, configuration: &ProviderConfiguration) -> Option<ProviderModule> {
        let module = self.inner.modules.get(
            &configuration.package_id,
            configuration.package_version.as_deref(),
        );
        if module.is_none() {
            debug!(
                configuration_id = %configuration.id,
                package_id = %configuration.package_id,
                "identity package not available"
            );
        }
        module
    }

    fn record_installed(
        &self,
        module: &ProviderModule,
        configuration: &ProviderConfiguration,
        sourced: bool,
    ) {
        self.inner.state.lock().installed.insert(
            configuration.id.clone(),
            InstalledProvider {
                configuration_hash: configuration.content_hash(),
                package_hash: module.package_hash.clone(),
                sourced,
            },
        );
    }

    fn install(&self, module: &ProviderModule, configuration: &ProviderConfiguration) -> bool {
        let volume = self.inner.volumes.get_volume(configuration.volume_id());
        let created = std::panic::catch_unwind(AssertUnwindSafe(|| {
            module.factory.create(configuration, volume)
        }));

        match created {
            Ok(Ok(provider)) => {
                self.load_provider(provider);
                true
            }
            Ok(Err(report)) => {
                warn!(
                    configuration_id = %configuration.id,
                    package_id = %module.package_id,
                    error = %report,
                    "failed to construct identity provider"
                );
                false
            }
            Err(_) => {
                warn!(
                    configuration_id = %configuration.id,
                    package_id = %module.package_id,
                    "identity provider factory panicked"
                );
                false
            }
        }
    }
}

impl SecurityContext for SecurityManager {
    fn authentication_request(&self, request_id: RequestId) -> Option<AuthenticationRequest> {
        self.get_authentication_request(request_id)
    }

    fn resource(&self, resource_id: &str) -> Option<IdentityResource> {
        self.get_resource(resource_id)
    }

    fn profiles_for_resource(&self, resource_id: &str) -> Vec<SecurityProfile> {
        self.get_profiles_by_resource_id(resource_id)
    }
}

/// Rewrites the session's roles into the permissions granted by
/// `assignments`.
///
/// An authenticated session that maps to no permissions is rejected. An
/// anonymous one is passed through unchanged.
fn map_session_roles(
    mut response: AuthenticationResponse,
    assignments: &[IdentityAssignment],
    provider_id: &str,
) -> AuthenticationResponse {
    let Some(session) = response.session.take() else {
        return response;
    };

    let mapped = mapped_permissions(session.roles(), assignments);
    if !mapped.is_empty() {
        response.session = Some(session.remapped(mapped, provider_id));
        response
    } else if session.is_authenticated() {
        debug!(session_id = %session.session_id(), "session roles map to no permissions");
        response.into_fail()
    } else {
        response.session = Some(session);
        response
    }
}

fn mapped_permissions(roles: &RoleSet, assignments: &[IdentityAssignment]) -> RoleSet {
    let mut mapped = RoleSet::none();
    for role in roles {
        for assignment in assignments {
            if assignment.grants_role(role) {
                mapped.extend_from(&assignment.permissions);
            }
        }
    }
    mapped
}
