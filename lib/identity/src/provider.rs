//! The identity provider plugin contract.
//!
//! Providers are built by a [`ProviderFactory`] from a
//! [`ProviderConfiguration`] and a storage [`Volume`]. Each provider opts
//! into the flows it supports; the default implementation of every flow
//! answers `NotImplemented`.

use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use warden_core::RequestId;

use crate::error::ProviderError;
use crate::profile::SecurityProfile;
use crate::request::{AuthenticationRequest, CallbackRequest, Parameters, SessionCloseRequest};
use crate::resource::IdentityResource;
use crate::response::{AuthenticationResponse, CallbackResponse, SessionCloseResponse};
use crate::volume::Volume;

/// Category under which identity configurations and packages are published.
pub const IDENTITY_CATEGORY: &str = "identity";

/// Configuration of one identity provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Volume handed to the provider. Defaults to the configuration id.
    #[serde(default)]
    pub volume_id: Option<String>,
    pub package_id: String,
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ProviderConfiguration {
    #[must_use]
    pub fn new(id: impl Into<String>, package_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            volume_id: None,
            package_id: package_id.into(),
            package_version: None,
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn with_package_version(mut self, version: impl Into<String>) -> Self {
        self.package_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume_id: impl Into<String>) -> Self {
        self.volume_id = Some(volume_id.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns the volume this provider should be given.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        self.volume_id.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&JsonValue> {
        self.parameters.get(key)
    }

    #[must_use]
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameter(key).and_then(JsonValue::as_str)
    }

    /// Hex-encoded SHA-256 over every field of the configuration.
    ///
    /// A change in this hash is what triggers a provider rebuild on reload.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.id.as_str(),
            self.description.as_deref().unwrap_or_default(),
            self.volume_id.as_deref().unwrap_or_default(),
            self.package_id.as_str(),
            self.package_version.as_deref().unwrap_or_default(),
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(JsonValue::Object(self.parameters.clone()).to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Read access to the security manager's state, handed to providers during
/// every call.
pub trait SecurityContext: Send + Sync {
    /// Returns a cached authentication request, e.g. to finish a callback.
    fn authentication_request(&self, request_id: RequestId) -> Option<AuthenticationRequest>;

    /// Returns a registered resource.
    fn resource(&self, resource_id: &str) -> Option<IdentityResource>;

    /// Returns the profiles that apply to a resource.
    fn profiles_for_resource(&self, resource_id: &str) -> Vec<SecurityProfile>;
}

/// A pluggable authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identifier under which the provider is registered.
    fn id(&self) -> &str;

    /// Authenticates a request.
    async fn authenticate(
        &self,
        _context: &dyn SecurityContext,
        request: &AuthenticationRequest,
    ) -> AuthenticationResponse {
        AuthenticationResponse::not_implemented(request, self.id())
    }

    /// Closes a session this provider issued.
    async fn revoke(
        &self,
        _context: &dyn SecurityContext,
        request: &SessionCloseRequest,
    ) -> SessionCloseResponse {
        SessionCloseResponse::not_implemented(request, self.id())
    }

    /// Completes a flow the provider started with a redirect.
    async fn handle_callback(
        &self,
        _context: &dyn SecurityContext,
        _request: &CallbackRequest,
    ) -> CallbackResponse {
        CallbackResponse::not_implemented(self.id())
    }
}

/// Builds provider instances for one plugin package.
pub trait ProviderFactory: Send + Sync {
    /// Constructs a provider from its configuration and storage volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    fn create(
        &self,
        configuration: &ProviderConfiguration,
        volume: Arc<dyn Volume>,
    ) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(
            &ProviderConfiguration,
            Arc<dyn Volume>,
        ) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>>
        + Send
        + Sync,
{
    fn create(
        &self,
        configuration: &ProviderConfiguration,
        volume: Arc<dyn Volume>,
    ) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>> {
        self(configuration, volume)
    }
}
