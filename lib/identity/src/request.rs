//! Inbound requests handed to the security manager and its providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use warden_core::RequestId;

use crate::session::SessionId;

/// Free-form parameters forwarded from the hosting layer (query values,
/// cookies, stored client state) to identity providers.
pub type Parameters = serde_json::Map<String, JsonValue>;

/// One end of the connection a request arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConnection {
    /// Transport protocol, e.g. `https`.
    pub protocol: String,
    /// Host name or address.
    pub address: String,
}

impl RequestConnection {
    #[must_use]
    pub fn new(protocol: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
        }
    }
}

/// Request to authenticate access to a resource.
///
/// The manager caches each request by id so that a provider completing a
/// redirect-based flow can find the original request again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    pub id: RequestId,
    pub resource_id: String,
    pub host: Option<RequestConnection>,
    pub client: Option<RequestConnection>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AuthenticationRequest {
    /// Creates a request for `resource_id` with a fresh id.
    #[must_use]
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            resource_id: resource_id.into(),
            host: None,
            client: None,
            created: Utc::now(),
            parameters: Parameters::new(),
        }
    }

    /// Sets the host and client connections.
    #[must_use]
    pub fn with_connections(mut self, host: RequestConnection, client: RequestConnection) -> Self {
        self.host = Some(host);
        self.client = Some(client);
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns a string parameter, if present.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(JsonValue::as_str)
    }
}

/// Request to close (revoke) a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCloseRequest {
    pub session_id: SessionId,
    pub host: Option<RequestConnection>,
    pub client: Option<RequestConnection>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl SessionCloseRequest {
    #[must_use]
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            host: None,
            client: None,
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Request delivered back from an external identity system to the provider
/// that started a redirect-based flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub host: Option<RequestConnection>,
    pub client: Option<RequestConnection>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl CallbackRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_gets_unique_id() {
        let a = AuthenticationRequest::new("app:dashboard:home");
        let b = AuthenticationRequest::new("app:dashboard:home");
        assert_ne!(a.id, b.id);
        assert_eq!(a.resource_id, "app:dashboard:home");
    }

    #[test]
    fn param_builder() {
        let request = AuthenticationRequest::new("api:v1")
            .with_param("user", serde_json::json!("alice"))
            .with_param("attempt", serde_json::json!(2));

        assert_eq!(request.param_str("user"), Some("alice"));
        assert_eq!(request.param_str("attempt"), None);
        assert_eq!(request.parameters.len(), 2);
    }

    #[test]
    fn connections() {
        let request = AuthenticationRequest::new("api:v1").with_connections(
            RequestConnection::new("https", "warden.local"),
            RequestConnection::new("https", "10.0.0.7"),
        );
        assert_eq!(request.host.as_ref().map(|c| c.address.as_str()), Some("warden.local"));
        assert_eq!(request.client.as_ref().map(|c| c.address.as_str()), Some("10.0.0.7"));
    }

    #[test]
    fn callback_params() {
        let request = CallbackRequest::new().with_param("code", serde_json::json!("abc"));
        assert_eq!(request.param_str("code"), Some("abc"));
    }
}
