//! Identity providers built into the host.

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use warden_identity::{
    AuthenticatedSession, AuthenticationRequest, AuthenticationResponse, CallbackRequest,
    CallbackResponse, IdentityAction, IdentityProvider, IdentityUser, ProviderConfiguration,
    ProviderError, RequestId, RoleSet, SecurityContext, SessionCloseRequest, SessionCloseResponse,
    SessionId, Volume,
};
use warden_security::ProviderModule;

/// Package id of the built-in static provider.
pub const STATIC_PACKAGE: &str = "warden.static";

const DEFAULT_SESSION_MINUTES: i64 = 60;

/// Authenticates users from a fixed table in its configuration.
///
/// Configuration parameters:
/// - `users`: object mapping user names to arrays of roles (required)
/// - `login_location`: where to send requests that name no user
/// - `session_minutes`: session lifetime, 60 by default
///
/// The `user` request parameter selects the user. Callbacks accept the same
/// parameter plus `state`, the id of the authentication request that
/// redirected to the login location.
pub struct StaticIdentityProvider {
    id: String,
    users: BTreeMap<String, RoleSet>,
    login_location: Option<String>,
    session_length: Duration,
    sessions: Mutex<HashSet<SessionId>>,
}

impl StaticIdentityProvider {
    /// Builds the provider from its configuration.
    pub fn from_configuration(
        configuration: &ProviderConfiguration,
    ) -> Result<Self, Report<ProviderError>> {
        let invalid = |parameter: &str, reason: &str| ProviderError::InvalidParameter {
            provider: configuration.id.clone(),
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        };

        let users = configuration
            .parameter("users")
            .ok_or_else(|| ProviderError::MissingParameter {
                provider: configuration.id.clone(),
                parameter: "users".to_string(),
            })?
            .as_object()
            .ok_or_else(|| invalid("users", "expected an object of user names to roles"))?;

        let mut table = BTreeMap::new();
        for (name, roles) in users {
            let roles = roles
                .as_array()
                .ok_or_else(|| invalid("users", "roles must be an array"))?
                .iter()
                .map(|role| role.as_str().map(str::to_string))
                .collect::<Option<RoleSet>>()
                .ok_or_else(|| invalid("users", "roles must be strings"))?;
            table.insert(name.clone(), roles);
        }

        let session_minutes = match configuration.parameter("session_minutes") {
            None => DEFAULT_SESSION_MINUTES,
            Some(value) => value
                .as_i64()
                .filter(|minutes| *minutes > 0)
                .ok_or_else(|| invalid("session_minutes", "expected a positive integer"))?,
        };

        Ok(Self {
            id: configuration.id.clone(),
            users: table,
            login_location: configuration
                .parameter_str("login_location")
                .map(str::to_string),
            session_length: Duration::minutes(session_minutes),
            sessions: Mutex::new(HashSet::new()),
        })
    }

    fn issue(&self, name: &str) -> Option<AuthenticatedSession> {
        let roles = self.users.get(name)?.clone();
        let session = AuthenticatedSession::new(
            SessionId::generate(),
            IdentityUser::new(name),
            roles,
            self.session_length,
        );
        self.sessions.lock().insert(session.session_id.clone());
        Some(session)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(skip_all, fields(provider_id = %self.id, resource_id = %request.resource_id))]
    async fn authenticate(
        &self,
        _context: &dyn SecurityContext,
        request: &AuthenticationRequest,
    ) -> AuthenticationResponse {
        let Some(name) = request.param_str("user") else {
            return match &self.login_location {
                Some(location) => {
                    let location = format!("{location}?state={}", request.id);
                    AuthenticationResponse::redirect(request, &self.id, location)
                }
                None => AuthenticationResponse::fail(request, &self.id),
            };
        };

        match self.issue(name) {
            Some(session) => {
                debug!(user = name, "static user authenticated");
                AuthenticationResponse::success(request, &self.id, session.into())
            }
            None => {
                debug!(user = name, "unknown static user");
                let mut response = AuthenticationResponse::fail(request, &self.id);
                response.action =
                    IdentityAction::fail().with_message(format!("unknown user {name}"));
                response
            }
        }
    }

    async fn revoke(
        &self,
        _context: &dyn SecurityContext,
        request: &SessionCloseRequest,
    ) -> SessionCloseResponse {
        if self.sessions.lock().remove(&request.session_id) {
            SessionCloseResponse::success(request, &self.id)
        } else {
            SessionCloseResponse::new(
                request,
                &self.id,
                IdentityAction::fail().with_message("session not issued by this provider"),
            )
        }
    }

    async fn handle_callback(
        &self,
        context: &dyn SecurityContext,
        request: &CallbackRequest,
    ) -> CallbackResponse {
        let request_id = request
            .param_str("state")
            .and_then(|state| state.parse::<RequestId>().ok())
            .filter(|id| context.authentication_request(*id).is_some());

        let session = request.param_str("user").and_then(|name| self.issue(name));
        match session {
            Some(session) => CallbackResponse::new(
                request_id,
                &self.id,
                IdentityAction::success(),
                Some(session.into()),
            ),
            None => CallbackResponse::new(request_id, &self.id, IdentityAction::fail(), None),
        }
    }
}

fn create_static(
    configuration: &ProviderConfiguration,
    _volume: Arc<dyn Volume>,
) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>> {
    Ok(Arc::new(StaticIdentityProvider::from_configuration(configuration)?))
}

/// Module for the static provider, ready to register with a module loader.
#[must_use]
pub fn static_module() -> ProviderModule {
    ProviderModule::new(
        STATIC_PACKAGE,
        Some(env!("CARGO_PKG_VERSION").to_string()),
        create_static,
    )
}

/// Returns a configuration for the static provider.
#[must_use]
pub fn static_configuration(id: &str, users: JsonValue) -> ProviderConfiguration {
    ProviderConfiguration::new(id, STATIC_PACKAGE).with_param("users", users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_identity::{ActionType, IdentityResource, SecurityProfile};

    struct Requests(Vec<AuthenticationRequest>);

    impl SecurityContext for Requests {
        fn authentication_request(&self, request_id: RequestId) -> Option<AuthenticationRequest> {
            self.0.iter().find(|r| r.id == request_id).cloned()
        }

        fn resource(&self, _resource_id: &str) -> Option<IdentityResource> {
            None
        }

        fn profiles_for_resource(&self, _resource_id: &str) -> Vec<SecurityProfile> {
            Vec::new()
        }
    }

    fn provider(extra: &[(&str, JsonValue)]) -> StaticIdentityProvider {
        let mut configuration =
            static_configuration("local", json!({"alice": ["admin"], "bob": []}));
        for (key, value) in extra {
            configuration = configuration.with_param(*key, value.clone());
        }
        StaticIdentityProvider::from_configuration(&configuration).expect("provider")
    }

    #[tokio::test]
    async fn known_user_gets_session() {
        let provider = provider(&[]);
        let request = AuthenticationRequest::new("app:1").with_param("user", json!("alice"));

        let response = provider.authenticate(&Requests(vec![]), &request).await;

        assert_eq!(response.action_type(), ActionType::Success);
        let session = response.session.expect("session");
        assert!(session.roles().contains("admin"));
        assert_eq!(session.user().map(IdentityUser::id), Some("alice"));
    }

    #[tokio::test]
    async fn unknown_user_fails() {
        let provider = provider(&[]);
        let request = AuthenticationRequest::new("app:1").with_param("user", json!("mallory"));

        let response = provider.authenticate(&Requests(vec![]), &request).await;
        assert_eq!(response.action_type(), ActionType::Fail);
    }

    #[tokio::test]
    async fn missing_user_redirects_to_login() {
        let provider = provider(&[("login_location", json!("https://login.local"))]);
        let request = AuthenticationRequest::new("app:1");

        let response = provider.authenticate(&Requests(vec![]), &request).await;

        assert_eq!(response.action_type(), ActionType::Redirect);
        assert_eq!(
            response.action.location(),
            Some(format!("https://login.local?state={}", request.id).as_str())
        );

        let without_login = self::provider(&[]);
        let response = without_login.authenticate(&Requests(vec![]), &request).await;
        assert_eq!(response.action_type(), ActionType::Fail);
    }

    #[tokio::test]
    async fn revoke_only_closes_issued_sessions() {
        let provider = provider(&[]);
        let request = AuthenticationRequest::new("app:1").with_param("user", json!("bob"));
        let session = provider
            .authenticate(&Requests(vec![]), &request)
            .await
            .session
            .expect("session");
        let close = SessionCloseRequest::new(session.session_id().clone());

        let first = provider.revoke(&Requests(vec![]), &close).await;
        assert_eq!(first.action.map(|a| a.action_type()), Some(ActionType::Success));

        let second = provider.revoke(&Requests(vec![]), &close).await;
        assert_eq!(second.action.map(|a| a.action_type()), Some(ActionType::Fail));
    }

    #[tokio::test]
    async fn callback_resumes_pending_request() {
        let provider = provider(&[("login_location", json!("https://login.local"))]);
        let pending = AuthenticationRequest::new("app:1");
        let context = Requests(vec![pending.clone()]);

        let callback = CallbackRequest::new()
            .with_param("state", json!(pending.id.to_string()))
            .with_param("user", json!("alice"));
        let response = provider.handle_callback(&context, &callback).await;

        assert_eq!(response.authentication_request_id, Some(pending.id));
        assert!(response.session.is_some());

        let stale = CallbackRequest::new().with_param("state", json!(RequestId::new().to_string()));
        let response = provider.handle_callback(&context, &stale).await;
        assert_eq!(response.authentication_request_id, None);
        assert_eq!(response.action.map(|a| a.action_type()), Some(ActionType::Fail));
    }

    #[test]
    fn configuration_is_validated() {
        let missing = ProviderConfiguration::new("local", STATIC_PACKAGE);
        assert!(StaticIdentityProvider::from_configuration(&missing).is_err());

        let bad_roles = static_configuration("local", json!({"alice": "admin"}));
        assert!(StaticIdentityProvider::from_configuration(&bad_roles).is_err());

        let bad_minutes =
            static_configuration("local", json!({})).with_param("session_minutes", json!(0));
        assert!(StaticIdentityProvider::from_configuration(&bad_minutes).is_err());
    }
}
