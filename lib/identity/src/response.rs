//! Responses returned by identity providers and the security manager.

use serde::{Deserialize, Serialize};
use warden_core::RequestId;

use crate::action::{ActionType, IdentityAction};
use crate::request::{AuthenticationRequest, SessionCloseRequest};
use crate::session::{Session, SessionId};

/// Outcome of an authentication request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub request_id: RequestId,
    pub provider_id: Option<String>,
    pub resource_id: String,
    pub action: IdentityAction,
    pub session: Option<Session>,
}

impl AuthenticationResponse {
    #[must_use]
    pub fn new(
        request_id: RequestId,
        provider_id: Option<String>,
        resource_id: impl Into<String>,
        action: IdentityAction,
        session: Option<Session>,
    ) -> Self {
        Self {
            request_id,
            provider_id,
            resource_id: resource_id.into(),
            action,
            session,
        }
    }

    /// Successful authentication carrying `session`.
    #[must_use]
    pub fn success(request: &AuthenticationRequest, provider_id: &str, session: Session) -> Self {
        Self::new(
            request.id,
            Some(provider_id.to_string()),
            &request.resource_id,
            IdentityAction::success(),
            Some(session),
        )
    }

    /// The client must visit `location` to continue.
    #[must_use]
    pub fn redirect(
        request: &AuthenticationRequest,
        provider_id: &str,
        location: impl Into<String>,
    ) -> Self {
        Self::new(
            request.id,
            Some(provider_id.to_string()),
            &request.resource_id,
            IdentityAction::redirect(location),
            None,
        )
    }

    /// The identity was rejected.
    #[must_use]
    pub fn fail(request: &AuthenticationRequest, provider_id: &str) -> Self {
        Self::new(
            request.id,
            Some(provider_id.to_string()),
            &request.resource_id,
            IdentityAction::fail(),
            None,
        )
    }

    /// The provider does not support authentication.
    #[must_use]
    pub fn not_implemented(request: &AuthenticationRequest, provider_id: &str) -> Self {
        Self::new(
            request.id,
            Some(provider_id.to_string()),
            &request.resource_id,
            IdentityAction::not_implemented(),
            None,
        )
    }

    /// The request could not be evaluated.
    #[must_use]
    pub fn error(request: &AuthenticationRequest, message: impl Into<String>) -> Self {
        Self::new(
            request.id,
            None,
            &request.resource_id,
            IdentityAction::error(message),
            None,
        )
    }

    /// Turns this response into a `Fail`, dropping any session but keeping
    /// the request, provider and resource ids.
    #[must_use]
    pub fn into_fail(self) -> Self {
        Self {
            action: IdentityAction::fail(),
            session: None,
            ..self
        }
    }

    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }

    /// Returns true if this response ends an authentication walk: it carries
    /// a session, or its action is `Redirect` or `Fail`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.session.is_some() || self.action.is_terminal()
    }
}

/// Outcome of a session close request.
///
/// The default value is the empty response returned when no provider is
/// known for the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCloseResponse {
    pub session_id: Option<SessionId>,
    pub provider_id: Option<String>,
    pub action: Option<IdentityAction>,
}

impl SessionCloseResponse {
    #[must_use]
    pub fn new(request: &SessionCloseRequest, provider_id: &str, action: IdentityAction) -> Self {
        Self {
            session_id: Some(request.session_id.clone()),
            provider_id: Some(provider_id.to_string()),
            action: Some(action),
        }
    }

    #[must_use]
    pub fn success(request: &SessionCloseRequest, provider_id: &str) -> Self {
        Self::new(request, provider_id, IdentityAction::success())
    }

    #[must_use]
    pub fn not_implemented(request: &SessionCloseRequest, provider_id: &str) -> Self {
        Self::new(request, provider_id, IdentityAction::not_implemented())
    }

    /// Returns true for the empty response.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
    }
}

/// Outcome of a provider callback.
///
/// `authentication_request_id` correlates the callback with the request that
/// started the flow, so the hosting layer can resume it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub authentication_request_id: Option<RequestId>,
    pub provider_id: Option<String>,
    pub action: Option<IdentityAction>,
    pub session: Option<Session>,
}

impl CallbackResponse {
    #[must_use]
    pub fn new(
        authentication_request_id: Option<RequestId>,
        provider_id: &str,
        action: IdentityAction,
        session: Option<Session>,
    ) -> Self {
        Self {
            authentication_request_id,
            provider_id: Some(provider_id.to_string()),
            action: Some(action),
            session,
        }
    }

    #[must_use]
    pub fn not_implemented(provider_id: &str) -> Self {
        Self::new(None, provider_id, IdentityAction::not_implemented(), None)
    }

    /// Returns true for the empty response.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleSet;
    use crate::session::AnonymousSession;

    #[test]
    fn success_carries_request_ids() {
        let request = AuthenticationRequest::new("app:hmi:overview");
        let session = AnonymousSession::new(SessionId::new("s1"), RoleSet::none()).into();
        let response = AuthenticationResponse::success(&request, "kiosk", session);

        assert_eq!(response.request_id, request.id);
        assert_eq!(response.resource_id, "app:hmi:overview");
        assert_eq!(response.provider_id.as_deref(), Some("kiosk"));
        assert_eq!(response.action_type(), ActionType::Success);
        assert!(response.is_terminal());
    }

    #[test]
    fn into_fail_drops_session() {
        let request = AuthenticationRequest::new("app:hmi:overview");
        let session = AnonymousSession::new(SessionId::new("s1"), RoleSet::none()).into();
        let response = AuthenticationResponse::success(&request, "kiosk", session).into_fail();

        assert_eq!(response.action_type(), ActionType::Fail);
        assert!(response.session.is_none());
        assert_eq!(response.provider_id.as_deref(), Some("kiosk"));
        assert_eq!(response.request_id, request.id);
    }

    #[test]
    fn terminal_classification() {
        let request = AuthenticationRequest::new("api:v1");
        assert!(AuthenticationResponse::redirect(&request, "sso", "/login").is_terminal());
        assert!(AuthenticationResponse::fail(&request, "sso").is_terminal());
        assert!(!AuthenticationResponse::not_implemented(&request, "sso").is_terminal());
        assert!(!AuthenticationResponse::error(&request, "boom").is_terminal());
    }

    #[test]
    fn default_close_and_callback_responses_are_empty() {
        assert!(SessionCloseResponse::default().is_empty());
        assert!(CallbackResponse::default().is_empty());

        let close = SessionCloseResponse::success(&SessionCloseRequest::new("s1"), "sso");
        assert!(!close.is_empty());
        assert_eq!(close.session_id, Some(SessionId::new("s1")));
    }
}
