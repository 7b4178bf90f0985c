//! Sessions issued by identity providers.
//!
//! A session is either anonymous or bound to an authenticated user. The
//! manager rewrites a session's roles into permissions after a provider
//! returns it, and records which provider issued it so the session can be
//! revoked later without resolving the resource again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::request::Parameters;
use crate::role::RoleSet;
use crate::user::IdentityUser;

/// Opaque session identifier.
///
/// Providers choose their own identifiers; anonymous sessions synthesized by
/// the manager use a ULID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh, unique session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Session that is not tied to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousSession {
    pub session_id: SessionId,
    pub provider_id: Option<String>,
    pub roles: RoleSet,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AnonymousSession {
    #[must_use]
    pub fn new(session_id: SessionId, roles: RoleSet) -> Self {
        Self {
            session_id,
            provider_id: None,
            roles,
            parameters: Parameters::new(),
        }
    }
}

/// Session bound to an authenticated user for a validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    pub session_id: SessionId,
    pub provider_id: Option<String>,
    pub user: IdentityUser,
    pub roles: RoleSet,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AuthenticatedSession {
    /// Creates a session valid from now for `duration`.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        user: IdentityUser,
        roles: RoleSet,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            provider_id: None,
            user,
            roles,
            valid_from: now,
            valid_to: now + duration,
            parameters: Parameters::new(),
        }
    }

    /// Returns true if `at` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at < self.valid_to
    }
}

/// An anonymous or authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Session {
    Anonymous(AnonymousSession),
    Authenticated(AuthenticatedSession),
}

impl Session {
    /// Creates an anonymous session with a generated id that matches any role.
    #[must_use]
    pub fn unrestricted(parameters: Parameters) -> Self {
        let mut session = AnonymousSession::new(SessionId::generate(), RoleSet::wildcard());
        session.parameters = parameters;
        Self::Anonymous(session)
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Anonymous(s) => &s.session_id,
            Self::Authenticated(s) => &s.session_id,
        }
    }

    #[must_use]
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous(s) => s.provider_id.as_deref(),
            Self::Authenticated(s) => s.provider_id.as_deref(),
        }
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        match self {
            Self::Anonymous(s) => &s.roles,
            Self::Authenticated(s) => &s.roles,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        match self {
            Self::Anonymous(s) => &s.parameters,
            Self::Authenticated(s) => &s.parameters,
        }
    }

    /// Returns the user of an authenticated session.
    #[must_use]
    pub fn user(&self) -> Option<&IdentityUser> {
        match self {
            Self::Anonymous(_) => None,
            Self::Authenticated(s) => Some(&s.user),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Replaces the roles and stamps the issuing provider, keeping every
    /// other field.
    #[must_use]
    pub fn remapped(self, roles: RoleSet, provider_id: &str) -> Self {
        match self {
            Self::Anonymous(s) => Self::Anonymous(AnonymousSession {
                roles,
                provider_id: Some(provider_id.to_string()),
                ..s
            }),
            Self::Authenticated(s) => Self::Authenticated(AuthenticatedSession {
                roles,
                provider_id: Some(provider_id.to_string()),
                ..s
            }),
        }
    }
}

impl From<AnonymousSession> for Session {
    fn from(session: AnonymousSession) -> Self {
        Self::Anonymous(session)
    }
}

impl From<AuthenticatedSession> for Session {
    fn from(session: AuthenticatedSession) -> Self {
        Self::Authenticated(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AuthenticatedSession {
        AuthenticatedSession::new(
            SessionId::new("sess_alice"),
            IdentityUser::new("alice"),
            ["admin:site-a"].into_iter().collect(),
            Duration::hours(1),
        )
    }

    #[test]
    fn session_id_conversions() {
        let id: SessionId = "sess_1".into();
        assert_eq!(id.as_str(), "sess_1");
        assert_eq!(id.to_string(), "sess_1");
        assert!(SessionId::default().is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
        assert!(!SessionId::generate().is_empty());
    }

    #[test]
    fn unrestricted_session_is_anonymous_wildcard() {
        let mut parameters = Parameters::new();
        parameters.insert("origin".to_string(), serde_json::json!("kiosk"));

        let session = Session::unrestricted(parameters.clone());
        assert!(!session.is_authenticated());
        assert!(session.roles().is_wildcard());
        assert!(!session.session_id().is_empty());
        assert_eq!(session.parameters(), &parameters);
        assert!(session.provider_id().is_none());
    }

    #[test]
    fn remapped_preserves_authenticated_fields() {
        let original = alice();
        let permissions: RoleSet = ["read", "write"].into_iter().collect();

        let session = Session::from(original.clone()).remapped(permissions.clone(), "corp-sso");

        match session {
            Session::Authenticated(s) => {
                assert_eq!(s.roles, permissions);
                assert_eq!(s.provider_id.as_deref(), Some("corp-sso"));
                assert_eq!(s.user, original.user);
                assert_eq!(s.valid_from, original.valid_from);
                assert_eq!(s.valid_to, original.valid_to);
                assert_eq!(s.session_id, original.session_id);
            }
            Session::Anonymous(_) => panic!("expected authenticated session"),
        }
    }

    #[test]
    fn validity_window() {
        let session = alice();
        assert!(session.is_valid_at(Utc::now()));
        assert!(!session.is_valid_at(session.valid_to));
        assert!(!session.is_valid_at(session.valid_from - Duration::seconds(1)));
    }

    #[test]
    fn serialization_is_tagged() {
        let session = Session::from(alice());
        let json = serde_json::to_value(&session).expect("serialize");
        assert_eq!(json["type"], "authenticated");
        assert_eq!(json["user"]["id"], "alice");

        let parsed: Session = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, session);
    }
}
