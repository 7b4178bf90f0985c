//! Typed outcomes of identity operations.
//!
//! Every authenticate, revoke and callback result carries exactly one
//! [`IdentityAction`]. Its message is the only diagnostic threaded back to
//! the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of an [`IdentityAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Success,
    Redirect,
    Fail,
    Error,
    NotImplemented,
}

impl ActionType {
    /// Returns the wire name of this action type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Redirect => "redirect",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::NotImplemented => "not_implemented",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of an identity operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityAction {
    /// The operation completed.
    Success { message: Option<String> },
    /// The caller must send the client to `location` to continue the flow.
    Redirect {
        location: String,
        message: Option<String>,
    },
    /// The identity was rejected.
    Fail { message: Option<String> },
    /// The operation could not be evaluated.
    Error { message: Option<String> },
    /// The provider does not support this flow.
    NotImplemented { message: Option<String> },
}

impl IdentityAction {
    #[must_use]
    pub fn success() -> Self {
        Self::Success { message: None }
    }

    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            message: None,
        }
    }

    #[must_use]
    pub fn fail() -> Self {
        Self::Fail { message: None }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn not_implemented() -> Self {
        Self::NotImplemented { message: None }
    }

    /// Replaces the action's message.
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let slot = match &mut self {
            Self::Success { message }
            | Self::Redirect { message, .. }
            | Self::Fail { message }
            | Self::Error { message }
            | Self::NotImplemented { message } => message,
        };
        *slot = Some(text.into());
        self
    }

    /// Returns the discriminant of this action.
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Success { .. } => ActionType::Success,
            Self::Redirect { .. } => ActionType::Redirect,
            Self::Fail { .. } => ActionType::Fail,
            Self::Error { .. } => ActionType::Error,
            Self::NotImplemented { .. } => ActionType::NotImplemented,
        }
    }

    /// Returns the diagnostic message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { message }
            | Self::Redirect { message, .. }
            | Self::Fail { message }
            | Self::Error { message }
            | Self::NotImplemented { message } => message.as_deref(),
        }
    }

    /// Returns the redirect target for `Redirect` actions.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Returns true for `Redirect` and `Fail`, the outcomes that end an
    /// authentication walk even without a session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redirect { .. } | Self::Fail { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_matches_variant() {
        assert_eq!(IdentityAction::success().action_type(), ActionType::Success);
        assert_eq!(
            IdentityAction::redirect("/login").action_type(),
            ActionType::Redirect
        );
        assert_eq!(IdentityAction::fail().action_type(), ActionType::Fail);
        assert_eq!(IdentityAction::error("x").action_type(), ActionType::Error);
        assert_eq!(
            IdentityAction::not_implemented().action_type(),
            ActionType::NotImplemented
        );
    }

    #[test]
    fn with_message_sets_message_on_every_variant() {
        let redirect = IdentityAction::redirect("/login").with_message("sign in first");
        assert_eq!(redirect.message(), Some("sign in first"));
        assert_eq!(redirect.location(), Some("/login"));

        let fail = IdentityAction::fail().with_message("denied");
        assert_eq!(fail.message(), Some("denied"));
    }

    #[test]
    fn only_redirect_and_fail_are_terminal() {
        assert!(IdentityAction::redirect("/login").is_terminal());
        assert!(IdentityAction::fail().is_terminal());
        assert!(!IdentityAction::success().is_terminal());
        assert!(!IdentityAction::error("x").is_terminal());
        assert!(!IdentityAction::not_implemented().is_terminal());
    }

    #[test]
    fn serialization_is_tagged() {
        let json = serde_json::to_value(IdentityAction::redirect("/login")).expect("serialize");
        assert_eq!(json["type"], "redirect");
        assert_eq!(json["location"], "/login");
    }
}
