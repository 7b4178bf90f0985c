//! Protected resources and resource pattern matching.
//!
//! Resource ids are colon-separated paths such as `app:dashboard:home` or
//! `api:entities:query`. Anything that refers to resources (a registered
//! resource, an assignment) may use a trailing `*` to cover every id with
//! that prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::role::{RoleSet, WILDCARD};

/// Returns true if `resource_id` is covered by `pattern`.
///
/// `*` covers everything, `prefix*` covers ids starting with `prefix`, and
/// any other pattern must equal the id. Empty patterns and ids never match.
#[must_use]
pub fn resource_matches(pattern: &str, resource_id: &str) -> bool {
    if pattern.is_empty() || resource_id.is_empty() {
        return false;
    }

    if pattern == WILDCARD {
        true
    } else if pattern.ends_with('*') {
        resource_id.starts_with(pattern.trim_end_matches('*'))
    } else {
        resource_id == pattern
    }
}

/// Kind of protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A page of a hosted application.
    App,
    /// An API endpoint.
    Api,
    /// A built-in system endpoint.
    System,
}

impl ResourceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Api => "api",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A protected resource and the permissions it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResource {
    pub id: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub permissions: RoleSet,
}

impl IdentityResource {
    #[must_use]
    pub fn new<I, S>(resource_type: ResourceType, id: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            resource_type,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Returns true if this resource's id is a prefix pattern.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.id.ends_with('*')
    }

    /// Returns true if a session holding `roles` may access this resource.
    ///
    /// A resource without declared permissions is open to any session. A
    /// wildcard role grants everything; otherwise at least one declared
    /// permission must be held.
    #[must_use]
    pub fn permits(&self, roles: &RoleSet) -> bool {
        if self.permissions.is_empty() || roles.is_wildcard() {
            return true;
        }
        self.permissions.iter().any(|permission| roles.contains(permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_pattern_matches_any_resource() {
        assert!(resource_matches("*", "app:hmi:overview"));
    }

    #[test]
    fn prefix_pattern() {
        assert!(resource_matches("app:*", "app:123:x"));
        assert!(!resource_matches("api:*", "app:123:x"));
    }

    #[test]
    fn exact_pattern() {
        assert!(resource_matches("app:123:x", "app:123:x"));
        assert!(!resource_matches("app:123", "app:123:x"));
    }

    #[test]
    fn empty_never_matches() {
        assert!(!resource_matches("", "app:1"));
        assert!(!resource_matches("*", ""));
    }

    #[test]
    fn resource_without_permissions_permits_everyone() {
        let resource = IdentityResource::new(ResourceType::App, "app:public", Vec::<String>::new());
        assert!(resource.permits(&RoleSet::none()));
    }

    #[test]
    fn resource_requires_one_declared_permission() {
        let resource = IdentityResource::new(ResourceType::Api, "api:entities:publish", ["write"]);
        assert!(resource.permits(&["read", "write"].into_iter().collect()));
        assert!(!resource.permits(&["read"].into_iter().collect()));
        assert!(!resource.permits(&RoleSet::none()));
        assert!(resource.permits(&RoleSet::wildcard()));
    }

    #[test]
    fn pattern_resources() {
        let resource = IdentityResource::new(ResourceType::App, "app:*", ["read"]);
        assert!(resource.is_pattern());
    }
}
