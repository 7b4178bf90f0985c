//! Security profiles and their assignments.
//!
//! A profile binds a set of resources to one identity provider. Each
//! assignment in the profile names a resource pattern, the roles that
//! qualify, and the permissions those roles are granted on matching
//! resources.

use serde::{Deserialize, Serialize};

use crate::resource::resource_matches;
use crate::role::{RoleSet, role_matches};

/// Rule granting `permissions` to holders of `roles` on resources matching
/// `resource_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssignment {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resource pattern (`*`, `prefix*` or an exact id).
    pub resource_id: String,
    /// Role patterns (`*`, `prefix*` or a bare prefix).
    #[serde(default)]
    pub roles: RoleSet,
    #[serde(default)]
    pub permissions: RoleSet,
}

impl IdentityAssignment {
    #[must_use]
    pub fn new(id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            resource_id: resource_id.into(),
            roles: RoleSet::none(),
            permissions: RoleSet::none(),
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if this assignment applies to `resource_id`.
    #[must_use]
    pub fn applies_to(&self, resource_id: &str) -> bool {
        resource_matches(&self.resource_id, resource_id)
    }

    /// Returns true if `role` satisfies any of this assignment's role patterns.
    #[must_use]
    pub fn grants_role(&self, role: &str) -> bool {
        self.roles.iter().any(|pattern| role_matches(pattern, role))
    }
}

/// Named policy bundle: a provider binding, a priority and assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Higher priorities are consulted first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub assignments: Vec<IdentityAssignment>,
}

impl SecurityProfile {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            priority: 0,
            provider_id: None,
            assignments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_assignment(mut self, assignment: IdentityAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Returns the bound provider id, treating an empty id as unbound.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.provider_id.as_deref().filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn assignment(&self, assignment_id: &str) -> Option<&IdentityAssignment> {
        self.assignments.iter().find(|a| a.id == assignment_id)
    }
}
