//! Role sets and role pattern matching.
//!
//! Providers report free-form role strings for a session. Assignments match
//! those roles with simple patterns, and a successful match replaces the
//! session's roles with the permissions the assignment grants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role that matches any other role or permission.
pub const WILDCARD: &str = "*";

/// Returns true if `role` satisfies the assignment role `pattern`.
///
/// `*` matches every role. Any other pattern matches when the role starts
/// with the pattern after its trailing `*` characters are stripped, so
/// `admin*` matches `admin:site-a` and a bare `viewer` also matches
/// `viewer-lite`.
#[must_use]
pub fn role_matches(pattern: &str, role: &str) -> bool {
    pattern == WILDCARD || role.starts_with(pattern.trim_end_matches('*'))
}

/// Ordered, de-duplicated set of role or permission names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet {
    roles: BTreeSet<String>,
}

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a role set holding only the wildcard role.
    #[must_use]
    pub fn wildcard() -> Self {
        Self::from_iter([WILDCARD])
    }

    /// Returns true if the set contains `role` verbatim.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns true if the set holds the wildcard role.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.contains(WILDCARD)
    }

    /// Adds a role, returning true if it was not already present.
    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        self.roles.insert(role.into())
    }

    /// Adds every role from `other`.
    pub fn extend_from(&mut self, other: &RoleSet) {
        self.roles.extend(other.roles.iter().cloned());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Iterates the roles in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// Returns true if any role in this set satisfies `pattern`.
    #[must_use]
    pub fn any_matches(&self, pattern: &str) -> bool {
        self.iter().any(|role| role_matches(pattern, role))
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.roles.iter()
    }
}
