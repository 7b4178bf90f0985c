//! In-memory policy state: resources, profiles and the indexes between
//! them.
//!
//! The registry keeps four views in step:
//! - profile id to profile (each profile owns its assignments in order)
//! - profile id to the ids of its assignments
//! - assignment id to the owning profile id
//! - resource pattern to the ids of profiles with an assignment on it
//!
//! An assignment id is unique across all profiles. Registering an assignment
//! whose id already exists moves it: the old copy is removed from whichever
//! profile held it first.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;
use warden_identity::{IdentityAssignment, IdentityResource, SecurityProfile, resource_matches};

/// Resources, profiles and assignments known to the security manager.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    resources: HashMap<String, IdentityResource>,
    profiles: HashMap<String, SecurityProfile>,
    profile_assignments: HashMap<String, Vec<String>>,
    assignment_profiles: HashMap<String, String>,
    resource_profiles: BTreeMap<String, BTreeSet<String>>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a resource. Resources with an empty id are
    /// ignored.
    pub fn add_resource(&mut self, resource: IdentityResource) -> bool {
        if resource.id.is_empty() {
            return false;
        }
        self.resources.insert(resource.id.clone(), resource);
        true
    }

    pub fn remove_resource(&mut self, resource_id: &str) -> Option<IdentityResource> {
        self.resources.remove(resource_id)
    }

    #[must_use]
    pub fn resource(&self, resource_id: &str) -> Option<&IdentityResource> {
        self.resources.get(resource_id)
    }

    /// Finds the resource governing `resource_id`: an exact registration
    /// wins, otherwise the longest matching pattern.
    #[must_use]
    pub fn resolve_resource(&self, resource_id: &str) -> Option<&IdentityResource> {
        if let Some(resource) = self.resources.get(resource_id) {
            return Some(resource);
        }
        self.resources
            .values()
            .filter(|resource| resource.is_pattern() && resource_matches(&resource.id, resource_id))
            .max_by(|a, b| a.id.len().cmp(&b.id.len()).then_with(|| b.id.cmp(&a.id)))
    }

    pub fn resources(&self) -> impl Iterator<Item = &IdentityResource> {
        self.resources.values()
    }

    #[must_use]
    pub fn profile(&self, profile_id: &str) -> Option<&SecurityProfile> {
        self.profiles.get(profile_id)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SecurityProfile> {
        self.profiles.values()
    }

    /// Inserts or replaces a profile, re-registering its assignments.
    ///
    /// Returns false if the profile id is empty.
    pub fn upsert_profile(&mut self, mut profile: SecurityProfile) -> bool {
        if profile.id.is_empty() {
            return false;
        }

        self.remove_profile(&profile.id);

        let assignments = std::mem::take(&mut profile.assignments);
        let profile_id = profile.id.clone();
        self.profile_assignments.insert(profile_id.clone(), Vec::new());
        self.profiles.insert(profile_id.clone(), profile);

        for assignment in assignments {
            self.add_assignment(&profile_id, assignment);
        }
        true
    }

    /// Adds an assignment to a profile, replacing any assignment with the
    /// same id in any profile.
    ///
    /// Returns false if the profile does not exist or the assignment's id or
    /// resource pattern is empty.
    pub fn add_assignment(&mut self, profile_id: &str, assignment: IdentityAssignment) -> bool {
        if assignment.id.is_empty() || assignment.resource_id.is_empty() {
            return false;
        }
        if !self.profiles.contains_key(profile_id) {
            debug!(
                profile_id,
                assignment_id = %assignment.id,
                "assignment for unknown profile ignored"
            );
            return false;
        }

        if self.assignment_profiles.contains_key(&assignment.id) {
            self.remove_assignment(&assignment.id);
        }

        let Some(profile) = self.profiles.get_mut(profile_id) else {
            return false;
        };

        self.resource_profiles
            .entry(assignment.resource_id.clone())
            .or_default()
            .insert(profile_id.to_string());
        self.assignment_profiles
            .insert(assignment.id.clone(), profile_id.to_string());
        self.profile_assignments
            .entry(profile_id.to_string())
            .or_default()
            .push(assignment.id.clone());
        profile.assignments.push(assignment);
        true
    }

    /// Removes an assignment from whichever profile holds it.
    pub fn remove_assignment(&mut self, assignment_id: &str) -> Option<IdentityAssignment> {
        let profile_id = self.assignment_profiles.remove(assignment_id)?;

        if let Some(ids) = self.profile_assignments.get_mut(&profile_id) {
            ids.retain(|id| id != assignment_id);
        }

        let profile = self.profiles.get_mut(&profile_id)?;
        let position = profile
            .assignments
            .iter()
            .position(|assignment| assignment.id == assignment_id)?;
        let removed = profile.assignments.remove(position);

        let still_covered = profile
            .assignments
            .iter()
            .any(|assignment| assignment.resource_id == removed.resource_id);
        if !still_covered {
            self.unindex_resource(&removed.resource_id, &profile_id);
        }

        Some(removed)
    }

    /// Removes a profile and every index entry that refers to it.
    pub fn remove_profile(&mut self, profile_id: &str) -> Option<SecurityProfile> {
        let profile = self.profiles.remove(profile_id)?;

        for assignment_id in self.profile_assignments.remove(profile_id).unwrap_or_default() {
            self.assignment_profiles.remove(&assignment_id);
        }
        for assignment in &profile.assignments {
            self.unindex_resource(&assignment.resource_id, profile_id);
        }

        Some(profile)
    }

    /// Returns every profile with an assignment whose pattern matches
    /// `resource_id`, each at most once.
    #[must_use]
    pub fn profiles_by_resource(&self, resource_id: &str) -> Vec<SecurityProfile> {
        let profile_ids: BTreeSet<&String> = self
            .resource_profiles
            .iter()
            .filter(|(pattern, _)| resource_matches(pattern, resource_id))
            .flat_map(|(_, ids)| ids)
            .collect();

        profile_ids
            .into_iter()
            .filter_map(|id| self.profiles.get(id))
            .cloned()
            .collect()
    }

    /// Returns the profile's assignments that apply to `resource_id`.
    ///
    /// Returns `None` when the profile has no registered assignments at all.
    #[must_use]
    pub fn matching_assignments(
        &self,
        profile_id: &str,
        resource_id: &str,
    ) -> Option<Vec<IdentityAssignment>> {
        let ids = self.profile_assignments.get(profile_id)?;
        if ids.is_empty() {
            return None;
        }
        let profile = self.profiles.get(profile_id)?;

        Some(
            profile
                .assignments
                .iter()
                .filter(|assignment| assignment.applies_to(resource_id))
                .cloned()
                .collect(),
        )
    }

    /// Returns the id of the profile that owns an assignment.
    #[must_use]
    pub fn assignment_owner(&self, assignment_id: &str) -> Option<&str> {
        self.assignment_profiles.get(assignment_id).map(String::as_str)
    }

    fn unindex_resource(&mut self, pattern: &str, profile_id: &str) {
        if let Some(ids) = self.resource_profiles.get_mut(pattern) {
            ids.remove(profile_id);
            if ids.is_empty() {
                self.resource_profiles.remove(pattern);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (profile_id, profile) in &self.profiles {
            let ids: Vec<&str> = profile.assignments.iter().map(|a| a.id.as_str()).collect();
            let indexed: Vec<&str> = self
                .profile_assignments
                .get(profile_id)
                .map(|ids| ids.iter().map(String::as_str).collect())
                .unwrap_or_default();
            assert_eq!(ids, indexed, "assignment list of {profile_id}");

            for assignment in &profile.assignments {
                assert_eq!(
                    self.assignment_profiles.get(&assignment.id),
                    Some(profile_id),
                    "owner of {}",
                    assignment.id
                );
                assert!(
                    self.resource_profiles
                        .get(&assignment.resource_id)
                        .is_some_and(|ids| ids.contains(profile_id)),
                    "resource index for {}",
                    assignment.resource_id
                );
            }
        }

        for (assignment_id, profile_id) in &self.assignment_profiles {
            let profile = self.profiles.get(profile_id).expect("owner exists");
            assert!(profile.assignment(assignment_id).is_some());
        }

        for (pattern, ids) in &self.resource_profiles {
            assert!(!ids.is_empty(), "empty index entry for {pattern}");
            for profile_id in ids {
                let profile = self.profiles.get(profile_id).expect("indexed profile exists");
                assert!(
                    profile.assignments.iter().any(|a| &a.resource_id == pattern),
                    "{profile_id} indexed under {pattern} without an assignment"
                );
            }
        }

        for profile_id in self.profile_assignments.keys() {
            assert!(self.profiles.contains_key(profile_id));
        }
    }
}
