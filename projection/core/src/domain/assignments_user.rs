// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AssignmentsUser aggregate
//!
//! Per-profile assignment graph: every container the profile is linked to,
//! directly or transitively, the time-conditioned edges between them, and the
//! derived set of currently active memberships.
//!
//! ## Invariants
//!
//! - Containers are unique by id. Inserting an existing id is a no-op.
//! - Assignments are unique by `(child id, parent id)`. Re-assigning the same
//!   pair unions the condition sets.
//! - Every stored condition set is non-empty (see [`normalize_conditions`]).
//! - `active_memberships` is only ever replaced wholesale by
//!   [`AssignmentsUser::recalculate`], never patched.
//!
//! The aggregate serializes through [`AssignmentsUserDocument`], a flat list
//! representation; loading a document re-applies the invariants above.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::condition::{any_active, normalize_conditions, ConditionSet, RangeCondition};
use crate::domain::container::{Container, ContainerType, FunctionContainer};
use crate::domain::membership::{self, PruneOutcome};
use crate::domain::object_ident::{ObjectIdent, ObjectType};

/// Time-conditioned edge from a child node to a parent container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub profile: ObjectIdent,
    pub parent: ObjectIdent,
    pub conditions: ConditionSet,
}

impl Assignment {
    pub fn new<I>(profile: ObjectIdent, parent: ObjectIdent, conditions: I) -> Self
    where
        I: IntoIterator<Item = RangeCondition>,
    {
        Self {
            profile,
            parent,
            conditions: normalize_conditions(conditions),
        }
    }

    pub fn key(&self) -> AssignmentKey {
        AssignmentKey::new(&self.profile.id, &self.parent.id)
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        any_active(&self.conditions, at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignmentKey {
    pub child_id: String,
    pub parent_id: String,
}

impl AssignmentKey {
    pub fn new(child_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            child_id: child_id.into(),
            parent_id: parent_id.into(),
        }
    }
}

/// Result of writing an edge into the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentChange {
    Created,
    Extended,
    Unchanged,
}

/// Result of removing conditions from an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionRemoval {
    NotFound,
    Unchanged,
    ConditionsRemoved,
    AssignmentRemoved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AssignmentsUserDocument", into = "AssignmentsUserDocument")]
pub struct AssignmentsUser {
    profile_id: String,
    containers: BTreeMap<String, Container>,
    assignments: BTreeMap<AssignmentKey, Assignment>,
    active_memberships: BTreeSet<ObjectIdent>,
}

impl AssignmentsUser {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            containers: BTreeMap::new(),
            assignments: BTreeMap::new(),
            active_memberships: BTreeSet::new(),
        }
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn profile_ident(&self) -> ObjectIdent {
        ObjectIdent::new(self.profile_id.clone(), ObjectType::User)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn has_container(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    pub fn assignment(&self, child_id: &str, parent_id: &str) -> Option<&Assignment> {
        self.assignments.get(&AssignmentKey::new(child_id, parent_id))
    }

    pub fn active_memberships(&self) -> &BTreeSet<ObjectIdent> {
        &self.active_memberships
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.assignments.is_empty()
    }

    /// Insert a container unless one with the same id already exists
    pub fn add_container(&mut self, container: Container) -> bool {
        if self.containers.contains_key(container.id()) {
            return false;
        }
        self.containers.insert(container.id().to_string(), container);
        true
    }

    /// Write an edge, unioning conditions into an existing one
    pub fn upsert_assignment<I>(
        &mut self,
        profile: ObjectIdent,
        parent: ObjectIdent,
        conditions: I,
    ) -> AssignmentChange
    where
        I: IntoIterator<Item = RangeCondition>,
    {
        let incoming = Assignment::new(profile, parent, conditions);
        match self.assignments.get_mut(&incoming.key()) {
            Some(existing) => {
                let before = existing.conditions.len();
                existing.conditions.extend(incoming.conditions);
                if existing.conditions.len() == before {
                    AssignmentChange::Unchanged
                } else {
                    AssignmentChange::Extended
                }
            }
            None => {
                self.assignments.insert(incoming.key(), incoming);
                AssignmentChange::Created
            }
        }
    }

    /// Remove the given conditions from an edge; drop the edge once empty.
    /// An empty `conditions` slice removes the whole edge.
    pub fn remove_conditions(
        &mut self,
        child_id: &str,
        parent_id: &str,
        conditions: &[RangeCondition],
    ) -> ConditionRemoval {
        let key = AssignmentKey::new(child_id, parent_id);
        let Some(existing) = self.assignments.get_mut(&key) else {
            return ConditionRemoval::NotFound;
        };

        if conditions.is_empty() {
            self.assignments.remove(&key);
            return ConditionRemoval::AssignmentRemoved;
        }

        let before = existing.conditions.len();
        for condition in conditions {
            existing.conditions.remove(condition);
        }

        if existing.conditions.is_empty() {
            self.assignments.remove(&key);
            ConditionRemoval::AssignmentRemoved
        } else if existing.conditions.len() == before {
            ConditionRemoval::Unchanged
        } else {
            ConditionRemoval::ConditionsRemoved
        }
    }

    /// Remove every edge pointing at `parent_id`, returning how many were dropped
    pub fn remove_assignments_to(&mut self, parent_id: &str) -> usize {
        let before = self.assignments.len();
        self.assignments.retain(|key, _| key.parent_id != parent_id);
        before - self.assignments.len()
    }

    /// Rename a group/role/organization entry. Functions linking a renamed
    /// role or organization re-derive their display name.
    pub fn rename_container(&mut self, id: &str, name: &str) -> bool {
        let Some(container) = self.containers.get_mut(id) else {
            return false;
        };
        if !container.set_name(name) {
            return false;
        }

        let container_type = container.container_type();
        for other in self.containers.values_mut() {
            let Some(function) = other.as_function_mut() else {
                continue;
            };
            let linked_name = match container_type {
                ContainerType::Role if function.role.id == id => &mut function.role.name,
                ContainerType::Organization if function.organization.id == id => {
                    &mut function.organization.name
                }
                _ => continue,
            };
            *linked_name = name.to_string();
            function.refresh_name();
        }
        true
    }

    /// Replace a function entry's linked role/organization and cascade their
    /// names onto the matching container entries.
    pub fn update_function(&mut self, function: &FunctionContainer) -> bool {
        let Some(existing) = self
            .containers
            .get_mut(&function.id)
            .and_then(Container::as_function_mut)
        else {
            return false;
        };

        let mut changed = false;
        if existing.role != function.role || existing.organization != function.organization {
            existing.role = function.role.clone();
            existing.organization = function.organization.clone();
            existing.refresh_name();
            changed = true;
        }

        if let Some(role) = self.containers.get_mut(&function.role.id) {
            changed |= role.set_name(function.role.name.clone());
        }
        if let Some(organization) = self.containers.get_mut(&function.organization.id) {
            changed |= organization.set_name(function.organization.name.clone());
        }
        changed
    }

    /// Replace `active_memberships` with a full recomputation at `now`.
    /// Returns whether the set changed.
    pub fn recalculate(&mut self, now: DateTime<Utc>) -> bool {
        let active = membership::calculate_active_memberships(self, now);
        if active == self.active_memberships {
            return false;
        }
        self.active_memberships = active;
        true
    }

    /// Drop every container and edge no longer reachable from the profile
    pub fn prune(&mut self) -> PruneOutcome {
        let connected = membership::connected_containers(self);
        let connected_ids: BTreeSet<&str> = connected.iter().map(|c| c.id.as_str()).collect();

        let removed_containers: Vec<ObjectIdent> = self
            .containers
            .values()
            .filter(|c| !connected_ids.contains(c.id()))
            .map(Container::ident)
            .collect();

        let profile_id = self.profile_id.as_str();
        let removed_assignments: Vec<AssignmentKey> = self
            .assignments
            .keys()
            .filter(|key| {
                let child_reachable =
                    key.child_id == profile_id || connected_ids.contains(key.child_id.as_str());
                !child_reachable || !connected_ids.contains(key.parent_id.as_str())
            })
            .cloned()
            .collect();

        for ident in &removed_containers {
            self.containers.remove(&ident.id);
        }
        for key in &removed_assignments {
            self.assignments.remove(key);
        }

        PruneOutcome {
            removed_containers,
            removed_assignments,
        }
    }
}

/// Flat persisted representation of [`AssignmentsUser`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentsUserDocument {
    pub profile_id: String,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub active_memberships: Vec<ObjectIdent>,
}

impl From<AssignmentsUser> for AssignmentsUserDocument {
    fn from(user: AssignmentsUser) -> Self {
        Self {
            profile_id: user.profile_id,
            containers: user.containers.into_values().collect(),
            assignments: user.assignments.into_values().collect(),
            active_memberships: user.active_memberships.into_iter().collect(),
        }
    }
}

impl From<AssignmentsUserDocument> for AssignmentsUser {
    fn from(doc: AssignmentsUserDocument) -> Self {
        let mut user = AssignmentsUser::new(doc.profile_id);
        for container in doc.containers {
            user.add_container(container);
        }
        for assignment in doc.assignments {
            user.upsert_assignment(assignment.profile, assignment.parent, assignment.conditions);
        }
        user.active_memberships = doc.active_memberships.into_iter().collect();
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::container::{GroupContainer, OrganizationContainer, RoleContainer};
    use chrono::Duration;

    fn group(id: &str) -> Container {
        GroupContainer {
            id: id.into(),
            name: id.to_uppercase(),
        }
        .into()
    }

    #[test]
    fn test_add_container_is_noop_for_existing_id() {
        let mut user = AssignmentsUser::new("u");
        assert!(user.add_container(group("g")));
        let renamed: Container = GroupContainer {
            id: "g".into(),
            name: "other".into(),
        }
        .into();
        assert!(!user.add_container(renamed));
        assert_eq!(user.container("g").unwrap().name(), "G");
    }

    #[test]
    fn test_upsert_applies_default_condition() {
        let mut user = AssignmentsUser::new("u");
        user.upsert_assignment(ObjectIdent::user("u"), ObjectIdent::group("g"), Vec::new());
        let edge = user.assignment("u", "g").unwrap();
        assert_eq!(edge.conditions.len(), 1);
        assert!(edge.conditions.iter().all(RangeCondition::is_unbounded));
    }

    #[test]
    fn test_repeated_assignment_is_idempotent() {
        let now = Utc::now();
        let condition = RangeCondition::starting_at(now);
        let mut user = AssignmentsUser::new("u");

        let (u, g) = (ObjectIdent::user("u"), ObjectIdent::group("g"));

        let first = user.upsert_assignment(u.clone(), g.clone(), [condition]);
        let second = user.upsert_assignment(u, g, [condition]);

        assert_eq!(first, AssignmentChange::Created);
        assert_eq!(second, AssignmentChange::Unchanged);
        assert_eq!(user.assignments().count(), 1);
        assert_eq!(user.assignment("u", "g").unwrap().conditions.len(), 1);
    }

    #[test]
    fn test_reassignment_unions_conditions() {
        let now = Utc::now();
        let mut user = AssignmentsUser::new("u");
        user.upsert_assignment(
            ObjectIdent::user("u"),
            ObjectIdent::group("g"),
            [RangeCondition::starting_at(now)],
        );
        let change = user.upsert_assignment(
            ObjectIdent::user("u"),
            ObjectIdent::group("g"),
            [RangeCondition::between(now - Duration::days(3), now - Duration::days(2))],
        );
        assert_eq!(change, AssignmentChange::Extended);
        assert_eq!(user.assignment("u", "g").unwrap().conditions.len(), 2);
    }

    #[test]
    fn test_remove_conditions_deletes_empty_edge() {
        let now = Utc::now();
        let a = RangeCondition::starting_at(now);
        let b = RangeCondition::starting_at(now + Duration::days(1));
        let mut user = AssignmentsUser::new("u");
        user.upsert_assignment(ObjectIdent::user("u"), ObjectIdent::group("g"), [a, b]);

        assert_eq!(user.remove_conditions("u", "g", &[a]), ConditionRemoval::ConditionsRemoved);
        assert_eq!(user.remove_conditions("u", "g", &[a]), ConditionRemoval::Unchanged);
        assert_eq!(user.remove_conditions("u", "g", &[b]), ConditionRemoval::AssignmentRemoved);
        assert_eq!(user.remove_conditions("u", "g", &[b]), ConditionRemoval::NotFound);
    }

    #[test]
    fn test_remove_conditions_without_conditions_removes_edge() {
        let mut user = AssignmentsUser::new("u");
        user.upsert_assignment(
            ObjectIdent::user("u"),
            ObjectIdent::group("g"),
            [RangeCondition::starting_at(Utc::now())],
        );
        assert_eq!(user.remove_conditions("u", "g", &[]), ConditionRemoval::AssignmentRemoved);
        assert!(user.assignment("u", "g").is_none());
    }

    #[test]
    fn test_rename_role_cascades_to_function() {
        let mut user = AssignmentsUser::new("u");
        let role = RoleContainer {
            id: "r".into(),
            name: "Editor".into(),
        };
        let org = OrganizationContainer {
            id: "o".into(),
            name: "News".into(),
        };
        user.add_container(FunctionContainer::new("f", role.clone(), org.clone()).into());
        user.add_container(role.into());
        user.add_container(org.into());

        assert!(user.rename_container("r", "Writer"));
        assert!(user.rename_container("o", "Desk"));
        assert_eq!(user.container("f").unwrap().name(), "Writer (Desk)");
    }

    #[test]
    fn test_update_function_cascades_names() {
        let mut user = AssignmentsUser::new("u");
        let role = RoleContainer {
            id: "r".into(),
            name: "Editor".into(),
        };
        let org = OrganizationContainer {
            id: "o".into(),
            name: "News".into(),
        };
        user.add_container(FunctionContainer::new("f", role.clone(), org.clone()).into());
        user.add_container(role.into());
        user.add_container(org.into());

        let updated = FunctionContainer::new(
            "f",
            RoleContainer {
                id: "r".into(),
                name: "Lead".into(),
            },
            OrganizationContainer {
                id: "o".into(),
                name: "Sports".into(),
            },
        );
        assert!(user.update_function(&updated));
        assert_eq!(user.container("f").unwrap().name(), "Lead (Sports)");
        assert_eq!(user.container("r").unwrap().name(), "Lead");
        assert_eq!(user.container("o").unwrap().name(), "Sports");
        assert!(!user.update_function(&updated));
    }

    #[test]
    fn test_document_round_trip_restores_invariants() {
        let now = Utc::now();
        let mut user = AssignmentsUser::new("u");
        user.add_container(group("g"));
        user.upsert_assignment(
            ObjectIdent::user("u"),
            ObjectIdent::group("g"),
            [RangeCondition::starting_at(now)],
        );
        user.recalculate(now);

        let json = serde_json::to_string(&user).unwrap();
        let back: AssignmentsUser = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }
}
