// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory assignment store
//!
//! Transactions are serialized by a `tokio::sync::Mutex`: `begin` takes an
//! owned guard and works on a copy of the committed state. `commit` swaps
//! the copy in; `rollback` or dropping the transaction discards it.
//!
//! Aggregates are held as JSON documents so every save and load goes
//! through the persisted representation.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `AssignmentStore` / `AssignmentTransaction`

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::assignments_user::AssignmentsUser;
use crate::domain::client_settings::ClientSetting;
use crate::domain::object_ident::ObjectIdent;
use crate::domain::repository::{
    AssignmentStore, AssignmentTransaction, ChildRelation, ChildRelationKind, RepositoryError,
};
use crate::domain::temporary_assignment::TemporaryAssignment;

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: BTreeMap<String, Value>,
    temporary: Vec<TemporaryAssignment>,
    /// parent -> direct children, owned by the upstream catalog
    children: BTreeMap<ObjectIdent, BTreeSet<ObjectIdent>>,
    client_settings: HashMap<String, Vec<ClientSetting>>,
}

#[derive(Clone, Default)]
pub struct InMemoryAssignmentStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a temporary assignment, replacing any record with the same id.
    ///
    /// Seeding helpers take the store lock; do not call them while a
    /// transaction is open on the same task.
    pub async fn insert_temporary_assignment(&self, assignment: TemporaryAssignment) {
        let mut state = self.state.lock().await;
        match state.temporary.iter_mut().find(|t| t.id == assignment.id) {
            Some(existing) => *existing = assignment,
            None => state.temporary.push(assignment),
        }
    }

    /// Seed a catalog edge `parent -> child`
    pub async fn add_child(&self, parent: ObjectIdent, child: ObjectIdent) {
        let mut state = self.state.lock().await;
        state.children.entry(parent).or_default().insert(child);
    }

    /// Seed the settings contributions a profile inherits
    pub async fn set_client_settings(
        &self,
        profile_id: impl Into<String>,
        settings: Vec<ClientSetting>,
    ) {
        let mut state = self.state.lock().await;
        state.client_settings.insert(profile_id.into(), settings);
    }

    /// Committed aggregate of a profile
    pub async fn assignment_user(
        &self,
        profile_id: &str,
    ) -> Result<Option<AssignmentsUser>, RepositoryError> {
        let state = self.state.lock().await;
        state
            .users
            .get(profile_id)
            .map(|doc| serde_json::from_value(doc.clone()).map_err(RepositoryError::from))
            .transpose()
    }

    /// Every committed aggregate, ordered by profile id
    pub async fn assignment_users(&self) -> Result<Vec<AssignmentsUser>, RepositoryError> {
        let state = self.state.lock().await;
        state
            .users
            .values()
            .map(|doc| serde_json::from_value(doc.clone()).map_err(RepositoryError::from))
            .collect()
    }

    /// Committed temporary assignments, in insertion order
    pub async fn temporary_assignments(&self) -> Vec<TemporaryAssignment> {
        self.state.lock().await.temporary.clone()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn begin(&self) -> Result<Box<dyn AssignmentTransaction>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryAssignmentTransaction { guard, working }))
    }
}

pub struct InMemoryAssignmentTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

#[async_trait]
impl AssignmentTransaction for InMemoryAssignmentTransaction {
    async fn get_assignment_user(
        &mut self,
        profile_id: &str,
    ) -> Result<Option<AssignmentsUser>, RepositoryError> {
        match self.working.users.get(profile_id) {
            Some(doc) => Ok(Some(serde_json::from_value(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn save_assignment_user(
        &mut self,
        user: &AssignmentsUser,
    ) -> Result<(), RepositoryError> {
        let doc = serde_json::to_value(user)?;
        self.working.users.insert(user.profile_id().to_string(), doc);
        Ok(())
    }

    async fn remove_assignment_user(&mut self, profile_id: &str) -> Result<(), RepositoryError> {
        self.working
            .users
            .remove(profile_id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("assignments user {profile_id}")))
    }

    async fn get_temporary_assignments(
        &mut self,
    ) -> Result<Vec<TemporaryAssignment>, RepositoryError> {
        Ok(self.working.temporary.clone())
    }

    async fn update_temporary_assignment_states(
        &mut self,
        assignments: &[TemporaryAssignment],
    ) -> Result<(), RepositoryError> {
        for updated in assignments {
            let existing = self
                .working
                .temporary
                .iter_mut()
                .find(|t| t.id == updated.id)
                .ok_or_else(|| {
                    RepositoryError::NotFound(format!("temporary assignment {}", updated.id))
                })?;
            existing.state = updated.state;
            existing.notification_status = updated.notification_status;
            existing.last_modified = updated.last_modified;
            existing.last_error_message = updated.last_error_message.clone();
        }
        Ok(())
    }

    async fn get_all_children(
        &mut self,
        ident: &ObjectIdent,
    ) -> Result<Vec<ChildRelation>, RepositoryError> {
        let mut result = Vec::new();
        let mut visited: HashSet<&ObjectIdent> = HashSet::from([ident]);
        let mut queue: VecDeque<(&ObjectIdent, ChildRelationKind)> = VecDeque::new();

        if let Some(direct) = self.working.children.get(ident) {
            queue.extend(direct.iter().map(|c| (c, ChildRelationKind::Direct)));
        }

        while let Some((child, kind)) = queue.pop_front() {
            if !visited.insert(child) {
                continue;
            }
            result.push(ChildRelation {
                child: child.clone(),
                kind,
            });
            if let Some(grandchildren) = self.working.children.get(child) {
                queue.extend(grandchildren.iter().map(|c| (c, ChildRelationKind::Inherited)));
            }
        }

        Ok(result)
    }

    async fn get_calculated_client_settings(
        &mut self,
        profile_id: &str,
    ) -> Result<Vec<ClientSetting>, RepositoryError> {
        Ok(self
            .working
            .client_settings
            .get(profile_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryAssignmentTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}
