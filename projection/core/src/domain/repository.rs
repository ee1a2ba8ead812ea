// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract of the assignments projection. Every unit of work
//! runs inside one [`AssignmentTransaction`] obtained from an
//! [`AssignmentStore`]: begin, read/mutate, then `commit` on success or
//! `rollback` on failure. A transaction dropped without `commit` leaves the
//! store untouched.
//!
//! | Trait | Data | Implementation |
//! |-------|------|----------------|
//! | `AssignmentStore` | unit-of-work factory | `InMemoryAssignmentStore` |
//! | `AssignmentTransaction` | aggregates, temporary records, catalog | `InMemoryAssignmentTransaction` |
//!
//! The container catalog (`get_all_children`) and the inherited client
//! settings (`get_calculated_client_settings`) are owned by the upstream
//! projection; this crate only reads them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::assignments_user::AssignmentsUser;
use crate::domain::client_settings::ClientSetting;
use crate::domain::object_ident::ObjectIdent;
use crate::domain::temporary_assignment::TemporaryAssignment;

/// Factory of units of work
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Begin a new transaction
    async fn begin(&self) -> Result<Box<dyn AssignmentTransaction>, RepositoryError>;
}

/// One unit of work against the store
#[async_trait]
pub trait AssignmentTransaction: Send {
    /// Load the aggregate of a profile
    async fn get_assignment_user(
        &mut self,
        profile_id: &str,
    ) -> Result<Option<AssignmentsUser>, RepositoryError>;

    /// Save aggregate (create or update)
    async fn save_assignment_user(&mut self, user: &AssignmentsUser) -> Result<(), RepositoryError>;

    /// Delete the aggregate of a profile
    async fn remove_assignment_user(&mut self, profile_id: &str) -> Result<(), RepositoryError>;

    /// All temporary assignments known to the system
    async fn get_temporary_assignments(
        &mut self,
    ) -> Result<Vec<TemporaryAssignment>, RepositoryError>;

    /// Batch update of temporary assignment state
    async fn update_temporary_assignment_states(
        &mut self,
        assignments: &[TemporaryAssignment],
    ) -> Result<(), RepositoryError>;

    /// Full descendant subtree of a node (containers and profiles)
    async fn get_all_children(
        &mut self,
        ident: &ObjectIdent,
    ) -> Result<Vec<ChildRelation>, RepositoryError>;

    /// Settings contributions a profile inherits along its paths
    async fn get_calculated_client_settings(
        &mut self,
        profile_id: &str,
    ) -> Result<Vec<ClientSetting>, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildRelationKind {
    /// Immediate child of the queried node
    Direct,
    /// Reached through at least one intermediate container
    Inherited,
}

/// Entry of a children lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildRelation {
    pub child: ObjectIdent,
    pub kind: ChildRelationKind,
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
