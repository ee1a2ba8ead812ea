// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Assignment Projection Service
//!
//! Folds consumed assignment events into the `AssignmentsUser` aggregate of
//! the stream owner. Each event is one unit of work: begin, load, mutate,
//! recompute active memberships, save, commit. Any failure rolls the unit
//! back and is surfaced to the caller.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Event handlers for the per-profile assignment graph

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::assignments_user::{AssignmentsUser, ConditionRemoval};
use crate::domain::clock::Clock;
use crate::domain::condition::RangeCondition;
use crate::domain::container::{Container, FunctionContainer};
use crate::domain::events::{AssignmentEvent, EventContext};
use crate::domain::object_ident::{ObjectIdent, ObjectType};
use crate::domain::repository::{AssignmentStore, AssignmentTransaction, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The aggregate the event applies to does not exist
    #[error("Projection states mismatch: {0}")]
    StatesMismatch(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct AssignmentProjectionService {
    store: Arc<dyn AssignmentStore>,
    clock: Arc<dyn Clock>,
}

impl AssignmentProjectionService {
    pub fn new(store: Arc<dyn AssignmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply one event to the aggregate of `context.related_entity`.
    ///
    /// Events delivered on a stream that is not owned by a user profile are
    /// ignored.
    pub async fn handle(
        &self,
        context: &EventContext,
        event: &AssignmentEvent,
    ) -> Result<(), ProjectionError> {
        let owner = &context.related_entity;
        if !owner.object_type.is_user_profile() {
            debug!(
                related_entity = %owner,
                event_type = event.event_type(),
                "Ignoring event for non-user stream"
            );
            return Ok(());
        }

        let mut tx = self.store.begin().await?;
        match self.apply(tx.as_mut(), &owner.id, event).await {
            Ok(()) => {
                tx.commit().await?;
                debug!(
                    profile_id = %owner.id,
                    event_type = event.event_type(),
                    correlation_id = %context.correlation_id,
                    "Event projected"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn AssignmentTransaction,
        profile_id: &str,
        event: &AssignmentEvent,
    ) -> Result<(), ProjectionError> {
        match event {
            AssignmentEvent::ProfileCreated { .. } => {
                if tx.get_assignment_user(profile_id).await?.is_some() {
                    debug!(profile_id, "Aggregate already exists, keeping it");
                    return Ok(());
                }
                tx.save_assignment_user(&AssignmentsUser::new(profile_id)).await?;
                info!(profile_id, "Assignments user created");
                Ok(())
            }
            AssignmentEvent::ProfileDeleted { .. } => {
                require_user(tx, profile_id).await?;
                tx.remove_assignment_user(profile_id).await?;
                info!(profile_id, "Assignments user deleted");
                Ok(())
            }
            other => {
                let mut user = require_user(tx, profile_id).await?;
                mutate(&mut user, other);
                if user.recalculate(self.clock.now()) {
                    debug!(
                        profile_id,
                        active = user.active_memberships().len(),
                        "Active memberships changed"
                    );
                }
                tx.save_assignment_user(&user).await?;
                Ok(())
            }
        }
    }
}

async fn require_user(
    tx: &mut dyn AssignmentTransaction,
    profile_id: &str,
) -> Result<AssignmentsUser, ProjectionError> {
    tx.get_assignment_user(profile_id).await?.ok_or_else(|| {
        ProjectionError::StatesMismatch(format!("no assignments user for profile {profile_id}"))
    })
}

/// Structural change carried by `event`. Membership recomputation is left
/// to the caller.
fn mutate(user: &mut AssignmentsUser, event: &AssignmentEvent) {
    match event {
        AssignmentEvent::AssignedToGroup {
            profile,
            target,
            conditions,
        } => assign(user, profile, target.clone().into(), conditions),
        AssignmentEvent::AssignedToRole {
            profile,
            target,
            conditions,
        } => assign(user, profile, target.clone().into(), conditions),
        AssignmentEvent::AssignedToOrganization {
            profile,
            target,
            conditions,
        } => assign(user, profile, target.clone().into(), conditions),
        AssignmentEvent::AssignedToFunction {
            profile,
            target,
            conditions,
        } => assign_function(user, profile, target, conditions),
        AssignmentEvent::UnassignedFrom {
            parent_id,
            child_id,
            conditions,
        } => unassign(user, child_id, parent_id, conditions),
        AssignmentEvent::ContainerDeleted { container_id } => {
            let removed = user.remove_assignments_to(container_id);
            prune(user);
            debug!(
                profile_id = user.profile_id(),
                container_id,
                removed,
                "Container detached"
            );
        }
        AssignmentEvent::PropertiesChanged { id, properties } => rename(user, id, properties),
        AssignmentEvent::FunctionChanged { function } => {
            if !user.update_function(function) {
                debug!(
                    profile_id = user.profile_id(),
                    function_id = %function.id,
                    "Function unchanged or unknown"
                );
            }
        }
        // Pure recomputation
        AssignmentEvent::AssignmentConditionTriggered(_) => {}
        AssignmentEvent::ProfileCreated { .. } | AssignmentEvent::ProfileDeleted { .. } => {}
    }
}

fn assign(
    user: &mut AssignmentsUser,
    profile: &ObjectIdent,
    target: Container,
    conditions: &[RangeCondition],
) {
    if profile.object_type == ObjectType::Unknown {
        warn!(
            profile_id = user.profile_id(),
            child_id = %profile.id,
            target_id = target.id(),
            "Skipping assignment from node of unknown type"
        );
        return;
    }

    let parent = target.ident();
    user.add_container(target);
    let change =
        user.upsert_assignment(profile.clone(), parent.clone(), conditions.iter().copied());
    debug!(
        profile_id = user.profile_id(),
        child = %profile,
        parent = %parent,
        ?change,
        "Assignment applied"
    );
}

fn assign_function(
    user: &mut AssignmentsUser,
    profile: &ObjectIdent,
    function: &FunctionContainer,
    conditions: &[RangeCondition],
) {
    if profile.object_type == ObjectType::Unknown {
        warn!(
            profile_id = user.profile_id(),
            child_id = %profile.id,
            function_id = %function.id,
            "Skipping function assignment from node of unknown type"
        );
        return;
    }

    let function_ident = ObjectIdent::function(function.id.clone());
    user.add_container(function.role.clone().into());
    user.add_container(function.organization.clone().into());
    user.add_container(function.clone().into());

    user.upsert_assignment(function_ident.clone(), function.role_ident(), []);
    user.upsert_assignment(function_ident.clone(), function.organization_ident(), []);
    user.upsert_assignment(profile.clone(), function_ident, conditions.iter().copied());
}

fn unassign(
    user: &mut AssignmentsUser,
    child_id: &str,
    parent_id: &str,
    conditions: &[RangeCondition],
) {
    match user.remove_conditions(child_id, parent_id, conditions) {
        ConditionRemoval::NotFound => {
            info!(
                profile_id = user.profile_id(),
                child_id,
                parent_id,
                "Unassignment for unknown edge ignored"
            );
        }
        ConditionRemoval::Unchanged => {
            debug!(
                profile_id = user.profile_id(),
                child_id,
                parent_id,
                "No matching conditions to remove"
            );
        }
        ConditionRemoval::ConditionsRemoved => {
            debug!(profile_id = user.profile_id(), child_id, parent_id, "Conditions removed");
        }
        ConditionRemoval::AssignmentRemoved => {
            debug!(profile_id = user.profile_id(), child_id, parent_id, "Assignment removed");
            prune(user);
        }
    }
}

fn rename(user: &mut AssignmentsUser, id: &str, properties: &HashMap<String, Value>) {
    let Some(name) = properties.get("name") else {
        return;
    };
    let Some(name) = name.as_str() else {
        warn!(
            profile_id = user.profile_id(),
            container_id = id,
            "Ignoring non-string name property"
        );
        return;
    };
    if user.rename_container(id, name) {
        debug!(profile_id = user.profile_id(), container_id = id, name, "Container renamed");
    }
}

fn prune(user: &mut AssignmentsUser) {
    let outcome = user.prune();
    if !outcome.is_empty() {
        debug!(
            profile_id = user.profile_id(),
            containers = outcome.removed_containers.len(),
            assignments = outcome.removed_assignments.len(),
            "Pruned disconnected nodes"
        );
    }
}
