// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the assignments projection
//!
//! [`AssignmentEvent`] is what the projection consumes from the upstream
//! stream; [`ProjectionEvent`] is what it emits back into the pipeline.
//! `AssignmentConditionTriggered` travels both ways: the temporal reconciler
//! produces it and the projection consumes it to recompute memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::condition::RangeCondition;
use crate::domain::container::{
    FunctionContainer, GroupContainer, OrganizationContainer, RoleContainer,
};
use crate::domain::object_ident::{ObjectIdent, ObjectType};

/// Envelope metadata of a consumed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// Owner of the stream the event was delivered on; its aggregate is the
    /// one being projected
    pub related_entity: ObjectIdent,
    #[serde(default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl EventContext {
    pub fn new(related_entity: ObjectIdent) -> Self {
        Self {
            related_entity,
            correlation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }
}

/// Re-projection request emitted when a temporary assignment crosses a
/// window boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentConditionTriggered {
    pub profile_id: String,
    pub profile_type: ObjectType,
    pub target_id: String,
    pub target_object_type: ObjectType,
    pub is_active: bool,
}

impl AssignmentConditionTriggered {
    pub fn related_entity(&self) -> ObjectIdent {
        ObjectIdent::new(self.profile_id.clone(), self.profile_type)
    }
}

/// Events consumed by the projection handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignmentEvent {
    ProfileCreated {
        profile_id: String,
    },
    ProfileDeleted {
        profile_id: String,
    },
    AssignedToGroup {
        profile: ObjectIdent,
        target: GroupContainer,
        #[serde(default)]
        conditions: Vec<RangeCondition>,
    },
    AssignedToRole {
        profile: ObjectIdent,
        target: RoleContainer,
        #[serde(default)]
        conditions: Vec<RangeCondition>,
    },
    AssignedToOrganization {
        profile: ObjectIdent,
        target: OrganizationContainer,
        #[serde(default)]
        conditions: Vec<RangeCondition>,
    },
    AssignedToFunction {
        profile: ObjectIdent,
        target: FunctionContainer,
        #[serde(default)]
        conditions: Vec<RangeCondition>,
    },
    UnassignedFrom {
        parent_id: String,
        child_id: String,
        #[serde(default)]
        conditions: Vec<RangeCondition>,
    },
    ContainerDeleted {
        container_id: String,
    },
    PropertiesChanged {
        id: String,
        #[serde(default)]
        properties: HashMap<String, Value>,
    },
    FunctionChanged {
        function: FunctionContainer,
    },
    AssignmentConditionTriggered(AssignmentConditionTriggered),
}

impl AssignmentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AssignmentEvent::ProfileCreated { .. } => "profile_created",
            AssignmentEvent::ProfileDeleted { .. } => "profile_deleted",
            AssignmentEvent::AssignedToGroup { .. } => "assigned_to_group",
            AssignmentEvent::AssignedToRole { .. } => "assigned_to_role",
            AssignmentEvent::AssignedToOrganization { .. } => "assigned_to_organization",
            AssignmentEvent::AssignedToFunction { .. } => "assigned_to_function",
            AssignmentEvent::UnassignedFrom { .. } => "unassigned_from",
            AssignmentEvent::ContainerDeleted { .. } => "container_deleted",
            AssignmentEvent::PropertiesChanged { .. } => "properties_changed",
            AssignmentEvent::FunctionChanged { .. } => "function_changed",
            AssignmentEvent::AssignmentConditionTriggered(_) => "assignment_condition_triggered",
        }
    }
}

/// A consumed event together with its envelope, as read from a stream dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub context: EventContext,
    pub event: AssignmentEvent,
}

/// Events emitted by the projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectionEvent {
    AssignmentConditionTriggered(AssignmentConditionTriggered),
    ClientSettingsInvalidated {
        profile_id: String,
        keys: Vec<String>,
    },
    ClientSettingsCalculated {
        profile_id: String,
        key: String,
        calculated_settings: Value,
    },
}

impl ProjectionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProjectionEvent::AssignmentConditionTriggered(_) => "assignment_condition_triggered",
            ProjectionEvent::ClientSettingsInvalidated { .. } => "client_settings_invalidated",
            ProjectionEvent::ClientSettingsCalculated { .. } => "client_settings_calculated",
        }
    }

    pub fn profile_id(&self) -> &str {
        match self {
            ProjectionEvent::AssignmentConditionTriggered(t) => &t.profile_id,
            ProjectionEvent::ClientSettingsInvalidated { profile_id, .. } => profile_id,
            ProjectionEvent::ClientSettingsCalculated { profile_id, .. } => profile_id,
        }
    }
}
