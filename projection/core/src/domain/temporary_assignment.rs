// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Temporary assignments and their activation lattice
//!
//! A temporary assignment tracks one time-bounded edge system-wide. Each tick
//! evaluates it against the clock:
//!
//! ```text
//! NotProcessed ──start reached, no end──▶ Active ───────────────┐
//!      │  └──────start reached, end set──▶ ActiveWithExpiration ─┤ end passed
//!      └───────────────────────────end passed────────────────────┴──▶ Inactive
//! ```
//!
//! `(state, notification_status)` pairs outside the legal table are reported
//! as corrupted so the caller can quarantine the record as `ErrorOccurred`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::object_ident::{ObjectIdent, ObjectType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemporaryAssignmentId(pub Uuid);

impl TemporaryAssignmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TemporaryAssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TemporaryAssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporaryAssignmentState {
    #[default]
    NotProcessed,
    Active,
    ActiveWithExpiration,
    Inactive,
    ErrorOccurred,
}

impl TemporaryAssignmentState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::ActiveWithExpiration)
    }
}

impl fmt::Display for TemporaryAssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotProcessed => "not_processed",
            Self::Active => "active",
            Self::ActiveWithExpiration => "active_with_expiration",
            Self::Inactive => "inactive",
            Self::ErrorOccurred => "error_occurred",
        };
        f.write_str(s)
    }
}

/// Which triggering notifications were already sent for a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    NoneSent,
    ActivationSent,
    DeactivationSent,
    BothSent,
}

impl NotificationStatus {
    pub fn activation_sent(&self) -> bool {
        matches!(self, Self::ActivationSent | Self::BothSent)
    }

    pub fn deactivation_sent(&self) -> bool {
        matches!(self, Self::DeactivationSent | Self::BothSent)
    }

    fn from_flags(activation: bool, deactivation: bool) -> Self {
        match (activation, deactivation) {
            (false, false) => Self::NoneSent,
            (true, false) => Self::ActivationSent,
            (false, true) => Self::DeactivationSent,
            (true, true) => Self::BothSent,
        }
    }

    pub fn with_activation(self) -> Self {
        Self::from_flags(true, self.deactivation_sent())
    }

    pub fn with_deactivation(self) -> Self {
        Self::from_flags(self.activation_sent(), true)
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoneSent => "none_sent",
            Self::ActivationSent => "activation_sent",
            Self::DeactivationSent => "deactivation_sent",
            Self::BothSent => "both_sent",
        };
        f.write_str(s)
    }
}

use NotificationStatus as N;
use TemporaryAssignmentState as S;

/// Every `(state, notification)` pair a healthy record can be in
const LEGAL_COMBINATIONS: &[(S, N)] = &[
    (S::NotProcessed, N::NoneSent),
    (S::Active, N::ActivationSent),
    (S::ActiveWithExpiration, N::ActivationSent),
    (S::Inactive, N::DeactivationSent),
    (S::Inactive, N::BothSent),
];

/// `(target, state, notification)`: allowed predecessors of each target state
const LEGAL_PREDECESSORS: &[(S, S, N)] = &[
    (S::Active, S::NotProcessed, N::NoneSent),
    (S::ActiveWithExpiration, S::NotProcessed, N::NoneSent),
    (S::Inactive, S::NotProcessed, N::NoneSent),
    (S::Inactive, S::Active, N::ActivationSent),
    (S::Inactive, S::ActiveWithExpiration, N::ActivationSent),
];

/// Outcome of evaluating one record at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Quarantined or settled records; nothing to do
    Skip,
    /// Healthy record whose window did not cross a boundary
    NoChange,
    Transition(TemporaryAssignmentState),
    Corrupted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryAssignment {
    #[serde(default)]
    pub id: TemporaryAssignmentId,
    pub profile_id: String,
    pub profile_type: ObjectType,
    pub target_id: String,
    pub target_type: ObjectType,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: TemporaryAssignmentState,
    #[serde(default)]
    pub notification_status: NotificationStatus,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

impl TemporaryAssignment {
    pub fn new(
        profile: ObjectIdent,
        target: ObjectIdent,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TemporaryAssignmentId::new(),
            profile_id: profile.id,
            profile_type: profile.object_type,
            target_id: target.id,
            target_type: target.object_type,
            start,
            end,
            state: TemporaryAssignmentState::NotProcessed,
            notification_status: NotificationStatus::NoneSent,
            last_modified: now,
            last_error_message: None,
        }
    }

    pub fn profile(&self) -> ObjectIdent {
        ObjectIdent::new(self.profile_id.clone(), self.profile_type)
    }

    pub fn target(&self) -> ObjectIdent {
        ObjectIdent::new(self.target_id.clone(), self.target_type)
    }

    pub fn should_be_active(&self, now: DateTime<Utc>) -> bool {
        self.start.is_some_and(|start| start <= now) && self.end.is_none_or(|end| end >= now)
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| end < now)
    }

    /// Target state this tick, if the window crossed a boundary
    pub fn desired_state(&self, now: DateTime<Utc>) -> Option<TemporaryAssignmentState> {
        match self.state {
            S::NotProcessed | S::Active | S::ActiveWithExpiration if self.has_expired(now) => {
                Some(S::Inactive)
            }
            S::NotProcessed if self.should_be_active(now) => Some(if self.end.is_none() {
                S::Active
            } else {
                S::ActiveWithExpiration
            }),
            _ => None,
        }
    }

    pub fn evaluate(&self, now: DateTime<Utc>) -> Evaluation {
        if self.state == S::ErrorOccurred {
            return Evaluation::Skip;
        }

        if !LEGAL_COMBINATIONS.contains(&(self.state, self.notification_status)) {
            return Evaluation::Corrupted(format!(
                "Illegal combination of state '{}' and notification status '{}'",
                self.state, self.notification_status
            ));
        }

        let Some(target) = self.desired_state(now) else {
            return if self.state == S::Inactive {
                Evaluation::Skip
            } else {
                Evaluation::NoChange
            };
        };

        if !LEGAL_PREDECESSORS.contains(&(target, self.state, self.notification_status)) {
            return Evaluation::Corrupted(format!(
                "Transition from '{}' ({}) to '{}' is not allowed",
                self.state, self.notification_status, target
            ));
        }

        Evaluation::Transition(target)
    }

    /// Move to `target` and record the notification about to be sent
    pub fn apply_transition(&mut self, target: TemporaryAssignmentState, now: DateTime<Utc>) {
        self.notification_status = if target.is_active() {
            self.notification_status.with_activation()
        } else {
            self.notification_status.with_deactivation()
        };
        self.state = target;
        self.last_modified = now;
        self.last_error_message = None;
    }

    pub fn quarantine(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.state = S::ErrorOccurred;
        self.last_error_message = Some(message.into());
        self.last_modified = now;
    }
}
