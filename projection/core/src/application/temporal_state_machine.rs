// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Temporal State Machine
//!
//! One tick walks every persisted temporary assignment, moves the records
//! whose validity window crossed a boundary along the activation lattice and
//! emits the events that make the projection re-evaluate the affected
//! profiles.
//!
//! Records are isolated from each other: a corrupted record is quarantined
//! as `ErrorOccurred`, a record whose subtree lookup fails is left untouched
//! for the next tick. Events are published before the batch of state changes
//! is persisted, so a crash in between re-emits them (at-least-once).
//!
//! Store transactions stay short: one to load the records, one read per
//! transitioning record, one batch write at the end. Events are published
//! with no transaction open, so trigger consumers writing to the store keep
//! draining while a tick emits.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Reconciles temporary assignments against the clock

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::client_settings::calculate_client_settings;
use crate::domain::events::{AssignmentConditionTriggered, ProjectionEvent};
use crate::domain::object_ident::ObjectIdent;
use crate::domain::publisher::{EventPublisher, PublishError};
use crate::domain::repository::{AssignmentStore, AssignmentTransaction, RepositoryError};
use crate::domain::temporary_assignment::{Evaluation, TemporaryAssignment};

#[derive(Debug, thiserror::Error)]
pub enum TemporalError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Counters of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub examined: usize,
    pub transitioned: usize,
    pub quarantined: usize,
    pub skipped: usize,
    pub emitted: usize,
}

pub struct TemporalStateMachine {
    store: Arc<dyn AssignmentStore>,
    publisher: Arc<dyn EventPublisher>,
    /// Serializes ticks; records are read and written in separate transactions
    ticking: Mutex<()>,
}

impl TemporalStateMachine {
    pub fn new(store: Arc<dyn AssignmentStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            publisher,
            ticking: Mutex::new(()),
        }
    }

    /// Run one reconciliation pass at `now`.
    ///
    /// Cancellation is checked between records; records handled before the
    /// token fired are still persisted. A publish failure aborts the tick
    /// without persisting anything.
    pub async fn tick(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<TickReport, TemporalError> {
        let _ticking = self.ticking.lock().await;

        let records = self.load_records().await?;
        let mut report = TickReport::default();
        let mut updated: Vec<TemporaryAssignment> = Vec::new();

        for mut record in records {
            if cancel.is_cancelled() {
                info!(examined = report.examined, "Temporal tick cancelled");
                break;
            }
            report.examined += 1;

            match record.evaluate(now) {
                Evaluation::Skip => report.skipped += 1,
                Evaluation::NoChange => {}
                Evaluation::Corrupted(message) => {
                    warn!(
                        assignment_id = %record.id,
                        state = %record.state,
                        notification_status = %record.notification_status,
                        "Quarantining temporary assignment: {}",
                        message
                    );
                    record.quarantine(message, now);
                    metrics::counter!("assignments_temporal_quarantined_total").increment(1);
                    report.quarantined += 1;
                    updated.push(record);
                }
                Evaluation::Transition(target) => {
                    let events = match self.collect_events(&record, target.is_active()).await {
                        Ok(events) => events,
                        Err(e) => {
                            warn!(
                                assignment_id = %record.id,
                                error = %e,
                                "Subtree lookup failed, retrying next tick"
                            );
                            continue;
                        }
                    };

                    for event in events {
                        self.publisher.publish(event).await?;
                        metrics::counter!("assignments_triggers_emitted_total").increment(1);
                        report.emitted += 1;
                    }

                    info!(
                        assignment_id = %record.id,
                        from = %record.state,
                        to = %target,
                        target_id = %record.target_id,
                        "Temporary assignment transitioned"
                    );
                    record.apply_transition(target, now);
                    metrics::counter!(
                        "assignments_temporal_transitions_total",
                        "target" => target.to_string()
                    )
                    .increment(1);
                    report.transitioned += 1;
                    updated.push(record);
                }
            }
        }

        if !updated.is_empty() {
            self.persist(&updated).await?;
        }

        debug!(?report, "Temporal tick finished");
        Ok(report)
    }

    async fn load_records(&self) -> Result<Vec<TemporaryAssignment>, RepositoryError> {
        let mut tx = self.store.begin().await?;
        let records = tx.get_temporary_assignments().await;
        tx.rollback().await?;
        records
    }

    async fn collect_events(
        &self,
        record: &TemporaryAssignment,
        is_active: bool,
    ) -> Result<Vec<ProjectionEvent>, RepositoryError> {
        let mut tx = self.store.begin().await?;
        let events = transition_events(tx.as_mut(), record, is_active).await;
        tx.rollback().await?;
        events
    }

    async fn persist(&self, updated: &[TemporaryAssignment]) -> Result<(), RepositoryError> {
        let mut tx = self.store.begin().await?;
        if let Err(e) = tx.update_temporary_assignment_states(updated).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            return Err(e);
        }
        tx.commit().await
    }
}

/// Events for one transition: a trigger per distinct node of
/// `{target} ∪ subtree(target) ∪ {profile}`, then the recalculated client
/// settings of every affected user on activation.
async fn transition_events(
    tx: &mut dyn AssignmentTransaction,
    record: &TemporaryAssignment,
    is_active: bool,
) -> Result<Vec<ProjectionEvent>, RepositoryError> {
    let target = record.target();
    let children = tx.get_all_children(&target).await?;

    let mut seen: HashSet<ObjectIdent> = HashSet::new();
    let affected: Vec<ObjectIdent> = std::iter::once(target)
        .chain(children.into_iter().map(|relation| relation.child))
        .chain(std::iter::once(record.profile()))
        .filter(|node| seen.insert(node.clone()))
        .collect();

    let mut events: Vec<ProjectionEvent> = affected
        .iter()
        .map(|node| {
            ProjectionEvent::AssignmentConditionTriggered(AssignmentConditionTriggered {
                profile_id: node.id.clone(),
                profile_type: node.object_type,
                target_id: record.target_id.clone(),
                target_object_type: record.target_type,
                is_active,
            })
        })
        .collect();

    if is_active {
        for user in affected.iter().filter(|node| node.object_type.is_user_profile()) {
            let settings = tx.get_calculated_client_settings(&user.id).await?;
            let calculated = calculate_client_settings(&settings);
            if calculated.is_empty() {
                continue;
            }

            events.push(ProjectionEvent::ClientSettingsInvalidated {
                profile_id: user.id.clone(),
                keys: calculated.keys().cloned().collect(),
            });
            events.extend(calculated.into_iter().map(|(key, value)| {
                ProjectionEvent::ClientSettingsCalculated {
                    profile_id: user.id.clone(),
                    key,
                    calculated_settings: value,
                }
            }));
        }
    }

    Ok(events)
}
