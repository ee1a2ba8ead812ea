// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stream replay
//!
//! Reads NDJSON dumps of `{"context": ..., "event": ...}` envelopes and
//! YAML lists of temporary assignments, and feeds them into an in-memory
//! projection. The upstream container catalog is rebuilt from the
//! assignment events of the dump.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use assignments_core::application::AssignmentProjectionService;
use assignments_core::domain::container::Container;
use assignments_core::domain::events::{AssignmentEvent, EventEnvelope};
use assignments_core::domain::object_ident::ObjectIdent;
use assignments_core::domain::temporary_assignment::TemporaryAssignment;
use assignments_core::infrastructure::repositories::InMemoryAssignmentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub failed: usize,
}

/// Parse an NDJSON stream dump. Blank lines and `#` comments are skipped.
pub fn load_envelopes(path: &Path) -> Result<Vec<EventEnvelope>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event stream {:?}", path))?;
    parse_envelopes(&content).with_context(|| format!("Invalid event stream {:?}", path))
}

pub fn parse_envelopes(content: &str) -> Result<Vec<EventEnvelope>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

/// Parse a YAML list of temporary assignments
pub fn load_temporary_assignments(path: &Path) -> Result<Vec<TemporaryAssignment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read temporary assignments {:?}", path))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid temporary assignments {:?}", path))
}

/// Catalog edges `(parent, child)` implied by one consumed event
pub fn catalog_edges(event: &AssignmentEvent) -> Vec<(ObjectIdent, ObjectIdent)> {
    let (profile, target): (&ObjectIdent, Container) = match event {
        AssignmentEvent::AssignedToGroup {
            profile, target, ..
        } => (profile, target.clone().into()),
        AssignmentEvent::AssignedToRole {
            profile, target, ..
        } => (profile, target.clone().into()),
        AssignmentEvent::AssignedToOrganization {
            profile, target, ..
        } => (profile, target.clone().into()),
        AssignmentEvent::AssignedToFunction {
            profile, target, ..
        } => {
            let function = ObjectIdent::function(target.id.clone());
            return vec![
                (target.role_ident(), function.clone()),
                (target.organization_ident(), function.clone()),
                (function, profile.clone()),
            ];
        }
        _ => return Vec::new(),
    };
    vec![(target.ident(), profile.clone())]
}

/// Apply every envelope in order. Handler failures are logged and counted;
/// the replay goes on with the next envelope.
pub async fn replay(
    projection: &AssignmentProjectionService,
    store: &InMemoryAssignmentStore,
    envelopes: &[EventEnvelope],
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for envelope in envelopes {
        for (parent, child) in catalog_edges(&envelope.event) {
            store.add_child(parent, child).await;
        }

        match projection.handle(&envelope.context, &envelope.event).await {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(
                    related_entity = %envelope.context.related_entity,
                    event_type = envelope.event.event_type(),
                    error = %e,
                    "Failed to replay event"
                );
            }
        }
    }

    info!(applied = summary.applied, failed = summary.failed, "Event stream replayed");
    summary
}
