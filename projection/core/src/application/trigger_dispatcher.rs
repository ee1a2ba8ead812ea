// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trigger Dispatcher Application Service
//!
//! Consumes condition triggers from the event bus's trigger queue and feeds
//! them back into the projection, addressed to the stream of the triggered
//! profile.
//!
//! - Coordinates domain (AssignmentEvent) and infrastructure (EventBus)
//! - Handles errors without crashing the process

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::assignment_projection::{AssignmentProjectionService, ProjectionError};
use crate::domain::events::{AssignmentConditionTriggered, AssignmentEvent, EventContext};
use crate::infrastructure::event_bus::{EventBus, EventBusError};

/// Background consumer routing `AssignmentConditionTriggered` events
pub struct TriggerDispatcher {
    projection: Arc<AssignmentProjectionService>,
    event_bus: Arc<EventBus>,
    shutdown_token: CancellationToken,
}

impl TriggerDispatcher {
    pub fn new(projection: Arc<AssignmentProjectionService>, event_bus: Arc<EventBus>) -> Self {
        Self {
            projection,
            event_bus,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Project one trigger into the triggered profile's aggregate
    pub async fn dispatch(
        &self,
        trigger: AssignmentConditionTriggered,
    ) -> Result<(), ProjectionError> {
        let context = EventContext::new(trigger.related_entity());
        self.projection
            .handle(&context, &AssignmentEvent::AssignmentConditionTriggered(trigger))
            .await
    }

    /// Start the background dispatch task.
    ///
    /// The subscription is taken before this returns, so triggers published
    /// afterwards are never missed. Queued triggers are drained before a
    /// shutdown request is honoured.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!("Starting trigger dispatcher background task");
        let mut receiver = self.event_bus.subscribe_triggers();

        tokio::spawn(async move {
            let mut dispatched = 0u64;
            let mut failures = 0u64;

            loop {
                let received = tokio::select! {
                    biased;
                    received = receiver.recv() => received,
                    _ = self.shutdown_token.cancelled() => {
                        info!("Shutdown signal received, stopping trigger dispatcher");
                        break;
                    }
                };

                match received {
                    Ok(trigger) => {
                        dispatched += 1;
                        let profile_id = trigger.profile_id.clone();
                        if let Err(e) = self.dispatch(trigger).await {
                            failures += 1;
                            metrics::counter!("assignments_dispatch_failures_total").increment(1);
                            error!(
                                profile_id = %profile_id,
                                error = %e,
                                "Failed to project condition trigger"
                            );
                        } else {
                            debug!(profile_id = %profile_id, "Condition trigger projected");
                        }
                    }
                    Err(EventBusError::Closed) => {
                        info!("Event bus closed, shutting down trigger dispatcher");
                        break;
                    }
                    Err(e) => {
                        error!(error = ?e, "Unexpected error receiving event from bus");
                    }
                }
            }

            info!(
                "Trigger dispatcher stopped (dispatched {} triggers, {} failures)",
                dispatched, failures
            );
        })
    }
}
