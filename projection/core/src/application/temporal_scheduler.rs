// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Temporal Scheduler - Background task driving the temporal state machine
//!
//! Ticks on a fixed interval using an injected clock, so replays and tests
//! can run the reconciler at any instant.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Periodic execution of `TemporalStateMachine::tick`

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::temporal_state_machine::{TemporalStateMachine, TickReport};
use crate::domain::clock::Clock;
use crate::domain::config::TemporalConfig;

/// Configuration for the temporal scheduler
#[derive(Debug, Clone)]
pub struct TemporalSchedulerConfig {
    /// How often to run a tick (in seconds)
    pub interval_seconds: u64,

    /// Whether the scheduler runs at all
    pub enabled: bool,
}

impl Default for TemporalSchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            enabled: true,
        }
    }
}

impl From<&TemporalConfig> for TemporalSchedulerConfig {
    fn from(config: &TemporalConfig) -> Self {
        Self {
            interval_seconds: config.interval_seconds,
            enabled: config.enabled,
        }
    }
}

pub struct TemporalScheduler {
    state_machine: Arc<TemporalStateMachine>,
    clock: Arc<dyn Clock>,
    config: TemporalSchedulerConfig,
    shutdown_token: CancellationToken,
}

impl TemporalScheduler {
    pub fn new(
        state_machine: Arc<TemporalStateMachine>,
        clock: Arc<dyn Clock>,
        config: TemporalSchedulerConfig,
    ) -> Self {
        Self {
            state_machine,
            clock,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the scheduler background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop with graceful shutdown support
    async fn run(&self) {
        if !self.config.enabled {
            info!("Temporal scheduler is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            "Starting temporal scheduler background task"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running temporal tick");

                    match self.run_once().await {
                        Ok(report) => {
                            if report.transitioned > 0 || report.quarantined > 0 {
                                info!(
                                    examined = report.examined,
                                    transitioned = report.transitioned,
                                    quarantined = report.quarantined,
                                    emitted = report.emitted,
                                    "Temporal tick completed"
                                );
                            }
                        }
                        Err(e) => {
                            warn!("Temporal tick failed: {:#}", e);
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping temporal scheduler");
                    break;
                }
            }
        }

        info!("Temporal scheduler background task stopped");
    }

    /// Execute a single tick at the clock's current instant
    pub async fn run_once(&self) -> Result<TickReport> {
        let now = self.clock.now();
        self.state_machine
            .tick(now, &self.shutdown_token)
            .await
            .with_context(|| format!("Temporal tick at {} failed", now.to_rfc3339()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::object_ident::ObjectIdent;
    use crate::domain::temporary_assignment::{TemporaryAssignment, TemporaryAssignmentState};
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::InMemoryAssignmentStore;
    use chrono::{Duration as ChronoDuration, Utc};

    async fn scheduler_with_record(
        config: TemporalSchedulerConfig,
    ) -> (Arc<TemporalScheduler>, InMemoryAssignmentStore, Arc<FixedClock>) {
        let now = Utc::now();
        let store = InMemoryAssignmentStore::new();
        store
            .insert_temporary_assignment(TemporaryAssignment::new(
                ObjectIdent::user("u"),
                ObjectIdent::group("g1"),
                Some(now + ChronoDuration::hours(1)),
                None,
                now,
            ))
            .await;

        let clock = Arc::new(FixedClock::new(now));
        let machine = Arc::new(TemporalStateMachine::new(
            Arc::new(store.clone()),
            Arc::new(EventBus::new(16)),
        ));
        let scheduler = Arc::new(TemporalScheduler::new(machine, clock.clone(), config));
        (scheduler, store, clock)
    }

    #[tokio::test]
    async fn test_run_once_uses_injected_clock() {
        let (scheduler, store, clock) =
            scheduler_with_record(TemporalSchedulerConfig::default()).await;

        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.transitioned, 0);

        clock.advance(ChronoDuration::hours(2));
        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.transitioned, 1);
        assert_eq!(
            store.temporary_assignments().await[0].state,
            TemporaryAssignmentState::Active
        );
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns_immediately() {
        let (scheduler, store, clock) = scheduler_with_record(TemporalSchedulerConfig {
            interval_seconds: 1,
            enabled: false,
        })
        .await;
        clock.advance(ChronoDuration::hours(2));

        scheduler.clone().start().await.unwrap();
        assert_eq!(
            store.temporary_assignments().await[0].state,
            TemporaryAssignmentState::NotProcessed
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (scheduler, store, clock) = scheduler_with_record(TemporalSchedulerConfig {
            interval_seconds: 3600,
            enabled: true,
        })
        .await;
        clock.advance(ChronoDuration::hours(2));

        let token = scheduler.shutdown_token();
        let handle = scheduler.clone().start();

        // First interval tick fires immediately
        for _ in 0..50 {
            if store.temporary_assignments().await[0].state == TemporaryAssignmentState::Active {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            store.temporary_assignments().await[0].state,
            TemporaryAssignmentState::Active
        );
    }
}
