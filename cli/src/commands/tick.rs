// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `assignments tick` - replay a stream dump and run one temporal tick
//!
//! Prints the resulting aggregates and temporary assignments as JSON on
//! stdout; logs go to stderr.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use assignments_core::application::{
    AssignmentProjectionService, TemporalScheduler, TemporalSchedulerConfig, TemporalStateMachine,
    TickReport, TriggerDispatcher,
};
use assignments_core::domain::assignments_user::AssignmentsUser;
use assignments_core::domain::clock::FixedClock;
use assignments_core::domain::config::ProjectionConfig;
use assignments_core::domain::temporary_assignment::TemporaryAssignment;
use assignments_core::infrastructure::event_bus::EventBus;
use assignments_core::infrastructure::repositories::InMemoryAssignmentStore;

use crate::replay::{self, ReplaySummary};

#[derive(Args, Debug)]
pub struct TickArgs {
    /// NDJSON stream dump to replay
    #[arg(long, value_name = "FILE")]
    pub events: PathBuf,

    /// YAML list of temporary assignments
    #[arg(long, value_name = "FILE")]
    pub temporary: Option<PathBuf>,

    /// Instant to evaluate at (RFC 3339); defaults to now
    #[arg(long, value_name = "TIME")]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TickOutput {
    pub evaluated_at: DateTime<Utc>,
    pub report: TickReport,
    pub replayed_events: usize,
    pub failed_events: usize,
    pub temporary_assignments: Vec<TemporaryAssignment>,
    pub assignments_users: Vec<AssignmentsUser>,
}

pub async fn execute(args: TickArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config =
        ProjectionConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let output = run_tick(&args, &config).await?;
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize tick output")?;
    println!("{}", json);
    Ok(())
}

pub async fn run_tick(args: &TickArgs, config: &ProjectionConfig) -> Result<TickOutput> {
    let evaluated_at = args.at.unwrap_or_else(Utc::now);
    let envelopes = replay::load_envelopes(&args.events)?;
    let temporary = match &args.temporary {
        Some(path) => replay::load_temporary_assignments(path)?,
        None => Vec::new(),
    };

    let store = InMemoryAssignmentStore::new();
    let clock = Arc::new(FixedClock::new(evaluated_at));
    let event_bus = Arc::new(EventBus::new(config.spec.event_bus.capacity));
    let projection = Arc::new(AssignmentProjectionService::new(
        Arc::new(store.clone()),
        clock.clone(),
    ));

    let ReplaySummary { applied, failed } = replay::replay(&projection, &store, &envelopes).await;
    for record in temporary {
        store.insert_temporary_assignment(record).await;
    }

    let dispatcher = Arc::new(TriggerDispatcher::new(projection, event_bus.clone()));
    let dispatcher_token = dispatcher.shutdown_token();
    let dispatcher_handle = dispatcher.start();

    let state_machine = Arc::new(TemporalStateMachine::new(Arc::new(store.clone()), event_bus));
    let scheduler = TemporalScheduler::new(
        state_machine,
        clock,
        TemporalSchedulerConfig::from(&config.spec.temporal),
    );
    let report = scheduler.run_once().await?;
    info!(
        examined = report.examined,
        transitioned = report.transitioned,
        quarantined = report.quarantined,
        emitted = report.emitted,
        "Tick finished"
    );

    // Buffered triggers are drained before the dispatcher honours the token
    dispatcher_token.cancel();
    dispatcher_handle.await.context("Trigger dispatcher task failed")?;

    Ok(TickOutput {
        evaluated_at,
        report,
        replayed_events: applied,
        failed_events: failed,
        temporary_assignments: store.temporary_assignments().await,
        assignments_users: store.assignment_users().await?,
    })
}
