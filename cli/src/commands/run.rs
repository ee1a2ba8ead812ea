// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `assignments run` - long-running projection host

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use assignments_core::application::{
    AssignmentProjectionService, TemporalScheduler, TemporalSchedulerConfig, TemporalStateMachine,
    TriggerDispatcher,
};
use assignments_core::domain::clock::{Clock, SystemClock};
use assignments_core::domain::config::ProjectionConfig;
use assignments_core::infrastructure::event_bus::EventBus;
use assignments_core::infrastructure::repositories::InMemoryAssignmentStore;

use crate::replay;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// NDJSON stream dump to replay before starting
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config =
        ProjectionConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    info!(name = %config.metadata.name, "Starting assignments projection");

    let store = InMemoryAssignmentStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_bus = Arc::new(EventBus::new(config.spec.event_bus.capacity));
    let projection = Arc::new(AssignmentProjectionService::new(
        Arc::new(store.clone()),
        clock.clone(),
    ));

    if let Some(path) = &args.events {
        let envelopes = replay::load_envelopes(path)?;
        replay::replay(&projection, &store, &envelopes).await;
    }

    let dispatcher = Arc::new(TriggerDispatcher::new(projection, event_bus.clone()));
    let dispatcher_token = dispatcher.shutdown_token();
    let dispatcher_handle = dispatcher.start();

    let state_machine = Arc::new(TemporalStateMachine::new(Arc::new(store.clone()), event_bus));
    let scheduler = Arc::new(TemporalScheduler::new(
        state_machine,
        clock,
        TemporalSchedulerConfig::from(&config.spec.temporal),
    ));
    let scheduler_token = scheduler.shutdown_token();
    let scheduler_handle = scheduler.start();

    shutdown_signal().await;

    scheduler_token.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Temporal scheduler task failed: {}", e);
    }
    dispatcher_token.cancel();
    if let Err(e) = dispatcher_handle.await {
        error!("Trigger dispatcher task failed: {}", e);
    }

    let users = store.assignment_users().await?;
    info!(profiles = users.len(), "Assignments projection stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
