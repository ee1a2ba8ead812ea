// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Event handlers, temporal reconciliation and the background
//!   tasks that drive them

pub mod assignment_projection;
pub mod temporal_state_machine;
pub mod temporal_scheduler;
pub mod trigger_dispatcher;

pub use assignment_projection::{AssignmentProjectionService, ProjectionError};
pub use temporal_scheduler::{TemporalScheduler, TemporalSchedulerConfig};
pub use temporal_state_machine::{TemporalError, TemporalStateMachine, TickReport};
pub use trigger_dispatcher::TriggerDispatcher;
