// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Aggregates, value objects, events and ports of the assignments projection.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure graph model and temporal lattice; no I/O

pub mod object_ident;
pub mod condition;
pub mod container;
pub mod assignments_user;
pub mod membership;
pub mod temporary_assignment;
pub mod client_settings;
pub mod events;
pub mod clock;
pub mod repository;
pub mod publisher;
pub mod config;
