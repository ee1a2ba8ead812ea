// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Assignments projection core
//!
//! Maintains, per user profile, a time-aware graph of container memberships
//! and keeps it current as temporary assignments enter and leave their
//! validity windows.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Wires the domain model, the application services and the
//!   in-memory infrastructure

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
