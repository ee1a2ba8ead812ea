// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event emission port

use async_trait::async_trait;

use crate::domain::events::ProjectionEvent;

/// Transport that carries emitted events back into the pipeline.
///
/// Delivery is at-least-once; consumers must tolerate redelivery.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ProjectionEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event transport is closed")]
    Closed,
}
