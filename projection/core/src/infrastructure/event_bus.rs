// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Projection Events
//
// Observers (CLI, tests) get every event through a tokio broadcast channel;
// a slow observer lags and loses events.
//
// Condition triggers additionally go to trigger consumers over bounded mpsc
// queues. Publishing a trigger waits for queue space, so a consumer never
// loses one. Publishers must not hold resources the consumer needs.
//
// In-memory only: events are lost on restart.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::domain::events::{AssignmentConditionTriggered, ProjectionEvent};
use crate::domain::publisher::{EventPublisher, PublishError};

/// Event bus for publishing and subscribing to projection events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ProjectionEvent>>,
    trigger_consumers: Arc<Mutex<Vec<mpsc::Sender<AssignmentConditionTriggered>>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before slow
    /// observers start lagging and trigger publishers start waiting.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
            trigger_consumers: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers. Returns how many received it.
    pub async fn publish_event(&self, event: ProjectionEvent) -> usize {
        debug!(
            event_type = event.event_type(),
            profile_id = %event.profile_id(),
            "Publishing event"
        );

        let mut delivered = 0;
        if let ProjectionEvent::AssignmentConditionTriggered(trigger) = &event {
            delivered += self.deliver_trigger(trigger).await;
        }

        delivered += self.sender.send(event).unwrap_or(0);
        if delivered == 0 {
            debug!("No subscribers listening to event");
        }
        delivered
    }

    /// Hand a trigger to every trigger consumer, waiting for queue space.
    /// Consumers whose receiver is gone are unregistered.
    async fn deliver_trigger(&self, trigger: &AssignmentConditionTriggered) -> usize {
        let consumers: Vec<_> = self.trigger_consumers.lock().clone();

        let mut delivered = 0;
        for consumer in &consumers {
            if consumer.send(trigger.clone()).await.is_ok() {
                delivered += 1;
            }
        }

        if delivered < consumers.len() {
            self.trigger_consumers.lock().retain(|consumer| !consumer.is_closed());
        }
        delivered
    }

    /// Subscribe to all projection events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Register a trigger consumer. Every trigger published from now on is
    /// queued for it until the returned receiver is dropped.
    pub fn subscribe_triggers(&self) -> TriggerReceiver {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.trigger_consumers.lock().push(sender);
        TriggerReceiver { receiver }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        let consumers = self
            .trigger_consumers
            .lock()
            .iter()
            .filter(|consumer| !consumer.is_closed())
            .count();
        self.sender.receiver_count() + consumers
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: ProjectionEvent) -> Result<(), PublishError> {
        self.publish_event(event).await;
        Ok(())
    }
}

/// Receiver for all projection events
pub struct EventReceiver {
    receiver: broadcast::Receiver<ProjectionEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<ProjectionEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<ProjectionEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered
    pub fn drain(&mut self) -> Vec<ProjectionEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(EventBusError::Empty | EventBusError::Closed) => break,
            }
        }
        events
    }
}

/// Lossless queue of `AssignmentConditionTriggered` events
pub struct TriggerReceiver {
    receiver: mpsc::Receiver<AssignmentConditionTriggered>,
}

impl TriggerReceiver {
    /// Receive the next trigger. Fails only once the bus is gone and the
    /// queue is empty.
    pub async fn recv(&mut self) -> Result<AssignmentConditionTriggered, EventBusError> {
        self.receiver.recv().await.ok_or(EventBusError::Closed)
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object_ident::ObjectType;
    use serde_json::json;

    fn trigger(profile_id: &str) -> AssignmentConditionTriggered {
        AssignmentConditionTriggered {
            profile_id: profile_id.to_string(),
            profile_type: ObjectType::User,
            target_id: "g-1".to_string(),
            target_object_type: ObjectType::Group,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus
            .publish(ProjectionEvent::AssignmentConditionTriggered(trigger("u-1")))
            .await
            .unwrap();

        match receiver.recv().await.unwrap() {
            ProjectionEvent::AssignmentConditionTriggered(t) => assert_eq!(t.profile_id, "u-1"),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trigger_receiver_filters_other_events() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_triggers();

        event_bus
            .publish_event(ProjectionEvent::ClientSettingsCalculated {
                profile_id: "u-1".to_string(),
                key: "ui".to_string(),
                calculated_settings: json!({"theme": "dark"}),
            })
            .await;
        event_bus
            .publish_event(ProjectionEvent::AssignmentConditionTriggered(trigger("u-2")))
            .await;

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.profile_id, "u-2");
    }

    #[tokio::test]
    async fn test_trigger_queue_keeps_every_trigger_beyond_capacity() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe_triggers();

        let publisher = event_bus.clone();
        let publishing = tokio::spawn(async move {
            for i in 0..10 {
                let event =
                    ProjectionEvent::AssignmentConditionTriggered(trigger(&format!("u-{i}")));
                publisher.publish_event(event).await;
            }
        });

        let mut received = Vec::new();
        for _ in 0..10 {
            received.push(receiver.recv().await.unwrap().profile_id);
        }
        publishing.await.unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("u-{i}")).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_dropped_trigger_consumer_is_unregistered() {
        let event_bus = EventBus::new(1);
        let receiver = event_bus.subscribe_triggers();
        assert_eq!(event_bus.subscriber_count(), 1);
        drop(receiver);

        for i in 0..3 {
            let event = ProjectionEvent::AssignmentConditionTriggered(trigger(&format!("u-{i}")));
            assert_eq!(event_bus.publish_event(event).await, 0);
        }
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);
        let delivered = event_bus
            .publish_event(ProjectionEvent::ClientSettingsInvalidated {
                profile_id: "u-1".to_string(),
                keys: vec!["ui".to_string()],
            })
            .await;
        assert_eq!(delivered, 2);

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let event_bus = EventBus::default();
        let event = ProjectionEvent::AssignmentConditionTriggered(trigger("u"));
        assert_eq!(event_bus.publish_event(event).await, 0);
    }

    #[tokio::test]
    async fn test_drain_and_lag() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();
        for i in 0..3 {
            let event = ProjectionEvent::AssignmentConditionTriggered(trigger(&format!("u-{i}")));
            event_bus.publish_event(event).await;
        }

        let drained = receiver.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].profile_id(), "u-1");
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
