// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use assignments_core::application::{
    AssignmentProjectionService, TemporalScheduler, TemporalSchedulerConfig, TemporalStateMachine,
    TriggerDispatcher,
};
use assignments_core::domain::clock::{Clock, FixedClock};
use assignments_core::domain::condition::RangeCondition;
use assignments_core::domain::container::GroupContainer;
use assignments_core::domain::events::{
    AssignmentEvent, EventContext, EventEnvelope, ProjectionEvent,
};
use assignments_core::domain::object_ident::ObjectIdent;
use assignments_core::domain::temporary_assignment::{TemporaryAssignment, TemporaryAssignmentState};
use assignments_core::infrastructure::event_bus::EventBus;
use assignments_core::infrastructure::repositories::InMemoryAssignmentStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

struct Pipeline {
    store: InMemoryAssignmentStore,
    clock: Arc<FixedClock>,
    bus: Arc<EventBus>,
    projection: Arc<AssignmentProjectionService>,
    scheduler: Arc<TemporalScheduler>,
}

impl Pipeline {
    fn new(start: DateTime<Utc>) -> Self {
        Self::with_bus_capacity(start, 64)
    }

    fn with_bus_capacity(start: DateTime<Utc>, capacity: usize) -> Self {
        let store = InMemoryAssignmentStore::new();
        let clock = Arc::new(FixedClock::new(start));
        let bus = Arc::new(EventBus::new(capacity));
        let projection = Arc::new(AssignmentProjectionService::new(
            Arc::new(store.clone()),
            clock.clone(),
        ));
        let machine = Arc::new(TemporalStateMachine::new(Arc::new(store.clone()), bus.clone()));
        let scheduler = Arc::new(TemporalScheduler::new(
            machine,
            clock.clone(),
            TemporalSchedulerConfig::default(),
        ));
        Self {
            store,
            clock,
            bus,
            projection,
            scheduler,
        }
    }

    async fn on_user(&self, user_id: &str, event: AssignmentEvent) {
        self.projection
            .handle(&EventContext::new(ObjectIdent::user(user_id)), &event)
            .await
            .unwrap();
    }
}

fn to_group(
    child: ObjectIdent,
    group_id: &str,
    conditions: Vec<RangeCondition>,
) -> AssignmentEvent {
    AssignmentEvent::AssignedToGroup {
        profile: child,
        target: GroupContainer {
            id: group_id.to_string(),
            name: group_id.to_uppercase(),
        },
        conditions,
    }
}

#[tokio::test]
async fn test_temporary_group_nesting_reaches_user_after_tick() {
    let now = Utc::now();
    let pipeline = Pipeline::new(now - Duration::hours(2));

    pipeline
        .on_user(
            "u",
            AssignmentEvent::ProfileCreated {
                profile_id: "u".into(),
            },
        )
        .await;
    pipeline.on_user("u", to_group(ObjectIdent::user("u"), "g1", vec![])).await;
    pipeline
        .on_user(
            "u",
            to_group(
                ObjectIdent::group("g1"),
                "g2",
                vec![RangeCondition::starting_at(now - Duration::hours(1))],
            ),
        )
        .await;

    let user = pipeline.store.assignment_user("u").await.unwrap().unwrap();
    assert!(user.active_memberships().contains(&ObjectIdent::group("g1")));
    assert!(!user.active_memberships().contains(&ObjectIdent::group("g2")));

    pipeline
        .store
        .insert_temporary_assignment(TemporaryAssignment::new(
            ObjectIdent::group("g1"),
            ObjectIdent::group("g2"),
            Some(now - Duration::hours(1)),
            None,
            pipeline.clock.now(),
        ))
        .await;
    pipeline.store.add_child(ObjectIdent::group("g2"), ObjectIdent::group("g1")).await;
    pipeline.store.add_child(ObjectIdent::group("g1"), ObjectIdent::user("u")).await;

    let dispatcher = Arc::new(TriggerDispatcher::new(
        pipeline.projection.clone(),
        pipeline.bus.clone(),
    ));
    let shutdown = dispatcher.shutdown_token();
    let dispatch_task = dispatcher.start();

    pipeline.clock.set(now);
    let report = pipeline.scheduler.run_once().await.unwrap();
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.emitted, 3);

    shutdown.cancel();
    dispatch_task.await.unwrap();

    let user = pipeline.store.assignment_user("u").await.unwrap().unwrap();
    assert!(user.active_memberships().contains(&ObjectIdent::group("g1")));
    assert!(user.active_memberships().contains(&ObjectIdent::group("g2")));

    let record = &pipeline.store.temporary_assignments().await[0];
    assert_eq!(record.state, TemporaryAssignmentState::Active);
}

#[tokio::test]
async fn test_expiry_removes_membership_after_tick() {
    let now = Utc::now();
    let pipeline = Pipeline::new(now);
    let window = RangeCondition::between(now - Duration::hours(1), now + Duration::hours(1));

    pipeline
        .on_user(
            "u",
            AssignmentEvent::ProfileCreated {
                profile_id: "u".into(),
            },
        )
        .await;
    pipeline
        .on_user("u", to_group(ObjectIdent::user("u"), "g1", vec![window]))
        .await;
    pipeline
        .store
        .insert_temporary_assignment(TemporaryAssignment::new(
            ObjectIdent::user("u"),
            ObjectIdent::group("g1"),
            window.start,
            window.end,
            now,
        ))
        .await;

    let mut events = pipeline.bus.subscribe();
    let dispatcher = Arc::new(TriggerDispatcher::new(
        pipeline.projection.clone(),
        pipeline.bus.clone(),
    ));
    let shutdown = dispatcher.shutdown_token();
    let dispatch_task = dispatcher.start();

    pipeline.scheduler.run_once().await.unwrap();
    pipeline.clock.advance(Duration::hours(2));
    let report = pipeline.scheduler.run_once().await.unwrap();
    assert_eq!(report.transitioned, 1);

    shutdown.cancel();
    dispatch_task.await.unwrap();

    let user = pipeline.store.assignment_user("u").await.unwrap().unwrap();
    assert!(user.active_memberships().is_empty());
    // Expired edges stay in the graph; only unassignment removes them
    assert!(user.has_container("g1"));

    let deactivations = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ProjectionEvent::AssignmentConditionTriggered(t) if !t.is_active))
        .count();
    assert_eq!(deactivations, 2);
}

#[tokio::test]
async fn test_every_descendant_is_recomputed_when_triggers_exceed_bus_capacity() {
    let t0 = Utc::now();
    let pipeline = Pipeline::with_bus_capacity(t0, 4);
    let users: Vec<String> = (0..10).map(|i| format!("u{i}")).collect();
    let starts = vec![RangeCondition::starting_at(t0 + Duration::minutes(30))];

    for user in &users {
        pipeline
            .on_user(
                user,
                AssignmentEvent::ProfileCreated {
                    profile_id: user.clone(),
                },
            )
            .await;
        pipeline
            .on_user(user, to_group(ObjectIdent::user(user.as_str()), "g1", starts.clone()))
            .await;
        pipeline
            .store
            .add_child(ObjectIdent::group("g1"), ObjectIdent::user(user.as_str()))
            .await;
    }
    pipeline
        .store
        .insert_temporary_assignment(TemporaryAssignment::new(
            ObjectIdent::user("u0"),
            ObjectIdent::group("g1"),
            Some(t0 + Duration::minutes(30)),
            None,
            t0,
        ))
        .await;

    let dispatcher = Arc::new(TriggerDispatcher::new(
        pipeline.projection.clone(),
        pipeline.bus.clone(),
    ));
    let shutdown = dispatcher.shutdown_token();
    let dispatch_task = dispatcher.start();

    pipeline.clock.set(t0 + Duration::hours(1));
    let report = pipeline.scheduler.run_once().await.unwrap();
    assert_eq!(report.transitioned, 1);
    // g1 and its ten users; the profile u0 is already part of the subtree
    assert_eq!(report.emitted, 11);

    shutdown.cancel();
    dispatch_task.await.unwrap();

    let mut stale = Vec::new();
    for user in &users {
        let aggregate = pipeline.store.assignment_user(user).await.unwrap().unwrap();
        if !aggregate.active_memberships().contains(&ObjectIdent::group("g1")) {
            stale.push(user.clone());
        }
    }
    assert!(stale.is_empty(), "users not recomputed after the tick: {:?}", stale);
}

#[test]
fn test_stream_dump_replay_is_idempotent() {
    let dump = r#"
{"context":{"related_entity":{"id":"u","type":"user"}},"event":{"type":"profile_created","profile_id":"u"}}
{"context":{"related_entity":{"id":"u","type":"user"}},"event":{"type":"assigned_to_group","profile":{"id":"u","type":"user"},"target":{"id":"g1","name":"Editors"}}}
{"context":{"related_entity":{"id":"u","type":"user"}},"event":{"type":"assigned_to_role","profile":{"id":"g1","type":"group"},"target":{"id":"r1","name":"Publisher"}}}
{"context":{"related_entity":{"id":"g1","type":"group"}},"event":{"type":"container_deleted","container_id":"r1"}}
"#;
    let envelopes: Vec<EventEnvelope> = dump
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let pipeline = Pipeline::new(Utc::now());
    tokio_test::block_on(async {
        for _ in 0..2 {
            for envelope in &envelopes {
                pipeline
                    .projection
                    .handle(&envelope.context, &envelope.event)
                    .await
                    .unwrap();
            }
        }

        let user = pipeline.store.assignment_user("u").await.unwrap().unwrap();
        assert_eq!(user.assignments().count(), 2);
        assert!(user.assignments().all(|a| a.conditions.len() == 1));
        assert_eq!(
            user.active_memberships().iter().cloned().collect::<Vec<_>>(),
            vec![ObjectIdent::group("g1"), ObjectIdent::role("r1")]
        );
    });
}
