// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Membership closure over a profile's assignment graph
//!
//! Two traversals share one breadth-first walk starting at the profile node:
//!
//! - [`calculate_active_memberships`] only follows edges with at least one
//!   condition active at the evaluation instant.
//! - [`connected_containers`] follows every edge regardless of time and is
//!   used to garbage-collect containers the profile can no longer reach.
//!
//! Both walks keep an explicit visited set, so a cyclic container graph
//! terminates.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::warn;

use crate::domain::assignments_user::{Assignment, AssignmentKey, AssignmentsUser};
use crate::domain::object_ident::ObjectIdent;

/// Containers and edges dropped by a prune pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub removed_containers: Vec<ObjectIdent>,
    pub removed_assignments: Vec<AssignmentKey>,
}

impl PruneOutcome {
    pub fn is_empty(&self) -> bool {
        self.removed_containers.is_empty() && self.removed_assignments.is_empty()
    }
}

/// Current active closure of the profile at `now`
pub fn calculate_active_memberships(
    user: &AssignmentsUser,
    now: DateTime<Utc>,
) -> BTreeSet<ObjectIdent> {
    walk(user, |edge| edge.is_active_at(now))
}

/// Every parent reachable from the profile, ignoring time conditions
pub fn connected_containers(user: &AssignmentsUser) -> BTreeSet<ObjectIdent> {
    walk(user, |_| true)
}

fn walk<F>(user: &AssignmentsUser, traversable: F) -> BTreeSet<ObjectIdent>
where
    F: Fn(&Assignment) -> bool,
{
    let mut edges_by_child: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for edge in user.assignments() {
        edges_by_child.entry(edge.profile.id.as_str()).or_default().push(edge);
    }

    let profile_id = user.profile_id();
    let mut reached = BTreeSet::new();
    let mut visited: HashSet<&str> = HashSet::from([profile_id]);
    let mut queue: VecDeque<&str> = VecDeque::from([profile_id]);

    while let Some(node) = queue.pop_front() {
        let Some(edges) = edges_by_child.get(node) else {
            continue;
        };

        for edge in edges.iter().filter(|edge| traversable(edge)) {
            let parent = edge.parent.id.as_str();
            if parent == profile_id || !visited.insert(parent) {
                continue;
            }
            reached.insert(edge.parent.clone());

            if user.has_container(parent) {
                queue.push_back(parent);
            } else {
                warn!(
                    profile_id = %profile_id,
                    container = %edge.parent,
                    "Assignment references a container missing from the aggregate"
                );
            }
        }
    }

    reached
}
