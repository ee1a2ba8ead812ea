// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Validity windows attached to assignment edges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One validity interval of an assignment edge.
///
/// A missing `start` means "valid since always", a missing `end` means
/// "valid forever after start". Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct RangeCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl RangeCondition {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// The unbounded condition used when an edge carries no conditions
    pub fn always() -> Self {
        Self::default()
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self::new(Some(start), None)
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| start <= at) && self.end.is_none_or(|end| end >= at)
    }
}

/// Normalized, deduplicated condition set of one edge. Never empty.
pub type ConditionSet = BTreeSet<RangeCondition>;

/// Collapse duplicates and apply the default-condition rule
pub fn normalize_conditions<I>(conditions: I) -> ConditionSet
where
    I: IntoIterator<Item = RangeCondition>,
{
    let mut set: ConditionSet = conditions.into_iter().collect();
    if set.is_empty() {
        set.insert(RangeCondition::always());
    }
    set
}

/// OR-semantics: active when any condition covers `at`
pub fn any_active<'a, I>(conditions: I, at: DateTime<Utc>) -> bool
where
    I: IntoIterator<Item = &'a RangeCondition>,
{
    conditions.into_iter().any(|c| c.is_active_at(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_unbounded_condition_is_always_active() {
        let now = Utc::now();
        let condition = RangeCondition::always();
        assert!(condition.is_active_at(now));
        assert!(condition.is_active_at(now - Duration::days(10_000)));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let now = Utc::now();
        let condition = RangeCondition::between(now, now + Duration::hours(1));
        assert!(condition.is_active_at(now));
        assert!(condition.is_active_at(now + Duration::hours(1)));
        assert!(!condition.is_active_at(now - Duration::seconds(1)));
        assert!(!condition.is_active_at(now + Duration::hours(1) + Duration::seconds(1)));
    }

    #[test]
    fn test_any_active_uses_or_semantics() {
        let now = Utc::now();
        let past = RangeCondition::between(now - Duration::days(2), now - Duration::days(1));
        let future = RangeCondition::starting_at(now + Duration::days(1));
        assert!(!any_active([past, future].iter(), now));

        let current = RangeCondition::new(None, Some(now + Duration::minutes(5)));
        assert!(any_active([past, future, current].iter(), now));
    }

    #[test]
    fn test_any_active_on_empty_set_is_false() {
        let empty: Vec<RangeCondition> = Vec::new();
        assert!(!any_active(empty.iter(), Utc::now()));
    }

    #[test]
    fn test_normalize_replaces_empty_with_always() {
        let set = normalize_conditions(Vec::new());
        assert_eq!(set.len(), 1);
        assert!(set.iter().all(RangeCondition::is_unbounded));
    }

    #[test]
    fn test_normalize_collapses_duplicates() {
        let now = Utc::now();
        let c = RangeCondition::starting_at(now);
        let set = normalize_conditions(vec![c, c, RangeCondition::always()]);
        assert_eq!(set.len(), 2);
    }
}
