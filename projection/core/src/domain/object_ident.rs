// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Graph node identity
//!
//! Every node of a profile's assignment graph (the profile itself, or any
//! container it is linked to) is addressed by an [`ObjectIdent`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of object a node identifier points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    User,
    Group,
    Organization,
    Role,
    Function,
    Profile,
    Unknown,
}

impl ObjectType {
    /// Whether this type owns an `AssignmentsUser` projection
    pub fn is_user_profile(&self) -> bool {
        matches!(self, ObjectType::User)
    }

    /// Whether this type can be the parent side of an assignment
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ObjectType::Group | ObjectType::Organization | ObjectType::Role | ObjectType::Function
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::User => "user",
            ObjectType::Group => "group",
            ObjectType::Organization => "organization",
            ObjectType::Role => "role",
            ObjectType::Function => "function",
            ObjectType::Profile => "profile",
            ObjectType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of any node in the graph.
///
/// Ordering compares the id first and the type second, so sets of identifiers
/// iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectIdent {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
}

impl ObjectIdent {
    pub fn new(id: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            id: id.into(),
            object_type,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, ObjectType::User)
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(id, ObjectType::Group)
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::new(id, ObjectType::Role)
    }

    pub fn organization(id: impl Into<String>) -> Self {
        Self::new(id, ObjectType::Organization)
    }

    pub fn function(id: impl Into<String>) -> Self {
        Self::new(id, ObjectType::Function)
    }
}

impl fmt::Display for ObjectIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_ordering_compares_id_before_type() {
        let a = ObjectIdent::new("a", ObjectType::Role);
        let b = ObjectIdent::new("b", ObjectType::User);
        let a_group = ObjectIdent::new("a", ObjectType::Group);

        assert!(a < b);
        assert!(a_group < a);

        let set: BTreeSet<_> = [b.clone(), a.clone(), a_group.clone()].into_iter().collect();
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(ordered, vec![a_group, a, b]);
    }

    #[test]
    fn test_container_classification() {
        assert!(ObjectType::Function.is_container());
        assert!(!ObjectType::User.is_container());
        assert!(!ObjectType::Unknown.is_container());
        assert!(ObjectType::User.is_user_profile());
        assert!(!ObjectType::Profile.is_user_profile());
    }

    #[test]
    fn test_serialization_uses_type_field() {
        let ident = ObjectIdent::group("g-1");
        let json = serde_json::to_value(&ident).unwrap();
        assert_eq!(json, serde_json::json!({"id": "g-1", "type": "group"}));
    }
}
