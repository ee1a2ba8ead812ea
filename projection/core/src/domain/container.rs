// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Containers
//!
//! Groups, roles, organizations and functions share one shape (id + display
//! name) and are modelled as a tagged union keyed by [`ContainerType`]. A
//! function additionally links one role and one organization and derives its
//! display name from them.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Container value objects and per-variant conversions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::object_ident::{ObjectIdent, ObjectType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Group,
    Role,
    Organization,
    Function,
}

impl ContainerType {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ContainerType::Group => ObjectType::Group,
            ContainerType::Role => ObjectType::Role,
            ContainerType::Organization => ObjectType::Organization,
            ContainerType::Function => ObjectType::Function,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Object type '{0}' is not a container type")]
pub struct UnknownContainerType(pub ObjectType);

impl TryFrom<ObjectType> for ContainerType {
    type Error = UnknownContainerType;

    fn try_from(value: ObjectType) -> Result<Self, Self::Error> {
        match value {
            ObjectType::Group => Ok(ContainerType::Group),
            ObjectType::Role => Ok(ContainerType::Role),
            ObjectType::Organization => Ok(ContainerType::Organization),
            ObjectType::Function => Ok(ContainerType::Function),
            other => Err(UnknownContainerType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupContainer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleContainer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationContainer {
    pub id: String,
    pub name: String,
}

/// A role exercised within an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionContainer {
    pub id: String,
    pub name: String,
    pub role: RoleContainer,
    pub organization: OrganizationContainer,
}

impl FunctionContainer {
    pub fn new(
        id: impl Into<String>,
        role: RoleContainer,
        organization: OrganizationContainer,
    ) -> Self {
        let name = Self::display_name(&role, &organization);
        Self {
            id: id.into(),
            name,
            role,
            organization,
        }
    }

    pub fn display_name(role: &RoleContainer, organization: &OrganizationContainer) -> String {
        format!("{} ({})", role.name, organization.name)
    }

    /// Re-derive the display name after the linked role or organization changed
    pub fn refresh_name(&mut self) {
        self.name = Self::display_name(&self.role, &self.organization);
    }

    pub fn role_ident(&self) -> ObjectIdent {
        ObjectIdent::role(self.role.id.clone())
    }

    pub fn organization_ident(&self) -> ObjectIdent {
        ObjectIdent::organization(self.organization.id.clone())
    }
}

/// Any node a profile can be linked to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "container_type", rename_all = "snake_case")]
pub enum Container {
    Group(GroupContainer),
    Role(RoleContainer),
    Organization(OrganizationContainer),
    Function(FunctionContainer),
}

impl Container {
    pub fn id(&self) -> &str {
        match self {
            Container::Group(c) => &c.id,
            Container::Role(c) => &c.id,
            Container::Organization(c) => &c.id,
            Container::Function(c) => &c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Container::Group(c) => &c.name,
            Container::Role(c) => &c.name,
            Container::Organization(c) => &c.name,
            Container::Function(c) => &c.name,
        }
    }

    pub fn container_type(&self) -> ContainerType {
        match self {
            Container::Group(_) => ContainerType::Group,
            Container::Role(_) => ContainerType::Role,
            Container::Organization(_) => ContainerType::Organization,
            Container::Function(_) => ContainerType::Function,
        }
    }

    pub fn ident(&self) -> ObjectIdent {
        ObjectIdent::new(self.id(), self.container_type().object_type())
    }

    /// Set the display name. A function's name is always derived, so only
    /// non-function containers are renamed directly.
    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let slot = match self {
            Container::Group(c) => &mut c.name,
            Container::Role(c) => &mut c.name,
            Container::Organization(c) => &mut c.name,
            Container::Function(_) => return false,
        };
        if *slot == name {
            return false;
        }
        *slot = name;
        true
    }

    pub fn as_function(&self) -> Option<&FunctionContainer> {
        match self {
            Container::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionContainer> {
        match self {
            Container::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl From<GroupContainer> for Container {
    fn from(value: GroupContainer) -> Self {
        Container::Group(value)
    }
}

impl From<RoleContainer> for Container {
    fn from(value: RoleContainer) -> Self {
        Container::Role(value)
    }
}

impl From<OrganizationContainer> for Container {
    fn from(value: OrganizationContainer) -> Self {
        Container::Organization(value)
    }
}

impl From<FunctionContainer> for Container {
    fn from(value: FunctionContainer) -> Self {
        Container::Function(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function() -> FunctionContainer {
        FunctionContainer::new(
            "f-1",
            RoleContainer {
                id: "r-1".into(),
                name: "Editor".into(),
            },
            OrganizationContainer {
                id: "o-1".into(),
                name: "Newsroom".into(),
            },
        )
    }

    #[test]
    fn test_function_name_is_derived() {
        let f = function();
        assert_eq!(f.name, "Editor (Newsroom)");
    }

    #[test]
    fn test_function_refresh_name() {
        let mut f = function();
        f.role.name = "Chief Editor".into();
        f.refresh_name();
        assert_eq!(f.name, "Chief Editor (Newsroom)");
    }

    #[test]
    fn test_container_ident_matches_variant() {
        let c: Container = GroupContainer {
            id: "g".into(),
            name: "G".into(),
        }
        .into();
        assert_eq!(c.ident(), ObjectIdent::group("g"));
        let f: Container = function().into();
        assert_eq!(f.ident(), ObjectIdent::function("f-1"));
    }

    #[test]
    fn test_set_name_ignores_functions() {
        let mut f: Container = function().into();
        assert!(!f.set_name("other"));
        assert_eq!(f.name(), "Editor (Newsroom)");

        let mut r: Container = RoleContainer {
            id: "r".into(),
            name: "A".into(),
        }
        .into();
        assert!(r.set_name("B"));
        assert!(!r.set_name("B"));
    }

    #[test]
    fn test_container_type_from_object_type() {
        assert_eq!(ContainerType::try_from(ObjectType::Role), Ok(ContainerType::Role));
        assert_eq!(
            ContainerType::try_from(ObjectType::User),
            Err(UnknownContainerType(ObjectType::User))
        );
    }

    #[test]
    fn test_container_serialization_is_tagged() {
        let c: Container = OrganizationContainer {
            id: "o".into(),
            name: "Org".into(),
        }
        .into();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["container_type"], "organization");
        let back: Container = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
