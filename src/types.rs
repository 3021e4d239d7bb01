/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three entity kinds a workboard can report over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Deals,
    Contacts,
    Companies,
}

impl EntityKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deals" => Some(EntityKind::Deals),
            "contacts" => Some(EntityKind::Contacts),
            "companies" => Some(EntityKind::Companies),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Deals => "deals",
            EntityKind::Contacts => "contacts",
            EntityKind::Companies => "companies",
        }
    }

    /// Base table name. Always emitted through identifier quoting.
    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }
}

/// Every resource kind the access policy knows about. Activities and tasks
/// are not workboard entities but inherit visibility from their parent deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Deal,
    Contact,
    Company,
    Activity,
    Task,
}

impl ResourceKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            ResourceKind::Deal => "deals",
            ResourceKind::Contact => "contacts",
            ResourceKind::Company => "companies",
            ResourceKind::Activity => "activities",
            ResourceKind::Task => "tasks",
        }
    }
}

impl From<EntityKind> for ResourceKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Deals => ResourceKind::Deal,
            EntityKind::Contacts => ResourceKind::Contact,
            EntityKind::Companies => ResourceKind::Company,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    /// Claims carry the role as an open string; anything that is not
    /// exactly "admin" is a regular member.
    pub fn parse(s: &str) -> Self {
        if s == "admin" {
            Role::Admin
        } else {
            Role::Member
        }
    }
}

/// Requesting principal, supplied per request by the auth middleware.
/// Never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}
