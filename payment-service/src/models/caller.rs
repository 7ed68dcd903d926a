//! Caller identity: who is making the request, with what role, scoped to
//! which school.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Parent,
    Staff,
    SchoolAdmin,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Staff => "staff",
            Role::SchoolAdmin => "school_admin",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            "staff" => Some(Role::Staff),
            "school_admin" => Some(Role::SchoolAdmin),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Global admin tiers can act across schools.
    pub fn is_global_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// School-scoped operational roles.
    pub fn is_school_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::SchoolAdmin)
    }
}

/// Authenticated caller, resolved upstream and carried on trusted headers.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    /// Tenant scope; present for school-scoped roles.
    pub school_id: Option<Uuid>,
}
