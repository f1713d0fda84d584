//! User identity and role tagging

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// A user account; the role is a tag, not a subtype
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Roles a user can hold in the chain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    InventoryCoordinator,
    Worker,
    Transporter,
    Customer,
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::InventoryCoordinator => "inventory_coordinator",
            Role::Worker => "worker",
            Role::Transporter => "transporter",
            Role::Customer => "customer",
            Role::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "inventory_coordinator" => Some(Role::InventoryCoordinator),
            "worker" => Some(Role::Worker),
            "transporter" => Some(Role::Transporter),
            "customer" => Some(Role::Customer),
            "other" => Some(Role::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::InventoryCoordinator => write!(f, "Inventory Coordinator"),
            Role::Worker => write!(f, "Worker"),
            Role::Transporter => write!(f, "Transporter"),
            Role::Customer => write!(f, "Customer"),
            Role::Other => write!(f, "Other"),
        }
    }
}

impl User {
    /// Fail unless the user carries `role`
    pub fn require_role(&self, role: Role) -> DomainResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(DomainError::invalid(format!(
                "User {} must be a {}, found {}",
                self.username, role, self.role
            )))
        }
    }
}

/// Role-scoped view over a set of users
pub fn users_with_role<'a>(
    users: impl IntoIterator<Item = &'a User>,
    role: Role,
) -> impl Iterator<Item = &'a User> {
    users.into_iter().filter(move |user| user.role == role)
}
