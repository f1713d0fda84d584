//! Suppliers, workstations and restaurants

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_info: Option<String>,
}

/// A preparation workstation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workstation {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub max_daily_capacity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub location: String,
}
