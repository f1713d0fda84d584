//! Consumption records: the audit ledger of draws from stock lots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Quantity;

/// A recorded draw of `quantity` from one lot by one consumer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionRecord {
    pub id: Uuid,
    pub consumer: Consumer,
    /// Weak reference: many records may point at the same lot
    pub lot_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Quantity,
    pub consumed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// What drew the quantity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Consumer {
    OrderItem { order_item_id: Uuid },
    Workstation { workstation_id: Uuid, worker_id: Uuid },
    Packaging { coordinator_id: Uuid },
    Delivery { restaurant_id: Uuid, transporter_id: Uuid },
}

impl Consumer {
    pub fn kind(&self) -> &'static str {
        match self {
            Consumer::OrderItem { .. } => "order_item",
            Consumer::Workstation { .. } => "workstation",
            Consumer::Packaging { .. } => "packaging",
            Consumer::Delivery { .. } => "delivery",
        }
    }

    pub fn order_item_id(&self) -> Option<Uuid> {
        match self {
            Consumer::OrderItem { order_item_id } => Some(*order_item_id),
            _ => None,
        }
    }
}

impl ConsumptionRecord {
    pub fn is_for_item(&self, order_item_id: Uuid) -> bool {
        self.consumer.order_item_id() == Some(order_item_id)
    }
}
