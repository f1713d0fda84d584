//! Common types used across the supply chain

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock and recipe quantities
pub type Quantity = Decimal;

/// Unit of measure for materials and lots
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    #[serde(rename = "l")]
    Liter,
    #[default]
    #[serde(rename = "pc")]
    Piece,
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "ml")]
    Milliliter,
    Box,
    Packet,
    Bottle,
    Other,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Liter => "l",
            Unit::Piece => "pc",
            Unit::Meter => "m",
            Unit::Gram => "g",
            Unit::Milliliter => "ml",
            Unit::Box => "box",
            Unit::Packet => "packet",
            Unit::Bottle => "bottle",
            Unit::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kg" => Some(Unit::Kg),
            "l" => Some(Unit::Liter),
            "pc" => Some(Unit::Piece),
            "m" => Some(Unit::Meter),
            "g" => Some(Unit::Gram),
            "ml" => Some(Unit::Milliliter),
            "box" => Some(Unit::Box),
            "packet" => Some(Unit::Packet),
            "bottle" => Some(Unit::Bottle),
            "other" => Some(Unit::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a human readable reference: PREFIX-YYYYMMDD-HHMMSS-UUID
pub fn generate_reference(prefix: &str, at: DateTime<Utc>, id: Uuid) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        at.format("%Y%m%d-%H%M%S"),
        id.to_string().to_uppercase()
    )
}
