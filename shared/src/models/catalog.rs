//! Materials, products and recipe lines

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Quantity, Unit};

/// A material tracked through every stage of the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub unit: Unit,
}

/// A product sold by restaurants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub selling_price: Decimal,
    pub is_available: bool,
}

/// One ingredient line of a product recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeLine {
    pub product_id: Uuid,
    pub material_id: Uuid,
    /// Quantity consumed per unit of product, always positive
    pub quantity_per_unit: Quantity,
    pub notes: Option<String>,
}
