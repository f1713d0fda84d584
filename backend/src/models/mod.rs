//! Database rows for the supply chain ledger
//!
//! Re-exports models from the shared crate and adds the row types used to
//! read them back out of PostgreSQL. Enums are stored as their `as_str` codes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

pub use shared::models::*;
use shared::Unit;

use crate::error::{AppError, AppResult};

fn parse<T>(value: &str, what: &str, parsed: Option<T>) -> AppResult<T> {
    parsed.ok_or_else(|| AppError::DataIntegrity(format!("Unknown {} '{}'", what, value)))
}

fn non_negative(value: i32, what: &str) -> AppResult<u32> {
    u32::try_from(value).map_err(|_| AppError::DataIntegrity(format!("Negative {} {}", what, value)))
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            role: parse(&row.role, "role", Role::from_str(&row.role))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SupplierRow {
    pub id: Uuid,
    pub name: String,
    pub contact_info: Option<String>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            name: row.name,
            contact_info: row.contact_info,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct WorkstationRow {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub max_daily_capacity: Option<i32>,
}

impl TryFrom<WorkstationRow> for Workstation {
    type Error = AppError;

    fn try_from(row: WorkstationRow) -> AppResult<Self> {
        Ok(Workstation {
            id: row.id,
            name: row.name,
            location: row.location,
            max_daily_capacity: row
                .max_daily_capacity
                .map(|capacity| non_negative(capacity, "capacity"))
                .transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RestaurantRow {
    pub id: Uuid,
    pub name: String,
    pub location: String,
}

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        Restaurant {
            id: row.id,
            name: row.name,
            location: row.location,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct MaterialRow {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
}

impl TryFrom<MaterialRow> for Material {
    type Error = AppError;

    fn try_from(row: MaterialRow) -> AppResult<Self> {
        Ok(Material {
            id: row.id,
            name: row.name,
            unit: parse(&row.unit, "unit", Unit::from_str(&row.unit))?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub selling_price: Decimal,
    pub is_available: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            selling_price: row.selling_price,
            is_available: row.is_available,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RecipeLineRow {
    pub product_id: Uuid,
    pub material_id: Uuid,
    pub quantity_per_unit: Decimal,
    pub notes: Option<String>,
}

impl From<RecipeLineRow> for RecipeLine {
    fn from(row: RecipeLineRow) -> Self {
        RecipeLine {
            product_id: row.product_id,
            material_id: row.material_id,
            quantity_per_unit: row.quantity_per_unit,
            notes: row.notes,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StockLotRow {
    pub id: Uuid,
    pub stage: String,
    pub material_id: Uuid,
    pub owner_id: Uuid,
    pub source_kind: String,
    pub source_id: Uuid,
    pub initial_quantity: Decimal,
    pub current_quantity: Decimal,
    pub unit: String,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub finished_at: Option<DateTime<Utc>>,
    pub storage_location: Option<String>,
    pub quality_score: Option<i16>,
    pub quality_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Column list matching [`StockLotRow`]
pub const STOCK_LOT_COLUMNS: &str = "id, stage, material_id, owner_id, source_kind, source_id, \
     initial_quantity, current_quantity, unit, production_date, expiration_date, finished_at, \
     storage_location, quality_score, quality_status, created_at";

impl TryFrom<StockLotRow> for StockLot {
    type Error = AppError;

    fn try_from(row: StockLotRow) -> AppResult<Self> {
        let quality = match (row.quality_score, row.quality_status.as_deref()) {
            (Some(score), Some(status)) => Some(QualityCheck {
                score: u8::try_from(score).map_err(|_| {
                    AppError::DataIntegrity(format!("Quality score {} out of range", score))
                })?,
                status: parse(status, "quality status", QualityStatus::from_str(status))?,
            }),
            _ => None,
        };

        Ok(StockLot {
            id: row.id,
            stage: parse(&row.stage, "stage", StockStage::from_str(&row.stage))?,
            material_id: row.material_id,
            owner_id: row.owner_id,
            source: parse(
                &row.source_kind,
                "lot source",
                LotSource::from_parts(&row.source_kind, row.source_id),
            )?,
            initial_quantity: row.initial_quantity,
            current_quantity: row.current_quantity,
            unit: parse(&row.unit, "unit", Unit::from_str(&row.unit))?,
            production_date: row.production_date,
            expiration_date: row.expiration_date,
            finished_at: row.finished_at,
            storage_location: row.storage_location,
            quality,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub reference: String,
    pub restaurant_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub status: String,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ORDER_COLUMNS: &str = "id, reference, restaurant_id, customer_id, status, total_amount, \
     order_date, delivered_at, note, created_at, updated_at";

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        Ok(Order {
            id: row.id,
            reference: row.reference,
            restaurant_id: row.restaurant_id,
            customer_id: row.customer_id,
            status: parse(&row.status, "order status", OrderStatus::from_str(&row.status))?,
            total_amount: row.total_amount,
            order_date: row.order_date,
            delivered_at: row.delivered_at,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, total_price, note, created_at, updated_at";

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = AppError;

    fn try_from(row: OrderItemRow) -> AppResult<Self> {
        Ok(OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: non_negative(row.quantity, "item quantity")?,
            unit_price: row.unit_price,
            total_price: row.total_price,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ConsumptionRow {
    pub id: Uuid,
    pub consumer_kind: String,
    pub order_item_id: Option<Uuid>,
    pub workstation_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub lot_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub consumed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

pub const CONSUMPTION_COLUMNS: &str = "id, consumer_kind, order_item_id, workstation_id, \
     restaurant_id, actor_id, lot_id, material_id, quantity, consumed_at, notes";

/// Flattened consumer columns: (kind, order_item_id, workstation_id, restaurant_id, actor_id)
pub fn consumer_columns(
    consumer: &Consumer,
) -> (&'static str, Option<Uuid>, Option<Uuid>, Option<Uuid>, Option<Uuid>) {
    match *consumer {
        Consumer::OrderItem { order_item_id } => (consumer.kind(), Some(order_item_id), None, None, None),
        Consumer::Workstation {
            workstation_id,
            worker_id,
        } => (consumer.kind(), None, Some(workstation_id), None, Some(worker_id)),
        Consumer::Packaging { coordinator_id } => (consumer.kind(), None, None, None, Some(coordinator_id)),
        Consumer::Delivery {
            restaurant_id,
            transporter_id,
        } => (consumer.kind(), None, None, Some(restaurant_id), Some(transporter_id)),
    }
}

impl TryFrom<ConsumptionRow> for ConsumptionRecord {
    type Error = AppError;

    fn try_from(row: ConsumptionRow) -> AppResult<Self> {
        let missing = |column: &str| {
            AppError::DataIntegrity(format!(
                "Consumption record {} of kind '{}' has no {}",
                row.id, row.consumer_kind, column
            ))
        };

        let consumer = match row.consumer_kind.as_str() {
            "order_item" => Consumer::OrderItem {
                order_item_id: row.order_item_id.ok_or_else(|| missing("order_item_id"))?,
            },
            "workstation" => Consumer::Workstation {
                workstation_id: row.workstation_id.ok_or_else(|| missing("workstation_id"))?,
                worker_id: row.actor_id.ok_or_else(|| missing("actor_id"))?,
            },
            "packaging" => Consumer::Packaging {
                coordinator_id: row.actor_id.ok_or_else(|| missing("actor_id"))?,
            },
            "delivery" => Consumer::Delivery {
                restaurant_id: row.restaurant_id.ok_or_else(|| missing("restaurant_id"))?,
                transporter_id: row.actor_id.ok_or_else(|| missing("actor_id"))?,
            },
            other => {
                return Err(AppError::DataIntegrity(format!("Unknown consumer kind '{}'", other)))
            }
        };

        Ok(ConsumptionRecord {
            id: row.id,
            consumer,
            lot_id: row.lot_id,
            material_id: row.material_id,
            quantity: row.quantity,
            consumed_at: row.consumed_at,
            notes: row.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumption_row(kind: &str) -> ConsumptionRow {
        ConsumptionRow {
            id: Uuid::new_v4(),
            consumer_kind: kind.to_string(),
            order_item_id: None,
            workstation_id: Some(Uuid::new_v4()),
            restaurant_id: None,
            actor_id: Some(Uuid::new_v4()),
            lot_id: Uuid::new_v4(),
            material_id: Uuid::new_v4(),
            quantity: Decimal::from(3),
            consumed_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn test_consumer_columns_round_trip() {
        let row = consumption_row("workstation");
        let record = ConsumptionRecord::try_from(row).unwrap();
        let (kind, item, workstation, restaurant, actor) = consumer_columns(&record.consumer);

        assert_eq!(kind, "workstation");
        assert!(item.is_none() && restaurant.is_none());
        assert!(workstation.is_some() && actor.is_some());
    }

    #[test]
    fn test_incomplete_consumer_is_a_data_integrity_error() {
        let row = consumption_row("order_item");
        assert!(matches!(
            ConsumptionRecord::try_from(row),
            Err(AppError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let row = StockLotRow {
            id: Uuid::new_v4(),
            stage: "frozen".to_string(),
            material_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            source_kind: "supplier".to_string(),
            source_id: Uuid::new_v4(),
            initial_quantity: Decimal::from(5),
            current_quantity: Decimal::from(5),
            unit: "kg".to_string(),
            production_date: None,
            expiration_date: None,
            finished_at: None,
            storage_location: None,
            quality_score: None,
            quality_status: None,
            created_at: Utc::now(),
        };
        assert!(StockLot::try_from(row).is_err());
    }
}
