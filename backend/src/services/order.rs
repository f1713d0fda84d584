//! Order service: status transitions and item changes with stock effects
//!
//! Each call runs in one database transaction. The order row and the
//! restaurant's lots are locked before the book is loaded, so competing
//! confirmations at the same restaurant are serialized.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::{ConsumptionRecord, InventoryBook, Order, OrderItem, OrderStatus, StockEffect};

use super::{begin, non_negative_price, rejected};
use crate::error::{AppError, AppResult};
use crate::models::{ConsumptionRow, OrderItemRow, OrderRow, CONSUMPTION_COLUMNS, ORDER_COLUMNS, ORDER_ITEM_COLUMNS};
use crate::store;

/// Order service for the order lifecycle
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// Input for opening an order
#[derive(Debug, Validate)]
pub struct CreateOrderInput {
    pub restaurant_id: Uuid,
    pub customer_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Input for adding a product line
#[derive(Debug, Validate)]
pub struct AddItemInput {
    pub order_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: u32,
    #[validate(custom = "non_negative_price")]
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Input for changing a product line
#[derive(Debug, Validate)]
pub struct UpdateItemInput {
    pub item_id: Uuid,
    pub product_id: Option<Uuid>,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: Option<u32>,
    #[validate(custom = "non_negative_price")]
    pub unit_price: Option<Decimal>,
}

/// Result of a status change
#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub stock_effect: StockEffect,
    pub records_created: usize,
    pub records_deleted: usize,
}

/// An item with the stock it currently holds
#[derive(Debug, Serialize)]
pub struct ItemDetails {
    #[serde(flatten)]
    pub item: OrderItem,
    pub consumptions: Vec<ConsumptionRecord>,
}

/// Order with its items
#[derive(Debug, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<ItemDetails>,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        Self { db, lock_timeout_ms }
    }

    /// Open a pending order
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<Order> {
        input.validate()?;

        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        store::load_restaurant(&mut tx, &mut book, input.restaurant_id).await?;
        if let Some(customer_id) = input.customer_id {
            store::load_users(&mut tx, &mut book, &[customer_id]).await?;
        }

        let order_id = book
            .create_order(input.restaurant_id, input.customer_id, input.note, Utc::now())
            .map_err(|e| rejected("create_order", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        let order = required(book.order(order_id).cloned(), "Order", order_id)?;
        tracing::info!(order_id = %order.id, reference = %order.reference, "Order created");
        Ok(order)
    }

    /// Move an order to a new status, consuming or restoring stock
    pub async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> AppResult<StatusChange> {
        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        store::load_order_scope(&mut tx, &mut book, order_id, &[]).await?;
        let previous_status = required(book.order(order_id).map(|o| o.status), "Order", order_id)?;

        let stock_effect = book
            .set_status(order_id, status, Utc::now())
            .map_err(|e| rejected("set_status", e))?;
        let net = store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = %previous_status,
            to = %status,
            effect = ?stock_effect,
            "Order status changed"
        );
        tracing::debug!(
            created = net.created_consumptions.len(),
            deleted = net.deleted_consumptions.len(),
            lots = net.saved_lots.len(),
            "Stock records written"
        );

        Ok(StatusChange {
            order: required(book.order(order_id).cloned(), "Order", order_id)?,
            previous_status,
            stock_effect,
            records_created: net.created_consumptions.len(),
            records_deleted: net.deleted_consumptions.len(),
        })
    }

    /// Add a product line; consumes at once if the order already holds stock
    pub async fn add_item(&self, input: AddItemInput) -> AppResult<OrderItem> {
        input.validate()?;

        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        store::load_order_scope(&mut tx, &mut book, input.order_id, &[input.product_id]).await?;

        let item_id = book
            .add_item(
                input.order_id,
                input.product_id,
                input.quantity,
                input.unit_price,
                input.note,
                Utc::now(),
            )
            .map_err(|e| rejected("add_item", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(order_id = %input.order_id, item_id = %item_id, "Order item added");
        required(book.item(item_id).cloned(), "Order item", item_id)
    }

    /// Change product, quantity or price of a line
    pub async fn update_item(&self, input: UpdateItemInput) -> AppResult<OrderItem> {
        input.validate()?;

        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let order_id = store::order_of_item(&mut tx, input.item_id).await?;
        let mut book = InventoryBook::new();
        let extra: Vec<Uuid> = input.product_id.into_iter().collect();
        store::load_order_scope(&mut tx, &mut book, order_id, &extra).await?;

        book.update_item(
            input.item_id,
            input.product_id,
            input.quantity,
            input.unit_price,
            Utc::now(),
        )
        .map_err(|e| rejected("update_item", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, item_id = %input.item_id, "Order item updated");
        required(book.item(input.item_id).cloned(), "Order item", input.item_id)
    }

    /// Delete a line, returning any stock it holds
    pub async fn remove_item(&self, item_id: Uuid) -> AppResult<Order> {
        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let order_id = store::order_of_item(&mut tx, item_id).await?;
        let mut book = InventoryBook::new();
        store::load_order_scope(&mut tx, &mut book, order_id, &[]).await?;

        book.remove_item(item_id, Utc::now())
            .map_err(|e| rejected("remove_item", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, item_id = %item_id, "Order item removed");
        required(book.order(order_id).cloned(), "Order", order_id)
    }

    /// Get an order with its items and their consumption records
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderDetails> {
        let order: Order = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))?
        .try_into()?;

        let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
            ORDER_ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let record_rows = sqlx::query_as::<_, ConsumptionRow>(&format!(
            r#"
            SELECT {} FROM consumption_records
            WHERE order_item_id IN (SELECT id FROM order_items WHERE order_id = $1)
            ORDER BY consumed_at, id
            "#,
            CONSUMPTION_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let mut records = Vec::with_capacity(record_rows.len());
        for row in record_rows {
            records.push(ConsumptionRecord::try_from(row)?);
        }

        let mut items = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            let item = OrderItem::try_from(row)?;
            let consumptions = records
                .iter()
                .filter(|record| record.is_for_item(item.id))
                .cloned()
                .collect();
            items.push(ItemDetails { item, consumptions });
        }

        Ok(OrderDetails { order, items })
    }
}

fn required<T>(value: Option<T>, what: &str, id: Uuid) -> AppResult<T> {
    value.ok_or_else(|| AppError::NotFound(format!("{} {}", what, id)))
}
