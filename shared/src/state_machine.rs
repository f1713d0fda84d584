//! Order status machine and item mutations
//!
//! Entering a consuming status validates then consumes the whole order;
//! leaving one for pending or cancelled restores it. Item mutations on an
//! order that already holds stock re-run the pipeline for that item only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::allocator::{consume_item, consume_order, restore_item, restore_order};
use crate::availability::{ensure_available, today, validate_item, validate_order};
use crate::book::InventoryBook;
use crate::error::{DomainError, DomainResult};
use crate::models::{Order, OrderItem, OrderStatus};

/// Stock side effect of a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockEffect {
    None,
    Consume,
    Restore,
}

impl OrderStatus {
    /// Statuses reachable in one step
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Preparing => &[OrderStatus::Ready],
            OrderStatus::Ready => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    /// Same-status is always allowed
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        *self == next || self.allowed_next().contains(&next)
    }

    /// Ingredients are held consumed while the order is in one of these
    pub fn is_consuming(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed
                | OrderStatus::Preparing
                | OrderStatus::Ready
                | OrderStatus::Delivered
        )
    }

    /// Items of a cancelled order are frozen; a delivered order still
    /// re-runs the stock pipeline for item changes
    pub fn accepts_item_changes(&self) -> bool {
        *self != OrderStatus::Cancelled
    }
}

/// Decide the stock effect of `from -> to`, or reject the transition
pub fn plan_transition(from: OrderStatus, to: OrderStatus) -> DomainResult<StockEffect> {
    if !from.can_transition_to(to) {
        return Err(DomainError::InvalidTransition { from, to });
    }
    let effect = match (from.is_consuming(), to.is_consuming()) {
        (false, true) => StockEffect::Consume,
        (true, false) => StockEffect::Restore,
        _ => StockEffect::None,
    };
    Ok(effect)
}

impl InventoryBook {
    /// Open a pending order at a restaurant
    pub fn create_order(
        &mut self,
        restaurant_id: Uuid,
        customer_id: Option<Uuid>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Uuid> {
        self.transaction(|book| {
            if book.restaurant(restaurant_id).is_none() {
                return Err(DomainError::not_found(format!("Restaurant {}", restaurant_id)));
            }
            if let Some(customer_id) = customer_id {
                book.require_user(customer_id)?;
            }
            let order = Order::new(Uuid::new_v4(), restaurant_id, customer_id, note, now);
            let id = order.id;
            book.save_order(order);
            Ok(id)
        })
    }

    /// Move an order to `new_status`, consuming or restoring stock as needed
    pub fn set_status(
        &mut self,
        order_id: Uuid,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<StockEffect> {
        self.transaction(|book| {
            let mut order = book.require_order(order_id)?.clone();
            if order.status == new_status {
                return Ok(StockEffect::None);
            }

            let effect = plan_transition(order.status, new_status)?;
            match effect {
                StockEffect::Consume => {
                    ensure_available(validate_order(book, order_id, today(now))?)?;
                    consume_order(book, order_id, now)?;
                }
                StockEffect::Restore => {
                    restore_order(book, order_id)?;
                }
                StockEffect::None => {}
            }

            if new_status == OrderStatus::Delivered {
                order.delivered_at = Some(now);
            }
            order.status = new_status;
            order.updated_at = now;
            book.save_order(order);
            Ok(effect)
        })
    }

    /// Add a product line to an order
    pub fn add_item(
        &mut self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: u32,
        unit_price: Option<Decimal>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Uuid> {
        self.transaction(|book| {
            let order = book.require_order(order_id)?;
            ensure_mutable(order)?;
            let consuming = order.status.is_consuming();
            ensure_product_unique(book, order_id, product_id, None)?;

            let product = book.require_product(product_id)?;
            let item = OrderItem::new(Uuid::new_v4(), order_id, product, quantity, unit_price, note, now)?;
            let item_id = item.id;
            book.save_item(item);

            if consuming {
                ensure_available(validate_item(book, item_id, today(now))?)?;
                consume_item(book, item_id, now)?;
            }

            book.refresh_total(order_id, now)?;
            Ok(item_id)
        })
    }

    /// Change an item's product, quantity or price
    pub fn update_item(
        &mut self,
        item_id: Uuid,
        product_id: Option<Uuid>,
        quantity: Option<u32>,
        unit_price: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.transaction(|book| {
            let mut item = book.require_item(item_id)?.clone();
            let order = book.require_order(item.order_id)?;
            ensure_mutable(order)?;
            let consuming = order.status.is_consuming();

            let product_id = product_id.unwrap_or(item.product_id);
            ensure_product_unique(book, item.order_id, product_id, Some(item_id))?;
            let product = book.require_product(product_id)?.clone();

            let stock_changes = product_id != item.product_id
                || quantity.is_some_and(|quantity| quantity != item.quantity);
            item.revise(&product, quantity.unwrap_or(item.quantity), unit_price, now)?;
            let order_id = item.order_id;

            if consuming && stock_changes {
                restore_item(book, item_id)?;
                book.save_item(item);
                ensure_available(validate_item(book, item_id, today(now))?)?;
                consume_item(book, item_id, now)?;
            } else {
                book.save_item(item);
            }

            book.refresh_total(order_id, now)
        })
    }

    /// Delete an item, returning its stock first if the order holds any
    pub fn remove_item(&mut self, item_id: Uuid, now: DateTime<Utc>) -> DomainResult<()> {
        self.transaction(|book| {
            let order_id = book.require_item(item_id)?.order_id;
            let order = book.require_order(order_id)?;
            ensure_mutable(order)?;

            if order.status.is_consuming() {
                restore_item(book, item_id)?;
            }
            book.delete_item(item_id);
            book.refresh_total(order_id, now)
        })
    }

    fn refresh_total(&mut self, order_id: Uuid, now: DateTime<Utc>) -> DomainResult<()> {
        let mut order = self.require_order(order_id)?.clone();
        order.recompute_total(self.items_of(order_id));
        order.updated_at = now;
        self.save_order(order);
        Ok(())
    }
}

fn ensure_mutable(order: &Order) -> DomainResult<()> {
    if !order.status.accepts_item_changes() {
        return Err(DomainError::invalid(format!(
            "Items of a {} order cannot be modified",
            order.status
        )));
    }
    Ok(())
}

fn ensure_product_unique(
    book: &InventoryBook,
    order_id: Uuid,
    product_id: Uuid,
    except: Option<Uuid>,
) -> DomainResult<()> {
    let duplicate = book
        .items_of(order_id)
        .iter()
        .any(|item| item.product_id == product_id && Some(item.id) != except);
    if duplicate {
        return Err(DomainError::invalid(format!(
            "Product {} is already on order {}",
            product_id, order_id
        )));
    }
    Ok(())
}
