//! Availability checks against restaurant stock
//!
//! Reservations are soft: they are computed from the outstanding requirement
//! of other in-flight orders at read time and never stored.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::book::InventoryBook;
use crate::error::{DomainError, DomainResult};
use crate::models::{Order, OrderItem, OrderStatus, StockStage};
use crate::types::Quantity;

/// What is being evaluated, and therefore left out of the reservations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Every item of the order is under evaluation
    Order(Uuid),
    /// Only this item is under evaluation
    Item(Uuid),
}

/// Statuses whose unconsumed requirement holds a claim on stock
pub fn reserves_stock(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing
    )
}

/// Sum of non-expired restaurant stock of a material
pub fn available_quantity(
    book: &InventoryBook,
    material_id: Uuid,
    restaurant_id: Uuid,
    today: NaiveDate,
) -> Quantity {
    book.lots
        .values()
        .filter(|lot| {
            lot.stage == StockStage::Restaurant
                && lot.owner_id == restaurant_id
                && lot.material_id == material_id
                && !lot.is_expired(today)
        })
        .map(|lot| lot.current_quantity)
        .sum()
}

/// Requirement of `item` for `material_id` not yet backed by its records
pub fn outstanding_requirement(book: &InventoryBook, item: &OrderItem, material_id: Uuid) -> Quantity {
    let required = book
        .recipes
        .required_ingredients(item.product_id, item.quantity)
        .get(&material_id)
        .copied()
        .unwrap_or(Decimal::ZERO);
    let consumed: Quantity = book
        .consumptions
        .values()
        .filter(|record| record.is_for_item(item.id) && record.material_id == material_id)
        .map(|record| record.quantity)
        .sum();
    (required - consumed).max(Decimal::ZERO)
}

/// Quantity of a material claimed by other in-flight orders at the restaurant.
///
/// Confirmed and preparing orders always claim their outstanding requirement.
/// Pending orders only claim against orders placed after them.
pub fn reserved_quantity(
    book: &InventoryBook,
    material_id: Uuid,
    restaurant_id: Uuid,
    evaluated_order: &Order,
    evaluation: Evaluation,
) -> Quantity {
    let placed = (evaluated_order.order_date, evaluated_order.id);

    book.items
        .values()
        .filter(|item| match evaluation {
            Evaluation::Order(order_id) => item.order_id != order_id,
            Evaluation::Item(item_id) => item.id != item_id,
        })
        .filter(|item| {
            book.orders.get(&item.order_id).is_some_and(|order| {
                order.restaurant_id == restaurant_id
                    && reserves_stock(order.status)
                    && (order.status != OrderStatus::Pending
                        || (order.order_date, order.id) < placed)
            })
        })
        .map(|item| outstanding_requirement(book, item, material_id))
        .sum()
}

/// `max(0, available - reserved)`
pub fn effective_available(
    book: &InventoryBook,
    material_id: Uuid,
    evaluated_order: &Order,
    evaluation: Evaluation,
    today: NaiveDate,
) -> Quantity {
    let restaurant_id = evaluated_order.restaurant_id;
    let available = available_quantity(book, material_id, restaurant_id, today);
    let reserved = reserved_quantity(book, material_id, restaurant_id, evaluated_order, evaluation);
    (available - reserved).max(Decimal::ZERO)
}

/// Shortfall messages for one item; empty means it can be consumed
pub fn validate_item(book: &InventoryBook, item_id: Uuid, today: NaiveDate) -> DomainResult<Vec<String>> {
    let item = book.require_item(item_id)?;
    let order = book.require_order(item.order_id)?;

    let mut errors = Vec::new();
    for (material_id, required) in book.recipes.required_ingredients(item.product_id, item.quantity) {
        let available = effective_available(book, material_id, order, Evaluation::Item(item.id), today);
        if available < required {
            errors.push(shortfall(book, material_id, required, available));
        }
    }
    Ok(errors)
}

/// Shortfall messages for a whole order. Earlier items of the same order
/// are deducted from what later items can see.
pub fn validate_order(book: &InventoryBook, order_id: Uuid, today: NaiveDate) -> DomainResult<Vec<String>> {
    let order = book.require_order(order_id)?;

    let mut claimed: BTreeMap<Uuid, Quantity> = BTreeMap::new();
    let mut errors = Vec::new();
    for item in book.items_of(order_id) {
        let product_name = book
            .product(item.product_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Product ID {}", item.product_id));

        for (material_id, required) in book.recipes.required_ingredients(item.product_id, item.quantity) {
            let already = claimed.entry(material_id).or_insert(Decimal::ZERO);
            let available = (effective_available(book, material_id, order, Evaluation::Order(order_id), today)
                - *already)
                .max(Decimal::ZERO);
            if available < required {
                errors.push(format!(
                    "Product '{}' (Qty: {}): {}",
                    product_name,
                    item.quantity,
                    shortfall(book, material_id, required, available)
                ));
            }
            *already += required;
        }
    }
    Ok(errors)
}

/// Fail with `InsufficientIngredients` when any shortfall exists
pub fn ensure_available(errors: Vec<String>) -> DomainResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::InsufficientIngredients(errors))
    }
}

fn shortfall(book: &InventoryBook, material_id: Uuid, required: Quantity, available: Quantity) -> String {
    format!(
        "{}: Required {}, Available {}",
        book.material_name(material_id),
        required.normalize(),
        available.normalize()
    )
}

/// Calendar day used for expiry checks
pub fn today(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}
