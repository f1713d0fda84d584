//! FIFO allocation of restaurant stock to order items
//!
//! Consumption draws from the soonest-expiring eligible lot first (lots
//! without an expiration date last, ties broken by creation time), writing
//! one consumption record per lot touched. Restoration reverses records
//! grouped by lot. Both run as a single unit: all lots change or none.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::availability::today;
use crate::book::InventoryBook;
use crate::error::{DomainError, DomainResult};
use crate::models::{ConsumptionRecord, Consumer, StockLot, StockStage};
use crate::types::Quantity;

/// Sort key: expiration ascending with undated lots last, then creation
fn fifo_key(lot: &StockLot) -> (bool, Option<NaiveDate>, DateTime<Utc>, Uuid) {
    (
        lot.expiration_date.is_none(),
        lot.expiration_date,
        lot.created_at,
        lot.id,
    )
}

/// Lots a restaurant may draw a material from, in FIFO order
pub fn eligible_lots(
    book: &InventoryBook,
    material_id: Uuid,
    restaurant_id: Uuid,
    today: NaiveDate,
) -> Vec<&StockLot> {
    let mut lots: Vec<&StockLot> = book
        .lots
        .values()
        .filter(|lot| {
            lot.stage == StockStage::Restaurant
                && lot.owner_id == restaurant_id
                && lot.material_id == material_id
                && lot.is_available(today)
        })
        .collect();
    lots.sort_by_key(|lot| fifo_key(lot));
    lots
}

/// Consume every ingredient of one order item. Returns the new record ids.
pub fn consume_item(book: &mut InventoryBook, item_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<Uuid>> {
    book.transaction(|book| consume_item_in(book, item_id, now))
}

/// Consume every item of an order
pub fn consume_order(book: &mut InventoryBook, order_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<Uuid>> {
    book.transaction(|book| {
        let item_ids: Vec<Uuid> = book.items_of(order_id).iter().map(|item| item.id).collect();
        let mut records = Vec::new();
        for item_id in item_ids {
            records.extend(consume_item_in(book, item_id, now)?);
        }
        Ok(records)
    })
}

fn consume_item_in(book: &mut InventoryBook, item_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<Uuid>> {
    let item = book.require_item(item_id)?.clone();
    let restaurant_id = book.require_order(item.order_id)?.restaurant_id;
    let required = book.recipes.required_ingredients(item.product_id, item.quantity);

    let mut created = Vec::new();
    for (material_id, required_quantity) in required {
        let plan = plan_draws(book, material_id, restaurant_id, required_quantity, today(now))?;
        for (lot_id, quantity) in plan {
            book.lot_mut(lot_id)?.reduce(quantity, now)?;
            book.touch_lot(lot_id);

            let record = ConsumptionRecord {
                id: Uuid::new_v4(),
                consumer: Consumer::OrderItem {
                    order_item_id: item.id,
                },
                lot_id,
                material_id,
                quantity,
                consumed_at: now,
                notes: None,
            };
            created.push(record.id);
            book.record_consumption(record);
        }
    }
    Ok(created)
}

/// Split `required` across eligible lots. Fails when the lots cannot cover it.
pub fn plan_draws(
    book: &InventoryBook,
    material_id: Uuid,
    restaurant_id: Uuid,
    required: Quantity,
    today: NaiveDate,
) -> DomainResult<Vec<(Uuid, Quantity)>> {
    let lots = eligible_lots(book, material_id, restaurant_id, today);
    let total: Quantity = lots.iter().map(|lot| lot.current_quantity).sum();
    if total < required {
        return Err(DomainError::InsufficientQuantity {
            subject: format!("material {}", book.material_name(material_id)),
            requested: required,
            available: total,
        });
    }

    let mut remaining = required;
    let mut plan = Vec::new();
    for lot in lots {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(lot.current_quantity);
        plan.push((lot.id, take));
        remaining -= take;
    }
    Ok(plan)
}

/// Reverse all records of one order item
pub fn restore_item(book: &mut InventoryBook, item_id: Uuid) -> DomainResult<Quantity> {
    let record_ids: Vec<Uuid> = book
        .consumptions_for_item(item_id)
        .iter()
        .map(|record| record.id)
        .collect();
    book.transaction(|book| restore_records(book, &record_ids))
}

/// Reverse all records of every item of an order
pub fn restore_order(book: &mut InventoryBook, order_id: Uuid) -> DomainResult<Quantity> {
    let item_ids: Vec<Uuid> = book.items_of(order_id).iter().map(|item| item.id).collect();
    let record_ids: Vec<Uuid> = item_ids
        .iter()
        .flat_map(|item_id| book.consumptions_for_item(*item_id))
        .map(|record| record.id)
        .collect();
    book.transaction(|book| restore_records(book, &record_ids))
}

/// Put recorded quantities back on their lots, then drop the records
pub(crate) fn restore_records(book: &mut InventoryBook, record_ids: &[Uuid]) -> DomainResult<Quantity> {
    let mut per_lot: BTreeMap<Uuid, Quantity> = BTreeMap::new();
    for id in record_ids {
        let record = book
            .consumption(*id)
            .ok_or_else(|| DomainError::not_found(format!("Consumption record {}", id)))?;
        *per_lot.entry(record.lot_id).or_insert(Decimal::ZERO) += record.quantity;
    }

    let mut restored = Decimal::ZERO;
    for (lot_id, quantity) in per_lot {
        book.lot_mut(lot_id)?.increase(quantity)?;
        book.touch_lot(lot_id);
        restored += quantity;
    }

    for id in record_ids {
        book.delete_consumption(*id);
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LotSource, NewStockLot};
    use crate::types::Unit;
    use chrono::TimeZone;

    fn stock(book: &mut InventoryBook, restaurant: Uuid, material: Uuid, qty: i64, expires: Option<NaiveDate>) -> Uuid {
        let lot = StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                stage: StockStage::Restaurant,
                material_id: material,
                owner_id: restaurant,
                source: LotSource::Supplier {
                    supplier_id: Uuid::new_v4(),
                },
                initial_quantity: Decimal::from(qty),
                current_quantity: None,
                unit: Unit::Kg,
                production_date: None,
                expiration_date: expires,
                storage_location: None,
                quality: None,
            },
            Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap(),
        )
        .unwrap();
        let id = lot.id;
        book.insert_lot(lot);
        id
    }

    #[test]
    fn test_plan_splits_across_lots_in_expiry_order() {
        let mut book = InventoryBook::new();
        let (restaurant, material) = (Uuid::new_v4(), Uuid::new_v4());
        let b = stock(&mut book, restaurant, material, 10, NaiveDate::from_ymd_opt(2025, 6, 1));
        let a = stock(&mut book, restaurant, material, 3, NaiveDate::from_ymd_opt(2025, 1, 1));

        let today = NaiveDate::from_ymd_opt(2024, 12, 15).unwrap();
        let plan = plan_draws(&book, material, restaurant, Decimal::from(5), today).unwrap();
        assert_eq!(plan, vec![(a, Decimal::from(3)), (b, Decimal::from(2))]);
    }

    #[test]
    fn test_plan_short_stock_reports_totals() {
        let mut book = InventoryBook::new();
        let (restaurant, material) = (Uuid::new_v4(), Uuid::new_v4());
        stock(&mut book, restaurant, material, 4, None);

        let today = NaiveDate::from_ymd_opt(2024, 12, 15).unwrap();
        let err = plan_draws(&book, material, restaurant, Decimal::from(5), today).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientQuantity {
                subject: format!("material Material ID {}", material),
                requested: Decimal::from(5),
                available: Decimal::from(4),
            }
        );
    }
}
