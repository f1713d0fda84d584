//! Write-back tests
//!
//! The backend persists only the net effect of a book's change journal.
//! These tests check that the net effect of real operations is what the
//! store must write, and that the collapse rules hold for any journal.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    Change, ChangeSet, InventoryBook, LotSource, Material, NewStockLot, OrderStatus, Product,
    RecipeLine, Restaurant, StockLot, StockStage, Unit,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 15, 14, 30, 22).unwrap()
}

struct Fixture {
    book: InventoryBook,
    restaurant_id: Uuid,
    product_id: Uuid,
    lots: Vec<Uuid>,
}

/// One restaurant, one product needing 2 kg of rice per unit, two 5 kg lots
fn fixture() -> Fixture {
    let mut book = InventoryBook::new();
    let restaurant_id = Uuid::new_v4();
    book.insert_restaurant(Restaurant {
        id: restaurant_id,
        name: "Riverside".to_string(),
        location: "Bangkok".to_string(),
    });
    let material_id = Uuid::new_v4();
    book.insert_material(Material {
        id: material_id,
        name: "Jasmine Rice".to_string(),
        unit: Unit::Kg,
    });
    let product_id = Uuid::new_v4();
    book.insert_product(Product {
        id: product_id,
        name: "Khao Pad".to_string(),
        selling_price: dec("9.00"),
        is_available: true,
    });
    book.insert_recipe_line(RecipeLine {
        product_id,
        material_id,
        quantity_per_unit: dec("2"),
        notes: None,
    })
    .unwrap();

    let mut lots = Vec::new();
    for _ in 0..2 {
        let lot = StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                stage: StockStage::Restaurant,
                material_id,
                owner_id: restaurant_id,
                source: LotSource::Supplier {
                    supplier_id: Uuid::new_v4(),
                },
                initial_quantity: dec("5"),
                current_quantity: None,
                unit: Unit::Kg,
                production_date: None,
                expiration_date: None,
                storage_location: None,
                quality: None,
            },
            now(),
        )
        .unwrap();
        lots.push(lot.id);
        book.insert_lot(lot);
    }

    Fixture {
        book,
        restaurant_id,
        product_id,
        lots,
    }
}

// ============================================================================
// Net effect of operations
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_confirm_writes_records_and_touched_lots() {
        let mut f = fixture();
        let order_id = f.book.create_order(f.restaurant_id, None, None, now()).unwrap();
        f.book.add_item(order_id, f.product_id, 3, None, None, now()).unwrap();
        f.book.take_changes();

        f.book.set_status(order_id, OrderStatus::Confirmed, now()).unwrap();
        let net = f.book.changes().net();

        // 6 kg drawn as 5 + 1
        assert_eq!(net.created_consumptions.len(), 2);
        assert!(net.deleted_consumptions.is_empty());
        assert_eq!(net.saved_lots, f.lots.iter().copied().collect());
        assert!(net.saved_orders.contains(&order_id));
    }

    #[test]
    fn test_confirm_then_cancel_in_one_unit_writes_no_records() {
        let mut f = fixture();
        let order_id = f.book.create_order(f.restaurant_id, None, None, now()).unwrap();
        f.book.add_item(order_id, f.product_id, 2, None, None, now()).unwrap();
        f.book.take_changes();

        f.book.set_status(order_id, OrderStatus::Confirmed, now()).unwrap();
        f.book.set_status(order_id, OrderStatus::Cancelled, now()).unwrap();
        let net = f.book.changes().net();

        assert!(net.created_consumptions.is_empty());
        assert!(net.deleted_consumptions.is_empty());
        for lot_id in &f.lots {
            assert_eq!(f.book.lot(*lot_id).unwrap().current_quantity, dec("5"));
        }
    }

    #[test]
    fn test_rejected_operation_leaves_journal_untouched() {
        let mut f = fixture();
        let order_id = f.book.create_order(f.restaurant_id, None, None, now()).unwrap();
        // 12 kg needed, 10 kg on hand
        f.book.add_item(order_id, f.product_id, 6, None, None, now()).unwrap();
        let before = f.book.changes().len();

        let result = f.book.set_status(order_id, OrderStatus::Confirmed, now());

        assert!(result.is_err());
        assert_eq!(f.book.changes().len(), before);
        assert_eq!(f.book.order(order_id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_removed_item_is_deleted_after_its_records() {
        let mut f = fixture();
        let order_id = f.book.create_order(f.restaurant_id, None, None, now()).unwrap();
        let item_id = f.book.add_item(order_id, f.product_id, 1, None, None, now()).unwrap();
        f.book.set_status(order_id, OrderStatus::Confirmed, now()).unwrap();
        f.book.take_changes();

        f.book.remove_item(item_id, now()).unwrap();
        let changes: Vec<Change> = f.book.changes().iter().copied().collect();

        let record_deleted = changes
            .iter()
            .position(|c| matches!(c, Change::ConsumptionDeleted(_)))
            .unwrap();
        let item_deleted = changes
            .iter()
            .position(|c| *c == Change::ItemDeleted(item_id))
            .unwrap();
        assert!(record_deleted < item_deleted);

        let net = f.book.changes().net();
        assert!(net.deleted_items.contains(&item_id));
        assert!(!net.saved_items.contains(&item_id));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn change_strategy(ids: Vec<Uuid>) -> impl Strategy<Value = Change> {
    (0usize..7, prop::sample::select(ids)).prop_map(|(kind, id)| match kind {
        0 => Change::LotSaved(id),
        1 => Change::LotDeleted(id),
        2 => Change::OrderSaved(id),
        3 => Change::ItemSaved(id),
        4 => Change::ItemDeleted(id),
        5 => Change::ConsumptionCreated(id),
        _ => Change::ConsumptionDeleted(id),
    })
}

fn journal_strategy() -> impl Strategy<Value = Vec<Change>> {
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    prop::collection::vec(change_strategy(ids), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// No id is both written and deleted by one write-back
    #[test]
    fn prop_net_changes_are_disjoint(journal in journal_strategy()) {
        let mut set = ChangeSet::default();
        for change in &journal {
            set.push(*change);
        }
        let net = set.net();

        prop_assert!(net.saved_lots.is_disjoint(&net.deleted_lots));
        prop_assert!(net.saved_items.is_disjoint(&net.deleted_items));
        prop_assert!(net.created_consumptions.is_disjoint(&net.deleted_consumptions));
    }

    /// The last lot change decides whether the lot is written or deleted
    #[test]
    fn prop_last_lot_change_wins(journal in journal_strategy()) {
        let mut set = ChangeSet::default();
        for change in &journal {
            set.push(*change);
        }
        let net = set.net();

        let mut seen = std::collections::HashSet::new();
        for change in journal.iter().rev() {
            match change {
                Change::LotSaved(id) if seen.insert(*id) => prop_assert!(net.saved_lots.contains(id)),
                Change::LotDeleted(id) if seen.insert(*id) => prop_assert!(net.deleted_lots.contains(id)),
                _ => {}
            }
        }
    }
}
