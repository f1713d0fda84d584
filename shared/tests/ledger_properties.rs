//! Ledger property tests
//!
//! - Lot bounds: 0 <= current <= initial after any operation sequence
//! - Consume/restore round trip returns every lot to its prior quantity
//! - FIFO never draws from a later-expiring lot while a sooner one has stock

mod common;

use common::{date, later, now, Kitchen};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{LotSource, NewStockLot, OrderStatus, StockLot, StockStage, Unit};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Quantities with two decimal places, 0.01 to 500.00
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..50_000).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum LedgerOp {
    Reduce(Decimal),
    Increase(Decimal),
    Adjust(Decimal),
}

fn op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        quantity_strategy().prop_map(LedgerOp::Reduce),
        quantity_strategy().prop_map(LedgerOp::Increase),
        quantity_strategy().prop_map(LedgerOp::Adjust),
        quantity_strategy().prop_map(|q| LedgerOp::Adjust(-q)),
    ]
}

fn lot_with(initial: Decimal) -> StockLot {
    StockLot::create(
        Uuid::new_v4(),
        NewStockLot {
            stage: StockStage::Restaurant,
            material_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            source: LotSource::Supplier {
                supplier_id: Uuid::new_v4(),
            },
            initial_quantity: initial,
            current_quantity: None,
            unit: Unit::Kg,
            production_date: None,
            expiration_date: None,
            storage_location: None,
            quality: None,
        },
        now(),
    )
    .unwrap()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Lot bounds hold whatever sequence of operations is attempted
    #[test]
    fn prop_lot_bounds_hold(
        initial in quantity_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..30)
    ) {
        let mut lot = lot_with(initial);

        for op in ops {
            let before = lot.clone();
            let result = match op {
                LedgerOp::Reduce(q) => lot.reduce(q, later(1)),
                LedgerOp::Increase(q) => lot.increase(q),
                LedgerOp::Adjust(d) => lot.adjust(d, later(1)),
            };
            if result.is_err() {
                prop_assert_eq!(&lot, &before);
            }

            prop_assert!(lot.current_quantity >= Decimal::ZERO);
            prop_assert!(lot.current_quantity <= lot.initial_quantity);
            prop_assert_eq!(lot.finished_at.is_some(), lot.current_quantity.is_zero());
        }
    }

    /// Confirming then cancelling leaves every lot exactly as it was
    #[test]
    fn prop_consume_restore_round_trip(
        lots in prop::collection::vec((quantity_strategy(), 0u32..200), 1..6),
        per_unit in quantity_strategy(),
        quantity in 1u32..5
    ) {
        let mut kitchen = Kitchen::new(&per_unit.to_string());
        let ids: Vec<Uuid> = lots
            .iter()
            .map(|(q, days)| {
                let expires = date(2025, 1, 1) + chrono::Duration::days(i64::from(*days));
                kitchen.stock(&q.to_string(), Some(expires), now())
            })
            .collect();
        let before: Vec<Decimal> = ids.iter().map(|id| kitchen.current(*id)).collect();
        let (order_id, _) = kitchen.order(quantity, now());

        let required = per_unit * Decimal::from(quantity);
        let total: Decimal = before.iter().sum();
        let confirmed = kitchen.book.set_status(order_id, OrderStatus::Confirmed, later(1));
        prop_assert_eq!(confirmed.is_ok(), total >= required);

        if confirmed.is_ok() {
            let after: Decimal = ids.iter().map(|id| kitchen.current(*id)).sum();
            prop_assert_eq!(total - after, required);
            kitchen.book.set_status(order_id, OrderStatus::Cancelled, later(2)).unwrap();
        }

        let restored: Vec<Decimal> = ids.iter().map(|id| kitchen.current(*id)).collect();
        prop_assert_eq!(restored, before);
    }

    /// A lot is only drawn from once every sooner-expiring lot is empty
    #[test]
    fn prop_fifo_order(
        lots in prop::collection::vec((quantity_strategy(), 0u32..200), 2..6),
        per_unit in quantity_strategy()
    ) {
        let mut kitchen = Kitchen::new(&per_unit.to_string());
        let mut stock: Vec<(chrono::NaiveDate, usize, Uuid)> = lots
            .iter()
            .enumerate()
            .map(|(i, (q, days))| {
                let expires = date(2025, 1, 1) + chrono::Duration::days(i64::from(*days));
                (expires, i, kitchen.stock(&q.to_string(), Some(expires), later(i as i64)))
            })
            .collect();
        stock.sort();
        let (order_id, _) = kitchen.order(1, now());

        if kitchen.book.set_status(order_id, OrderStatus::Confirmed, later(100)).is_ok() {
            let mut seen_partial = false;
            for (expires, _, id) in &stock {
                let lot = kitchen.book.lot(*id).unwrap();
                let touched = lot.current_quantity < lot.initial_quantity;
                if touched {
                    prop_assert!(!seen_partial, "lot expiring {} drawn after a partial lot", expires);
                }
                if lot.current_quantity > Decimal::ZERO {
                    seen_partial = true;
                }
            }
        }
    }
}
