//! Quantity ledger: the only way a lot's current quantity changes
//!
//! Every mutation keeps `0 <= current_quantity <= initial_quantity`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::StockLot;
use crate::types::Quantity;

impl StockLot {
    /// Draw `quantity` from the lot, stamping `finished_at` when it empties
    pub fn reduce(&mut self, quantity: Quantity, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity < Decimal::ZERO {
            return Err(DomainError::invalid("Cannot reduce by a negative quantity"));
        }
        if quantity > self.current_quantity {
            return Err(DomainError::InsufficientQuantity {
                subject: format!("lot {}", self.id),
                requested: quantity,
                available: self.current_quantity,
            });
        }

        self.current_quantity -= quantity;
        if self.current_quantity.is_zero() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Put `quantity` back, clearing `finished_at` once stock is positive
    pub fn increase(&mut self, quantity: Quantity) -> DomainResult<()> {
        if quantity < Decimal::ZERO {
            return Err(DomainError::invalid("Cannot increase by a negative quantity"));
        }
        let restored = self.current_quantity + quantity;
        if restored > self.initial_quantity {
            return Err(DomainError::invalid(format!(
                "Increasing lot {} by {} would exceed its initial quantity {}",
                self.id, quantity, self.initial_quantity
            )));
        }

        self.current_quantity = restored;
        if self.current_quantity > Decimal::ZERO {
            self.finished_at = None;
        }
        Ok(())
    }

    /// Signed manual correction: negative deltas reduce, positive increase
    pub fn adjust(&mut self, delta: Decimal, now: DateTime<Utc>) -> DomainResult<()> {
        if delta < Decimal::ZERO {
            self.reduce(-delta, now)
        } else {
            self.increase(delta)
        }
    }

    /// A lot expires at the start of its expiration date
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|expires| expires <= today)
    }

    /// Lot has stock left and has not expired
    pub fn is_available(&self, today: NaiveDate) -> bool {
        self.current_quantity > Decimal::ZERO && !self.is_expired(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LotSource, NewStockLot, StockStage};
    use crate::types::Unit;
    use uuid::Uuid;

    fn lot(initial: i64) -> StockLot {
        StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                stage: StockStage::Restaurant,
                material_id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                source: LotSource::Supplier {
                    supplier_id: Uuid::new_v4(),
                },
                initial_quantity: Decimal::from(initial),
                current_quantity: None,
                unit: Unit::Piece,
                production_date: None,
                expiration_date: None,
                storage_location: None,
                quality: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_reduce_decrements() {
        let mut l = lot(10);
        l.reduce(Decimal::from(4), Utc::now()).unwrap();
        assert_eq!(l.current_quantity, Decimal::from(6));
        assert!(l.finished_at.is_none());
    }

    #[test]
    fn test_reduce_to_zero_sets_finished() {
        let mut l = lot(3);
        let now = Utc::now();
        l.reduce(Decimal::from(3), now).unwrap();
        assert_eq!(l.current_quantity, Decimal::ZERO);
        assert_eq!(l.finished_at, Some(now));
    }

    #[test]
    fn test_reduce_more_than_current_fails_unchanged() {
        let mut l = lot(5);
        let err = l.reduce(Decimal::from(6), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientQuantity { .. }));
        assert_eq!(l.current_quantity, Decimal::from(5));
    }

    #[test]
    fn test_increase_clears_finished() {
        let mut l = lot(3);
        l.reduce(Decimal::from(3), Utc::now()).unwrap();
        l.increase(Decimal::from(1)).unwrap();
        assert_eq!(l.current_quantity, Decimal::from(1));
        assert!(l.finished_at.is_none());
    }

    #[test]
    fn test_increase_negative_fails() {
        let mut l = lot(3);
        assert!(matches!(
            l.increase(Decimal::NEGATIVE_ONE),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_increase_beyond_initial_fails() {
        let mut l = lot(3);
        l.reduce(Decimal::from(1), Utc::now()).unwrap();
        assert!(l.increase(Decimal::from(2)).is_err());
        assert_eq!(l.current_quantity, Decimal::from(2));
    }

    #[test]
    fn test_adjust_signed() {
        let mut l = lot(10);
        l.adjust(Decimal::from(-7), Utc::now()).unwrap();
        assert_eq!(l.current_quantity, Decimal::from(3));
        l.adjust(Decimal::from(2), Utc::now()).unwrap();
        assert_eq!(l.current_quantity, Decimal::from(5));
    }

    #[test]
    fn test_expiry_boundary() {
        let mut l = lot(1);
        l.expiration_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert!(!l.is_expired(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(l.is_expired(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(!l.is_available(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
    }
}
