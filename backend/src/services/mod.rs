//! Business logic services for the supply chain ledger

pub mod order;
pub mod stock;
pub mod trace;

pub use order::OrderService;
pub use stock::StockService;
pub use trace::TraceService;

use rust_decimal::Decimal;
use shared::DomainError;
use sqlx::{PgPool, Postgres, Transaction};
use validator::ValidationError;

use crate::error::{AppError, AppResult};
use crate::store;

/// Open a transaction whose row locks give up after `lock_timeout_ms`
async fn begin(db: &PgPool, lock_timeout_ms: u64) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = db.begin().await?;
    store::set_lock_timeout(&mut tx, lock_timeout_ms).await?;
    Ok(tx)
}

/// Log a rejected domain operation and convert it
fn rejected(operation: &'static str, err: DomainError) -> AppError {
    tracing::warn!(operation, error = %err, "Operation rejected");
    AppError::Domain(err)
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

fn positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity <= Decimal::ZERO {
        return Err(ValidationError::new("non_positive_quantity"));
    }
    Ok(())
}

fn non_zero_delta(delta: &Decimal) -> Result<(), ValidationError> {
    if delta.is_zero() {
        return Err(ValidationError::new("zero_delta"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_and_quantity_validators() {
        assert!(non_negative_price(&Decimal::ZERO).is_ok());
        assert!(non_negative_price(&Decimal::NEGATIVE_ONE).is_err());
        assert!(positive_quantity(&Decimal::ONE).is_ok());
        assert!(positive_quantity(&Decimal::ZERO).is_err());
        assert!(non_zero_delta(&Decimal::NEGATIVE_ONE).is_ok());
        assert!(non_zero_delta(&Decimal::ZERO).is_err());
    }
}
