//! Validation utilities for the supply chain

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::types::Unit;

/// Validate that a quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Expiration date must be after production date when both are known
pub fn validate_expiration_after_production(
    production: Option<NaiveDate>,
    expiration: Option<NaiveDate>,
) -> Result<(), &'static str> {
    match (production, expiration) {
        (Some(produced), Some(expires)) if expires <= produced => {
            Err("Expiration date must be after production date")
        }
        _ => Ok(()),
    }
}

/// Validate intake quality score (0-10)
pub fn validate_quality_score(score: u8) -> Result<(), &'static str> {
    if score > 10 {
        return Err("Quality check score must be between 0 and 10");
    }
    Ok(())
}

/// A stage transfer must keep the unit of the upstream lot
pub fn validate_units_match(expected: Unit, actual: Unit) -> Result<(), String> {
    if expected != actual {
        return Err(format!("Only {} unit is acceptable, got {}", expected, actual));
    }
    Ok(())
}

/// Produced quantity may shrink through preparation but never grow
pub fn validate_yield(consumed: Decimal, produced: Decimal) -> Result<(), &'static str> {
    if produced <= Decimal::ZERO {
        return Err("Produced quantity must be positive");
    }
    if produced > consumed {
        return Err("Produced quantity cannot exceed consumed quantity");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(Decimal::ONE).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn test_expiration_after_production() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 1, day);
        assert!(validate_expiration_after_production(d(1), d(2)).is_ok());
        assert!(validate_expiration_after_production(d(2), d(2)).is_err());
        assert!(validate_expiration_after_production(d(3), d(2)).is_err());
        assert!(validate_expiration_after_production(None, d(2)).is_ok());
        assert!(validate_expiration_after_production(d(3), None).is_ok());
    }

    #[test]
    fn test_quality_score_range() {
        assert!(validate_quality_score(0).is_ok());
        assert!(validate_quality_score(10).is_ok());
        assert!(validate_quality_score(11).is_err());
    }

    #[test]
    fn test_units_match() {
        assert!(validate_units_match(Unit::Kg, Unit::Kg).is_ok());
        let err = validate_units_match(Unit::Kg, Unit::Gram).unwrap_err();
        assert_eq!(err, "Only kg unit is acceptable, got g");
    }

    #[test]
    fn test_yield() {
        assert!(validate_yield(Decimal::from(10), Decimal::from(8)).is_ok());
        assert!(validate_yield(Decimal::from(10), Decimal::from(10)).is_ok());
        assert!(validate_yield(Decimal::from(10), Decimal::from(11)).is_err());
        assert!(validate_yield(Decimal::from(10), Decimal::ZERO).is_err());
    }
}
