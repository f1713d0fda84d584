//! Domain errors raised by ledger, allocation and order operations

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::OrderStatus;

/// Errors produced by the supply chain core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Insufficient ingredients available: {}", .0.join("; "))]
    InsufficientIngredients(Vec<String>),

    #[error("Not enough quantity for {subject}: requested {requested}, available {available}")]
    InsufficientQuantity {
        subject: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Chain broken at: {0}")]
    DataIntegrity(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl DomainError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DomainError::InvalidArgument(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }
}

/// Result alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
