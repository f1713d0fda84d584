//! Error handling for the supply chain ledger
//!
//! Every failure is reported to the operator as a stable code plus message.

use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Postgres SQLSTATE for `lock_timeout` expiry
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Business rule errors raised by the shared core
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A stored row could not be turned back into a domain value
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Internal errors
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl AppError {
    /// Stable machine readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(err) => match err {
                DomainError::InvalidTransition { .. } => "INVALID_STATE_TRANSITION",
                DomainError::InsufficientIngredients(_) => "INSUFFICIENT_INGREDIENTS",
                DomainError::InsufficientQuantity { .. } => "INSUFFICIENT_QUANTITY",
                DomainError::InvalidArgument(_) => "VALIDATION_ERROR",
                DomainError::DataIntegrity(_) => "DATA_INTEGRITY",
                DomainError::NotFound(_) => "NOT_FOUND",
            },
            AppError::Validation(_) | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DataIntegrity(_) => "DATA_INTEGRITY",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(err) if is_lock_timeout(err) => "LOCK_TIMEOUT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Migration(_) => "MIGRATION_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Process exit status: 2 for rejected input, 1 for everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Domain(_)
            | AppError::Validation(_)
            | AppError::ValidationError(_)
            | AppError::NotFound(_) => 2,
            _ => 1,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            AppError::DatabaseError(err) if is_lock_timeout(err) => {
                "Timed out waiting for stock locks; retry the operation".to_string()
            }
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };
        let details = match self {
            AppError::Domain(DomainError::InsufficientIngredients(messages)) => messages.clone(),
            _ => Vec::new(),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message,
                details,
            },
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

fn is_lock_timeout(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == LOCK_NOT_AVAILABLE)
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::OrderStatus;

    #[test]
    fn test_domain_errors_map_to_stable_codes() {
        let cases = [
            (
                DomainError::InvalidTransition {
                    from: OrderStatus::Pending,
                    to: OrderStatus::Ready,
                },
                "INVALID_STATE_TRANSITION",
            ),
            (
                DomainError::InsufficientIngredients(vec!["Rice: Required 10, Available 5".into()]),
                "INSUFFICIENT_INGREDIENTS",
            ),
            (
                DomainError::InsufficientQuantity {
                    subject: "lot".into(),
                    requested: Decimal::from(2),
                    available: Decimal::ONE,
                },
                "INSUFFICIENT_QUANTITY",
            ),
            (DomainError::invalid("bad"), "VALIDATION_ERROR"),
            (DomainError::not_found("Order x"), "NOT_FOUND"),
        ];

        for (err, code) in cases {
            let app: AppError = err.into();
            assert_eq!(app.code(), code);
            assert_eq!(app.exit_code(), 2);
        }
    }

    #[test]
    fn test_shortfalls_are_listed_in_details() {
        let app: AppError = DomainError::InsufficientIngredients(vec![
            "Rice: Required 10, Available 5".into(),
            "Egg: Required 2, Available 0".into(),
        ])
        .into();

        let json = serde_json::to_value(app.to_response()).unwrap();
        assert_eq!(json["error"]["code"], "INSUFFICIENT_INGREDIENTS");
        assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Rice: Required 10, Available 5; Egg"));
    }

    #[test]
    fn test_database_errors_hide_internals() {
        let app = AppError::DatabaseError(sqlx::Error::RowNotFound);
        let response = app.to_response();
        assert_eq!(response.error.code, "DATABASE_ERROR");
        assert_eq!(response.error.message, "A database error occurred");
        assert_eq!(app.exit_code(), 1);
    }
}
