//! Stock lot models for every stage of the chain

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{Quantity, Unit};
use crate::validation::{validate_expiration_after_production, validate_quality_score};

/// A quantity-bearing batch of material at one stage of the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLot {
    pub id: Uuid,
    pub stage: StockStage,
    pub material_id: Uuid,
    /// Coordinator, workstation or restaurant holding the lot
    pub owner_id: Uuid,
    pub source: LotSource,
    pub initial_quantity: Quantity,
    pub current_quantity: Quantity,
    pub unit: Unit,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    /// Set when the lot is fully drawn down
    pub finished_at: Option<DateTime<Utc>>,
    pub storage_location: Option<String>,
    pub quality: Option<QualityCheck>,
    pub created_at: DateTime<Utc>,
}

/// Stage of a lot in the supply chain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StockStage {
    Raw,
    Prepared,
    Ready,
    Packaged,
    Restaurant,
}

impl StockStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStage::Raw => "raw",
            StockStage::Prepared => "prepared",
            StockStage::Ready => "ready",
            StockStage::Packaged => "packaged",
            StockStage::Restaurant => "restaurant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(StockStage::Raw),
            "prepared" => Some(StockStage::Prepared),
            "ready" => Some(StockStage::Ready),
            "packaged" => Some(StockStage::Packaged),
            "restaurant" => Some(StockStage::Restaurant),
            _ => None,
        }
    }

    /// The stage a lot of this stage is transferred into
    pub fn next(&self) -> Option<StockStage> {
        match self {
            StockStage::Raw => Some(StockStage::Prepared),
            StockStage::Prepared => Some(StockStage::Ready),
            StockStage::Ready => Some(StockStage::Packaged),
            StockStage::Packaged => Some(StockStage::Restaurant),
            StockStage::Restaurant => None,
        }
    }
}

impl std::fmt::Display for StockStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockStage::Raw => write!(f, "Raw Material"),
            StockStage::Prepared => write!(f, "Prepared Material"),
            StockStage::Ready => write!(f, "Ready Material"),
            StockStage::Packaged => write!(f, "Packaged Material"),
            StockStage::Restaurant => write!(f, "Restaurant Stock"),
        }
    }
}

/// Where the quantity of a lot came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LotSource {
    /// Received from a supplier
    Supplier { supplier_id: Uuid },
    /// Produced from the draw recorded by this consumption record
    Consumption { record_id: Uuid },
}

impl LotSource {
    pub fn kind(&self) -> &'static str {
        match self {
            LotSource::Supplier { .. } => "supplier",
            LotSource::Consumption { .. } => "consumption",
        }
    }

    pub fn reference_id(&self) -> Uuid {
        match self {
            LotSource::Supplier { supplier_id } => *supplier_id,
            LotSource::Consumption { record_id } => *record_id,
        }
    }

    pub fn from_parts(kind: &str, reference_id: Uuid) -> Option<Self> {
        match kind {
            "supplier" => Some(LotSource::Supplier {
                supplier_id: reference_id,
            }),
            "consumption" => Some(LotSource::Consumption {
                record_id: reference_id,
            }),
            _ => None,
        }
    }
}

/// Intake quality inspection of a raw lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityCheck {
    /// 0 to 10
    pub score: u8,
    pub status: QualityStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Accepted,
    Rejected,
}

impl QualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStatus::Accepted => "accepted",
            QualityStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(QualityStatus::Accepted),
            "rejected" => Some(QualityStatus::Rejected),
            _ => None,
        }
    }
}

/// Input for creating a lot
#[derive(Debug, Clone)]
pub struct NewStockLot {
    pub stage: StockStage,
    pub material_id: Uuid,
    pub owner_id: Uuid,
    pub source: LotSource,
    pub initial_quantity: Quantity,
    /// Defaults to the initial quantity
    pub current_quantity: Option<Quantity>,
    pub unit: Unit,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub storage_location: Option<String>,
    pub quality: Option<QualityCheck>,
}

impl StockLot {
    /// Build a lot, enforcing `0 <= current <= initial`
    pub fn create(id: Uuid, input: NewStockLot, now: DateTime<Utc>) -> DomainResult<Self> {
        if input.initial_quantity < Decimal::ZERO {
            return Err(DomainError::invalid("Initial quantity cannot be negative"));
        }

        let current_quantity = input.current_quantity.unwrap_or(input.initial_quantity);
        if current_quantity < Decimal::ZERO || current_quantity > input.initial_quantity {
            return Err(DomainError::invalid(format!(
                "Current quantity {} must be between 0 and the initial quantity {}",
                current_quantity, input.initial_quantity
            )));
        }

        validate_expiration_after_production(input.production_date, input.expiration_date)
            .map_err(DomainError::invalid)?;

        if let Some(quality) = &input.quality {
            validate_quality_score(quality.score).map_err(DomainError::invalid)?;
        }

        let finished_at = if current_quantity.is_zero() {
            Some(now)
        } else {
            None
        };

        Ok(StockLot {
            id,
            stage: input.stage,
            material_id: input.material_id,
            owner_id: input.owner_id,
            source: input.source,
            initial_quantity: input.initial_quantity,
            current_quantity,
            unit: input.unit,
            production_date: input.production_date,
            expiration_date: input.expiration_date,
            finished_at,
            storage_location: input.storage_location,
            quality: input.quality,
            created_at: now,
        })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            self.quality,
            Some(QualityCheck {
                status: QualityStatus::Rejected,
                ..
            })
        )
    }

    /// True while nothing has been drawn from the lot
    pub fn is_untouched(&self) -> bool {
        self.current_quantity == self.initial_quantity
    }
}
