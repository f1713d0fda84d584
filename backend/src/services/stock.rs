//! Stock service: intake, stage transfers, reversals and corrections

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::allocator::eligible_lots;
use shared::availability::{available_quantity, today};
use shared::supply::{RawIntake, TransferOutcome, TransferRequest};
use shared::{
    Consumer, InventoryBook, QualityCheck, QualityStatus, StockLot, StockStage, Unit,
};

use super::{begin, non_zero_delta, positive_quantity, rejected};
use crate::error::{AppError, AppResult};
use crate::store;

/// Stock service for upstream supply stages
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    lock_timeout_ms: u64,
}

/// Input for receiving raw material from a supplier
#[derive(Debug, Validate)]
pub struct ReceiveInput {
    pub supplier_id: Uuid,
    pub coordinator_id: Uuid,
    pub material_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    pub unit: Unit,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub storage_location: Option<String>,
    #[validate(range(max = 10))]
    pub quality_score: Option<u8>,
    pub quality_status: Option<QualityStatus>,
}

/// Which stage step a transfer performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    Prepare,
    Ready,
    Package,
    Deliver,
}

impl TransferStep {
    /// Stage the upstream lot must be at
    pub fn upstream_stage(&self) -> StockStage {
        match self {
            TransferStep::Prepare => StockStage::Raw,
            TransferStep::Ready => StockStage::Prepared,
            TransferStep::Package => StockStage::Ready,
            TransferStep::Deliver => StockStage::Packaged,
        }
    }
}

/// Input for moving stock one stage down the chain
#[derive(Debug, Validate)]
pub struct TransferInput {
    pub lot_id: Uuid,
    pub step: TransferStep,
    pub actor_id: Uuid,
    pub workstation_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    #[validate(custom = "positive_quantity")]
    pub consumed: Decimal,
    /// Defaults to the consumed quantity
    #[validate(custom = "positive_quantity")]
    pub produced: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub storage_location: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Input for a manual correction
#[derive(Debug, Validate)]
pub struct AdjustInput {
    pub lot_id: Uuid,
    #[validate(custom = "non_zero_delta")]
    pub delta: Decimal,
}

/// Lots created or changed by a transfer
#[derive(Debug, Serialize)]
pub struct TransferResult {
    #[serde(flatten)]
    pub outcome: TransferOutcome,
    pub upstream: StockLot,
    pub downstream: StockLot,
}

/// Result of reversing a transfer
#[derive(Debug, Serialize)]
pub struct ReversalResult {
    pub record_id: Uuid,
    pub restored_quantity: Decimal,
    pub upstream: StockLot,
}

/// Restaurant stock of one material
#[derive(Debug, Serialize)]
pub struct Availability {
    pub material_id: Uuid,
    pub restaurant_id: Uuid,
    pub available: Decimal,
    /// Lots in the order they would be drawn
    pub lots: Vec<StockLot>,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        Self { db, lock_timeout_ms }
    }

    /// Register a supplier delivery as a raw lot
    pub async fn receive(&self, input: ReceiveInput) -> AppResult<StockLot> {
        input.validate()?;
        let quality = match (input.quality_score, input.quality_status) {
            (Some(score), Some(status)) => Some(QualityCheck { score, status }),
            (None, None) => None,
            _ => {
                return Err(AppError::ValidationError(
                    "Quality score and status must be given together".to_string(),
                ))
            }
        };

        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        store::load_suppliers(&mut tx, &mut book, &[input.supplier_id]).await?;
        store::load_users(&mut tx, &mut book, &[input.coordinator_id]).await?;
        store::load_materials(&mut tx, &mut book, &[input.material_id]).await?;

        let lot_id = book
            .receive_raw_material(
                RawIntake {
                    supplier_id: input.supplier_id,
                    coordinator_id: input.coordinator_id,
                    material_id: input.material_id,
                    quantity: input.quantity,
                    unit: input.unit,
                    production_date: input.production_date,
                    expiration_date: input.expiration_date,
                    storage_location: input.storage_location,
                    quality,
                },
                Utc::now(),
            )
            .map_err(|e| rejected("receive_raw_material", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot_id,
            supplier_id = %input.supplier_id,
            quantity = %input.quantity,
            "Raw material received"
        );
        lot(&book, lot_id)
    }

    /// Draw from an upstream lot into the next stage
    pub async fn transfer(&self, input: TransferInput) -> AppResult<TransferResult> {
        input.validate()?;

        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        let upstream = store::load_lots(&mut tx, &mut book, &[input.lot_id], true)
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Stock lot {}", input.lot_id)))?;

        let expected = input.step.upstream_stage();
        if upstream.stage != expected {
            return Err(AppError::ValidationError(format!(
                "Lot {} is at stage {}, {:?} needs a {} lot",
                upstream.id, upstream.stage, input.step, expected
            )));
        }

        let consumer = match input.step {
            TransferStep::Prepare | TransferStep::Ready => {
                let workstation_id = input
                    .workstation_id
                    .ok_or_else(|| AppError::ValidationError("A workstation is required".to_string()))?;
                store::load_workstation(&mut tx, &mut book, workstation_id).await?;
                Consumer::Workstation {
                    workstation_id,
                    worker_id: input.actor_id,
                }
            }
            TransferStep::Package => Consumer::Packaging {
                coordinator_id: input.actor_id,
            },
            TransferStep::Deliver => {
                let restaurant_id = input
                    .restaurant_id
                    .ok_or_else(|| AppError::ValidationError("A restaurant is required".to_string()))?;
                store::load_restaurant(&mut tx, &mut book, restaurant_id).await?;
                Consumer::Delivery {
                    restaurant_id,
                    transporter_id: input.actor_id,
                }
            }
        };
        store::load_users(&mut tx, &mut book, &[input.actor_id]).await?;

        let mut request = TransferRequest::new(
            input.lot_id,
            consumer,
            input.consumed,
            input.produced.unwrap_or(input.consumed),
        );
        request.expiration_date = input.expiration_date;
        request.storage_location = input.storage_location;
        request.notes = input.notes;

        let outcome = book
            .transfer(request, Utc::now())
            .map_err(|e| rejected("transfer", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(
            upstream = %input.lot_id,
            downstream = %outcome.lot_id,
            record_id = %outcome.record_id,
            consumed = %input.consumed,
            "Stock transferred"
        );

        Ok(TransferResult {
            outcome,
            upstream: lot(&book, input.lot_id)?,
            downstream: lot(&book, outcome.lot_id)?,
        })
    }

    /// Undo a transfer whose downstream lot is still untouched
    pub async fn reverse(&self, record_id: Uuid) -> AppResult<ReversalResult> {
        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        let record = store::load_consumptions(&mut tx, &mut book, &[record_id])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Consumption record {}", record_id)))?;
        store::load_lots(&mut tx, &mut book, &[record.lot_id], true).await?;
        if let Some(downstream) = store::lock_lot_produced_by(&mut tx, &mut book, record_id).await? {
            store::load_consumptions_of_lots(&mut tx, &mut book, &[downstream.id]).await?;
        }

        let restored_quantity = book
            .reverse_transfer(record_id)
            .map_err(|e| rejected("reverse_transfer", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(record_id = %record_id, restored = %restored_quantity, "Transfer reversed");
        Ok(ReversalResult {
            record_id,
            restored_quantity,
            upstream: lot(&book, record.lot_id)?,
        })
    }

    /// Apply a signed correction to a lot
    pub async fn adjust(&self, input: AdjustInput) -> AppResult<StockLot> {
        input.validate()?;

        let mut tx = begin(&self.db, self.lock_timeout_ms).await?;
        let mut book = InventoryBook::new();
        store::load_lots(&mut tx, &mut book, &[input.lot_id], true).await?;
        store::load_consumptions_of_lots(&mut tx, &mut book, &[input.lot_id]).await?;

        book.adjust_lot(input.lot_id, input.delta, Utc::now())
            .map_err(|e| rejected("adjust_lot", e))?;
        store::persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(lot_id = %input.lot_id, delta = %input.delta, "Lot adjusted");
        lot(&book, input.lot_id)
    }

    /// Non-expired restaurant stock of a material, in draw order
    pub async fn available(&self, material_id: Uuid, restaurant_id: Uuid) -> AppResult<Availability> {
        let mut conn = self.db.acquire().await?;
        let mut book = InventoryBook::new();
        store::load_restaurant(&mut conn, &mut book, restaurant_id).await?;
        store::load_restaurant_lots(&mut conn, &mut book, restaurant_id, false).await?;

        let today = today(Utc::now());
        Ok(Availability {
            material_id,
            restaurant_id,
            available: available_quantity(&book, material_id, restaurant_id, today),
            lots: eligible_lots(&book, material_id, restaurant_id, today)
                .into_iter()
                .cloned()
                .collect(),
        })
    }
}

fn lot(book: &InventoryBook, id: Uuid) -> AppResult<StockLot> {
    book.lot(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Stock lot {}", id)))
}
