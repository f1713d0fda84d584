//! Upstream supply stages: intake, preparation, packaging and delivery
//!
//! Every stage transfer draws from one upstream lot, records the draw and
//! creates the downstream lot sourced from that record. Reversal is only
//! possible while the downstream lot has not been used.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::availability::today;
use crate::book::InventoryBook;
use crate::error::{DomainError, DomainResult};
use crate::models::{
    ConsumptionRecord, Consumer, LotSource, NewStockLot, QualityCheck, Role, StockLot, StockStage,
};
use crate::types::{Quantity, Unit};
use crate::validation::{validate_positive_quantity, validate_units_match, validate_yield};

/// Supplier delivery of raw material
#[derive(Debug, Clone)]
pub struct RawIntake {
    pub supplier_id: Uuid,
    pub coordinator_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Quantity,
    pub unit: Unit,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub storage_location: Option<String>,
    pub quality: Option<QualityCheck>,
}

/// One draw from an upstream lot into the next stage
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub upstream_lot_id: Uuid,
    pub consumer: Consumer,
    pub consumed: Quantity,
    pub produced: Quantity,
    /// Defaults to the upstream lot's unit
    pub unit: Option<Unit>,
    pub production_date: Option<NaiveDate>,
    /// Defaults to the upstream lot's expiration
    pub expiration_date: Option<NaiveDate>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
}

impl TransferRequest {
    pub fn new(upstream_lot_id: Uuid, consumer: Consumer, consumed: Quantity, produced: Quantity) -> Self {
        TransferRequest {
            upstream_lot_id,
            consumer,
            consumed,
            produced,
            unit: None,
            production_date: None,
            expiration_date: None,
            storage_location: None,
            notes: None,
        }
    }
}

/// Ids written by a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub record_id: Uuid,
    pub lot_id: Uuid,
}

impl InventoryBook {
    /// Register a supplier delivery as a raw lot held by the coordinator
    pub fn receive_raw_material(&mut self, intake: RawIntake, now: DateTime<Utc>) -> DomainResult<Uuid> {
        self.transaction(|book| {
            if book.supplier(intake.supplier_id).is_none() {
                return Err(DomainError::not_found(format!("Supplier {}", intake.supplier_id)));
            }
            if book.material(intake.material_id).is_none() {
                return Err(DomainError::not_found(format!("Material {}", intake.material_id)));
            }
            book.require_user(intake.coordinator_id)?
                .require_role(Role::InventoryCoordinator)?;
            validate_positive_quantity(intake.quantity).map_err(DomainError::invalid)?;

            let lot = StockLot::create(
                Uuid::new_v4(),
                NewStockLot {
                    stage: StockStage::Raw,
                    material_id: intake.material_id,
                    owner_id: intake.coordinator_id,
                    source: LotSource::Supplier {
                        supplier_id: intake.supplier_id,
                    },
                    initial_quantity: intake.quantity,
                    current_quantity: None,
                    unit: intake.unit,
                    production_date: intake.production_date,
                    expiration_date: intake.expiration_date,
                    storage_location: intake.storage_location,
                    quality: intake.quality,
                },
                now,
            )?;
            let id = lot.id;
            book.save_lot(lot);
            Ok(id)
        })
    }

    /// Move quantity one stage down the chain
    pub fn transfer(&mut self, request: TransferRequest, now: DateTime<Utc>) -> DomainResult<TransferOutcome> {
        self.transaction(|book| {
            let upstream = book.require_lot(request.upstream_lot_id)?.clone();
            let stage = upstream.stage.next().ok_or_else(|| {
                DomainError::invalid(format!(
                    "{} lot {} cannot be transferred further",
                    upstream.stage, upstream.id
                ))
            })?;

            let owner_id = book.authorize_step(stage, &request.consumer)?;

            if upstream.is_rejected() {
                return Err(DomainError::invalid(format!(
                    "Raw lot {} was rejected at intake",
                    upstream.id
                )));
            }
            if upstream.is_expired(today(now)) {
                return Err(DomainError::invalid(format!("Lot {} has expired", upstream.id)));
            }
            let unit = request.unit.unwrap_or(upstream.unit);
            validate_units_match(upstream.unit, unit).map_err(DomainError::invalid)?;
            validate_positive_quantity(request.consumed).map_err(DomainError::invalid)?;
            validate_yield(request.consumed, request.produced).map_err(DomainError::invalid)?;

            book.lot_mut(upstream.id)?.reduce(request.consumed, now)?;
            book.touch_lot(upstream.id);

            let record = ConsumptionRecord {
                id: Uuid::new_v4(),
                consumer: request.consumer,
                lot_id: upstream.id,
                material_id: upstream.material_id,
                quantity: request.consumed,
                consumed_at: now,
                notes: request.notes,
            };
            let record_id = record.id;
            book.record_consumption(record);

            let lot = StockLot::create(
                Uuid::new_v4(),
                NewStockLot {
                    stage,
                    material_id: upstream.material_id,
                    owner_id,
                    source: LotSource::Consumption { record_id },
                    initial_quantity: request.produced,
                    current_quantity: None,
                    unit,
                    production_date: request.production_date,
                    expiration_date: request.expiration_date.or(upstream.expiration_date),
                    storage_location: request.storage_location,
                    quality: None,
                },
                now,
            )?;
            let lot_id = lot.id;
            book.save_lot(lot);

            Ok(TransferOutcome { record_id, lot_id })
        })
    }

    /// Raw material processed at a workstation
    pub fn prepare_at_workstation(
        &mut self,
        raw_lot_id: Uuid,
        workstation_id: Uuid,
        worker_id: Uuid,
        consumed: Quantity,
        produced: Quantity,
        now: DateTime<Utc>,
    ) -> DomainResult<TransferOutcome> {
        self.expect_stage(raw_lot_id, StockStage::Raw)?;
        let consumer = Consumer::Workstation {
            workstation_id,
            worker_id,
        };
        self.transfer(TransferRequest::new(raw_lot_id, consumer, consumed, produced), now)
    }

    /// Prepared material finished and ready for packaging
    pub fn mark_ready(
        &mut self,
        prepared_lot_id: Uuid,
        workstation_id: Uuid,
        worker_id: Uuid,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DomainResult<TransferOutcome> {
        self.expect_stage(prepared_lot_id, StockStage::Prepared)?;
        let consumer = Consumer::Workstation {
            workstation_id,
            worker_id,
        };
        self.transfer(TransferRequest::new(prepared_lot_id, consumer, quantity, quantity), now)
    }

    pub fn package(
        &mut self,
        ready_lot_id: Uuid,
        coordinator_id: Uuid,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DomainResult<TransferOutcome> {
        self.expect_stage(ready_lot_id, StockStage::Ready)?;
        let consumer = Consumer::Packaging { coordinator_id };
        self.transfer(TransferRequest::new(ready_lot_id, consumer, quantity, quantity), now)
    }

    pub fn deliver_to_restaurant(
        &mut self,
        packaged_lot_id: Uuid,
        restaurant_id: Uuid,
        transporter_id: Uuid,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> DomainResult<TransferOutcome> {
        self.expect_stage(packaged_lot_id, StockStage::Packaged)?;
        let consumer = Consumer::Delivery {
            restaurant_id,
            transporter_id,
        };
        self.transfer(TransferRequest::new(packaged_lot_id, consumer, quantity, quantity), now)
    }

    /// Undo a stage transfer whose downstream lot is still untouched
    pub fn reverse_transfer(&mut self, record_id: Uuid) -> DomainResult<Quantity> {
        self.transaction(|book| {
            let record = book
                .consumption(record_id)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("Consumption record {}", record_id)))?;
            if let Consumer::OrderItem { order_item_id } = record.consumer {
                return Err(DomainError::invalid(format!(
                    "Record {} belongs to order item {}; change the order instead",
                    record_id, order_item_id
                )));
            }

            let downstream = book
                .lots
                .values()
                .find(|lot| lot.source == LotSource::Consumption { record_id })
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("Lot produced by record {}", record_id)))?;
            if !downstream.is_untouched() || !book.consumptions_of_lot(downstream.id).is_empty() {
                return Err(DomainError::invalid(format!(
                    "Lot {} has already been used and cannot be reversed",
                    downstream.id
                )));
            }

            book.lot_mut(record.lot_id)?.increase(record.quantity)?;
            book.touch_lot(record.lot_id);
            book.delete_lot(downstream.id);
            book.delete_consumption(record_id);
            Ok(record.quantity)
        })
    }

    /// Signed manual correction of a lot's current quantity.
    ///
    /// A top-up may not take the headroom that live consumption records of
    /// the lot need to be restored.
    pub fn adjust_lot(&mut self, lot_id: Uuid, delta: Decimal, now: DateTime<Utc>) -> DomainResult<Quantity> {
        self.transaction(|book| {
            if delta > Decimal::ZERO {
                let lot = book.require_lot(lot_id)?;
                let held: Quantity = book
                    .consumptions_of_lot(lot_id)
                    .iter()
                    .map(|record| record.quantity)
                    .sum();
                let headroom = lot.initial_quantity - lot.current_quantity - held;
                if delta > headroom {
                    return Err(DomainError::invalid(format!(
                        "Increasing lot {} by {} would leave no room to restore {} held by consumption records (headroom {})",
                        lot_id, delta, held, headroom
                    )));
                }
            }
            let lot = book.lot_mut(lot_id)?;
            lot.adjust(delta, now)?;
            let current = lot.current_quantity;
            book.touch_lot(lot_id);
            Ok(current)
        })
    }

    fn expect_stage(&self, lot_id: Uuid, stage: StockStage) -> DomainResult<()> {
        let lot = self.require_lot(lot_id)?;
        if lot.stage != stage {
            return Err(DomainError::invalid(format!(
                "Lot {} is at stage {}, expected {}",
                lot_id, lot.stage, stage
            )));
        }
        Ok(())
    }

    /// Check the consumer may produce `stage` and return the new lot's owner
    fn authorize_step(&self, stage: StockStage, consumer: &Consumer) -> DomainResult<Uuid> {
        match (stage, consumer) {
            (
                StockStage::Prepared | StockStage::Ready,
                Consumer::Workstation {
                    workstation_id,
                    worker_id,
                },
            ) => {
                if self.workstation(*workstation_id).is_none() {
                    return Err(DomainError::not_found(format!("Workstation {}", workstation_id)));
                }
                self.require_user(*worker_id)?.require_role(Role::Worker)?;
                Ok(*workstation_id)
            }
            (StockStage::Packaged, Consumer::Packaging { coordinator_id }) => {
                self.require_user(*coordinator_id)?
                    .require_role(Role::InventoryCoordinator)?;
                Ok(*coordinator_id)
            }
            (
                StockStage::Restaurant,
                Consumer::Delivery {
                    restaurant_id,
                    transporter_id,
                },
            ) => {
                if self.restaurant(*restaurant_id).is_none() {
                    return Err(DomainError::not_found(format!("Restaurant {}", restaurant_id)));
                }
                self.require_user(*transporter_id)?
                    .require_role(Role::Transporter)?;
                Ok(*restaurant_id)
            }
            (stage, consumer) => Err(DomainError::invalid(format!(
                "A {} step cannot produce {} stock",
                consumer.kind(),
                stage
            ))),
        }
    }
}
