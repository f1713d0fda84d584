//! Trace service: loads an item's upstream lineage and walks it

use std::collections::BTreeSet;

use sqlx::PgPool;
use uuid::Uuid;

use shared::trace::{trace_order_item, SupplyChainTrace};
use shared::{InventoryBook, LotSource};

use super::rejected;
use crate::error::{AppError, AppResult};
use crate::store;

/// Upper bound on upstream hops loaded per item
const MAX_LINKS: usize = 8;

#[derive(Clone)]
pub struct TraceService {
    db: PgPool,
}

impl TraceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Trace every ingredient drawn by an order item back to its supplier
    pub async fn trace(&self, item_id: Uuid) -> AppResult<SupplyChainTrace> {
        // One snapshot for the whole walk; nothing is written
        let mut tx = self.db.begin().await?;
        let mut book = InventoryBook::new();

        let item = store::load_items(&mut tx, &mut book, &[item_id])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Order item {}", item_id)))?;
        store::load_catalog(&mut tx, &mut book, &[item.product_id]).await?;

        let mut records = store::load_item_consumptions(&mut tx, &mut book, item_id).await?;
        let mut materials: BTreeSet<Uuid> = records.iter().map(|r| r.material_id).collect();
        let mut suppliers = BTreeSet::new();

        for _ in 0..MAX_LINKS {
            if records.is_empty() {
                break;
            }
            let lot_ids: Vec<Uuid> = records.iter().map(|r| r.lot_id).collect();
            let lots = store::load_lots(&mut tx, &mut book, &lot_ids, false).await?;

            let mut upstream = Vec::new();
            for lot in &lots {
                match lot.source {
                    LotSource::Supplier { supplier_id } => {
                        suppliers.insert(supplier_id);
                    }
                    LotSource::Consumption { record_id } => upstream.push(record_id),
                }
            }
            records = store::load_consumptions(&mut tx, &mut book, &upstream).await?;
            materials.extend(records.iter().map(|r| r.material_id));
        }

        let suppliers: Vec<Uuid> = suppliers.into_iter().collect();
        store::load_suppliers(&mut tx, &mut book, &suppliers).await?;
        let materials: Vec<Uuid> = materials.into_iter().collect();
        store::load_materials(&mut tx, &mut book, &materials).await?;
        tx.rollback().await?;

        let trace = trace_order_item(&book, item_id).map_err(|e| rejected("trace_order_item", e))?;
        if !trace.is_complete() {
            tracing::warn!(item_id = %item_id, "Supply chain trace has broken links");
        }
        Ok(trace)
    }
}
