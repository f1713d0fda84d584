//! Supply-chain trace from an order item back to its suppliers

use serde::Serialize;
use uuid::Uuid;

use crate::book::InventoryBook;
use crate::error::{DomainError, DomainResult};
use crate::models::{ConsumptionRecord, LotSource, StockLot, Supplier};

/// A chain never has more links than there are stages
const MAX_DEPTH: usize = 8;

/// Full lineage of every ingredient drawn by one order item
#[derive(Debug, Clone, Serialize)]
pub struct SupplyChainTrace {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_name: String,
    pub chains: Vec<MaterialChain>,
}

/// Lineage of one consumption record
#[derive(Debug, Clone, Serialize)]
pub struct MaterialChain {
    pub material_id: Uuid,
    pub material_name: String,
    pub consumption: ConsumptionRecord,
    /// Downstream first: restaurant lot, packaged, ready, prepared, raw
    pub steps: Vec<TraceStep>,
    pub supplier: Option<Supplier>,
    pub error: Option<String>,
}

/// A lot in the chain and the draw that was taken from it
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub lot: StockLot,
    pub drawn_by: ConsumptionRecord,
}

impl SupplyChainTrace {
    pub fn is_complete(&self) -> bool {
        self.chains.iter().all(|chain| chain.error.is_none())
    }
}

/// Walk each of the item's records back through every upstream lot.
/// A broken link marks that chain only.
pub fn trace_order_item(book: &InventoryBook, item_id: Uuid) -> DomainResult<SupplyChainTrace> {
    let item = book.require_item(item_id)?;
    let product_name = book
        .product(item.product_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("Product ID {}", item.product_id));

    let chains = book
        .consumptions_for_item(item_id)
        .into_iter()
        .map(|record| trace_record(book, record))
        .collect();

    Ok(SupplyChainTrace {
        order_item_id: item.id,
        order_id: item.order_id,
        product_name,
        chains,
    })
}

fn trace_record(book: &InventoryBook, record: &ConsumptionRecord) -> MaterialChain {
    let mut chain = MaterialChain {
        material_id: record.material_id,
        material_name: book.material_name(record.material_id),
        consumption: record.clone(),
        steps: Vec::new(),
        supplier: None,
        error: None,
    };

    match walk(book, record, &mut chain.steps) {
        Ok(supplier) => chain.supplier = Some(supplier),
        Err(err) => chain.error = Some(err.to_string()),
    }
    chain
}

fn walk(book: &InventoryBook, record: &ConsumptionRecord, steps: &mut Vec<TraceStep>) -> DomainResult<Supplier> {
    let mut draw = record.clone();
    for _ in 0..MAX_DEPTH {
        let lot = book
            .lot(draw.lot_id)
            .cloned()
            .ok_or_else(|| broken(format!("stock lot {}", draw.lot_id)))?;
        let source = lot.source;
        steps.push(TraceStep {
            lot,
            drawn_by: draw,
        });

        match source {
            LotSource::Supplier { supplier_id } => {
                return book
                    .supplier(supplier_id)
                    .cloned()
                    .ok_or_else(|| broken(format!("supplier {}", supplier_id)));
            }
            LotSource::Consumption { record_id } => {
                draw = book
                    .consumption(record_id)
                    .cloned()
                    .ok_or_else(|| broken(format!("consumption record {}", record_id)))?;
            }
        }
    }
    Err(broken(format!("lot {} after {} links", draw.lot_id, MAX_DEPTH)))
}

fn broken(what: String) -> DomainError {
    DomainError::DataIntegrity(what)
}
