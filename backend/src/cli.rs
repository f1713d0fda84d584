//! Command line surface of the ledger

use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use shared::{OrderStatus, QualityStatus, Unit};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::order::{AddItemInput, CreateOrderInput, UpdateItemInput};
use crate::services::stock::{AdjustInput, ReceiveInput, TransferInput, TransferStep};
use crate::services::{OrderService, StockService, TraceService};

#[derive(Parser, Debug)]
#[command(name = "scm", about = "Food supply chain inventory ledger", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,
    #[command(subcommand)]
    Order(OrderCommand),
    #[command(subcommand)]
    Stock(StockCommand),
    /// Trace an order item back to its suppliers
    Trace {
        #[arg(help = "Order item identifier (UUID)")]
        item_id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    /// Open a pending order at a restaurant
    Create {
        #[arg(long)]
        restaurant: Uuid,
        #[arg(long)]
        customer: Option<Uuid>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Move an order to another status
    Status {
        order_id: Uuid,
        #[arg(value_parser = parse_status, help = "pending, confirmed, preparing, ready, delivered or cancelled")]
        status: OrderStatus,
    },
    AddItem(AddItemArgs),
    UpdateItem(UpdateItemArgs),
    RemoveItem {
        item_id: Uuid,
    },
    /// Show an order with its items and consumption records
    Show {
        order_id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct AddItemArgs {
    #[arg(long)]
    order: Uuid,
    #[arg(long)]
    product: Uuid,
    #[arg(long)]
    quantity: u32,
    #[arg(long, value_parser = parse_decimal, help = "Defaults to the product's selling price")]
    price: Option<Decimal>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateItemArgs {
    item_id: Uuid,
    #[arg(long)]
    product: Option<Uuid>,
    #[arg(long)]
    quantity: Option<u32>,
    #[arg(long, value_parser = parse_decimal)]
    price: Option<Decimal>,
}

#[derive(Subcommand, Debug)]
pub enum StockCommand {
    Receive(ReceiveArgs),
    Transfer(TransferArgs),
    /// Undo a transfer by its consumption record
    Reverse {
        record_id: Uuid,
    },
    /// Correct a lot by a signed amount
    Adjust {
        lot_id: Uuid,
        #[arg(value_parser = parse_decimal, allow_hyphen_values = true)]
        delta: Decimal,
    },
    /// Usable restaurant stock of a material
    Available {
        #[arg(long)]
        material: Uuid,
        #[arg(long)]
        restaurant: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[arg(long)]
    supplier: Uuid,
    #[arg(long)]
    coordinator: Uuid,
    #[arg(long)]
    material: Uuid,
    #[arg(long, value_parser = parse_decimal)]
    quantity: Decimal,
    #[arg(long, value_parser = parse_unit)]
    unit: Unit,
    #[arg(long)]
    produced_on: Option<NaiveDate>,
    #[arg(long)]
    expires_on: Option<NaiveDate>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long, requires = "quality_status")]
    quality_score: Option<u8>,
    #[arg(long, value_parser = parse_quality, requires = "quality_score")]
    quality_status: Option<QualityStatus>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Step {
    Prepare,
    Ready,
    Package,
    Deliver,
}

impl From<Step> for TransferStep {
    fn from(step: Step) -> Self {
        match step {
            Step::Prepare => TransferStep::Prepare,
            Step::Ready => TransferStep::Ready,
            Step::Package => TransferStep::Package,
            Step::Deliver => TransferStep::Deliver,
        }
    }
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[arg(value_enum)]
    step: Step,
    #[arg(long)]
    lot: Uuid,
    #[arg(long, help = "Worker, coordinator or transporter performing the step")]
    actor: Uuid,
    #[arg(long, help = "Required for prepare and ready")]
    workstation: Option<Uuid>,
    #[arg(long, help = "Required for deliver")]
    restaurant: Option<Uuid>,
    #[arg(long, value_parser = parse_decimal)]
    consumed: Decimal,
    #[arg(long, value_parser = parse_decimal, help = "Defaults to the consumed quantity")]
    produced: Option<Decimal>,
    #[arg(long)]
    expires_on: Option<NaiveDate>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

/// Run one command against the database and return its JSON result
pub async fn dispatch(command: Command, db: PgPool, config: &Config) -> AppResult<Value> {
    let lock_timeout_ms = config.inventory.lock_timeout_ms;
    match command {
        Command::Migrate => {
            sqlx::migrate!("./migrations").run(&db).await?;
            tracing::info!("Migrations completed");
            Ok(serde_json::json!({ "migrated": true }))
        }
        Command::Order(command) => run_order(command, OrderService::new(db, lock_timeout_ms)).await,
        Command::Stock(command) => run_stock(command, StockService::new(db, lock_timeout_ms)).await,
        Command::Trace { item_id } => to_json(TraceService::new(db).trace(item_id).await?),
    }
}

async fn run_order(command: OrderCommand, service: OrderService) -> AppResult<Value> {
    match command {
        OrderCommand::Create {
            restaurant,
            customer,
            note,
        } => to_json(
            service
                .create_order(CreateOrderInput {
                    restaurant_id: restaurant,
                    customer_id: customer,
                    note,
                })
                .await?,
        ),
        OrderCommand::Status { order_id, status } => to_json(service.set_status(order_id, status).await?),
        OrderCommand::AddItem(args) => to_json(
            service
                .add_item(AddItemInput {
                    order_id: args.order,
                    product_id: args.product,
                    quantity: args.quantity,
                    unit_price: args.price,
                    note: args.note,
                })
                .await?,
        ),
        OrderCommand::UpdateItem(args) => to_json(
            service
                .update_item(UpdateItemInput {
                    item_id: args.item_id,
                    product_id: args.product,
                    quantity: args.quantity,
                    unit_price: args.price,
                })
                .await?,
        ),
        OrderCommand::RemoveItem { item_id } => to_json(service.remove_item(item_id).await?),
        OrderCommand::Show { order_id } => to_json(service.get_order(order_id).await?),
    }
}

async fn run_stock(command: StockCommand, service: StockService) -> AppResult<Value> {
    match command {
        StockCommand::Receive(args) => to_json(
            service
                .receive(ReceiveInput {
                    supplier_id: args.supplier,
                    coordinator_id: args.coordinator,
                    material_id: args.material,
                    quantity: args.quantity,
                    unit: args.unit,
                    production_date: args.produced_on,
                    expiration_date: args.expires_on,
                    storage_location: args.location,
                    quality_score: args.quality_score,
                    quality_status: args.quality_status,
                })
                .await?,
        ),
        StockCommand::Transfer(args) => to_json(
            service
                .transfer(TransferInput {
                    lot_id: args.lot,
                    step: args.step.into(),
                    actor_id: args.actor,
                    workstation_id: args.workstation,
                    restaurant_id: args.restaurant,
                    consumed: args.consumed,
                    produced: args.produced,
                    expiration_date: args.expires_on,
                    storage_location: args.location,
                    notes: args.notes,
                })
                .await?,
        ),
        StockCommand::Reverse { record_id } => to_json(service.reverse(record_id).await?),
        StockCommand::Adjust { lot_id, delta } => to_json(service.adjust(AdjustInput { lot_id, delta }).await?),
        StockCommand::Available { material, restaurant } => to_json(service.available(material, restaurant).await?),
    }
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::InternalError(e.into()))
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw).map_err(|_| format!("invalid decimal '{raw}'"))
}

fn parse_status(raw: &str) -> Result<OrderStatus, String> {
    OrderStatus::from_str(&raw.to_lowercase()).ok_or_else(|| format!("unknown order status '{raw}'"))
}

fn parse_unit(raw: &str) -> Result<Unit, String> {
    Unit::from_str(&raw.to_lowercase()).ok_or_else(|| format!("unknown unit '{raw}'"))
}

fn parse_quality(raw: &str) -> Result<QualityStatus, String> {
    QualityStatus::from_str(&raw.to_lowercase()).ok_or_else(|| format!("unknown quality status '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_parsing_ignores_case() {
        assert_eq!(parse_status("Confirmed"), Ok(OrderStatus::Confirmed));
        assert_eq!(parse_status("cancelled"), Ok(OrderStatus::Cancelled));
        assert!(parse_status("shipped").is_err());
    }

    #[test]
    fn test_negative_adjustment_is_accepted() {
        let lot = Uuid::new_v4();
        let cli = Cli::try_parse_from(["scm", "stock", "adjust", &lot.to_string(), "-2.5"]).unwrap();
        match cli.command {
            Command::Stock(StockCommand::Adjust { lot_id, delta }) => {
                assert_eq!(lot_id, lot);
                assert_eq!(delta, Decimal::from_str("-2.5").unwrap());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_transfer_step_maps_to_upstream_stage() {
        let cli = Cli::try_parse_from([
            "scm",
            "stock",
            "transfer",
            "deliver",
            "--lot",
            &Uuid::new_v4().to_string(),
            "--actor",
            &Uuid::new_v4().to_string(),
            "--restaurant",
            &Uuid::new_v4().to_string(),
            "--consumed",
            "40",
        ])
        .unwrap();
        match cli.command {
            Command::Stock(StockCommand::Transfer(args)) => {
                let step: TransferStep = args.step.into();
                assert_eq!(step.upstream_stage(), shared::StockStage::Packaged);
                assert_eq!(args.produced, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
