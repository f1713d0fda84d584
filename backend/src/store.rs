//! PostgreSQL persistence for the inventory book
//!
//! Loaders hydrate a scoped [`InventoryBook`] inside an open transaction,
//! locking the rows an operation may change. [`persist`] writes back the
//! net effect of the book's change journal.

use std::collections::BTreeSet;

use sqlx::PgConnection;
use uuid::Uuid;

use shared::book::NetChanges;
use shared::{InventoryBook, OrderStatus, StockStage};

use crate::error::{AppError, AppResult};
use crate::models::*;

/// Bound how long this transaction waits for row locks
pub async fn set_lock_timeout(conn: &mut PgConnection, lock_timeout_ms: u64) -> AppResult<()> {
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", lock_timeout_ms))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============================================================================
// Reference data
// ============================================================================

pub async fn load_restaurant(conn: &mut PgConnection, book: &mut InventoryBook, id: Uuid) -> AppResult<()> {
    let row = sqlx::query_as::<_, RestaurantRow>("SELECT id, name, location FROM restaurants WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Restaurant {}", id)))?;
    book.insert_restaurant(row.into());
    Ok(())
}

pub async fn load_workstation(conn: &mut PgConnection, book: &mut InventoryBook, id: Uuid) -> AppResult<()> {
    let row = sqlx::query_as::<_, WorkstationRow>(
        "SELECT id, name, location, max_daily_capacity FROM workstations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Workstation {}", id)))?;
    book.insert_workstation(row.try_into()?);
    Ok(())
}

pub async fn load_suppliers(conn: &mut PgConnection, book: &mut InventoryBook, ids: &[Uuid]) -> AppResult<()> {
    let rows = sqlx::query_as::<_, SupplierRow>(
        "SELECT id, name, contact_info FROM suppliers WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        book.insert_supplier(row.into());
    }
    Ok(())
}

pub async fn load_users(conn: &mut PgConnection, book: &mut InventoryBook, ids: &[Uuid]) -> AppResult<()> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, email, role, created_at FROM users WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        book.insert_user(row.try_into()?);
    }
    Ok(())
}

pub async fn load_materials(conn: &mut PgConnection, book: &mut InventoryBook, ids: &[Uuid]) -> AppResult<()> {
    let rows = sqlx::query_as::<_, MaterialRow>("SELECT id, name, unit FROM materials WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    for row in rows {
        book.insert_material(row.try_into()?);
    }
    Ok(())
}

/// Products with their recipes and the materials those recipes use
pub async fn load_catalog(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    product_ids: &[Uuid],
) -> AppResult<()> {
    let products = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, selling_price, is_available FROM products WHERE id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;
    for row in products {
        book.insert_product(row.into());
    }

    let lines = sqlx::query_as::<_, RecipeLineRow>(
        r#"
        SELECT product_id, material_id, quantity_per_unit, notes
        FROM recipe_lines
        WHERE product_id = ANY($1)
        ORDER BY product_id, id
        "#,
    )
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;

    let material_ids: Vec<Uuid> = lines
        .iter()
        .map(|line| line.material_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    for row in lines {
        book.insert_recipe_line(row.into())?;
    }
    load_materials(conn, book, &material_ids).await
}

// ============================================================================
// Stock
// ============================================================================

/// Load every restaurant-stage lot held by a restaurant, optionally locked
pub async fn load_restaurant_lots(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    restaurant_id: Uuid,
    lock: bool,
) -> AppResult<()> {
    let rows = sqlx::query_as::<_, StockLotRow>(&format!(
        "SELECT {} FROM stock_lots WHERE stage = $1 AND owner_id = $2 ORDER BY id{}",
        STOCK_LOT_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    ))
    .bind(StockStage::Restaurant.as_str())
    .bind(restaurant_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        book.insert_lot(row.try_into()?);
    }
    Ok(())
}

/// Load lots by id, optionally taking row locks
pub async fn load_lots(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    ids: &[Uuid],
    lock: bool,
) -> AppResult<Vec<StockLot>> {
    let sql = format!(
        "SELECT {} FROM stock_lots WHERE id = ANY($1) ORDER BY id{}",
        STOCK_LOT_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let rows = sqlx::query_as::<_, StockLotRow>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut lots = Vec::with_capacity(rows.len());
    for row in rows {
        let lot: StockLot = row.try_into()?;
        book.insert_lot(lot.clone());
        lots.push(lot);
    }
    Ok(lots)
}

/// Lock and load the lot produced by a transfer record, if it still exists
pub async fn lock_lot_produced_by(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    record_id: Uuid,
) -> AppResult<Option<StockLot>> {
    let row = sqlx::query_as::<_, StockLotRow>(&format!(
        "SELECT {} FROM stock_lots WHERE source_kind = 'consumption' AND source_id = $1 FOR UPDATE",
        STOCK_LOT_COLUMNS
    ))
    .bind(record_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let lot: StockLot = row.try_into()?;
            book.insert_lot(lot.clone());
            Ok(Some(lot))
        }
        None => Ok(None),
    }
}

pub async fn load_consumptions(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    ids: &[Uuid],
) -> AppResult<Vec<ConsumptionRecord>> {
    let rows = sqlx::query_as::<_, ConsumptionRow>(&format!(
        "SELECT {} FROM consumption_records WHERE id = ANY($1)",
        CONSUMPTION_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    insert_consumptions(book, rows)
}

pub async fn load_consumptions_of_lots(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    lot_ids: &[Uuid],
) -> AppResult<Vec<ConsumptionRecord>> {
    let rows = sqlx::query_as::<_, ConsumptionRow>(&format!(
        "SELECT {} FROM consumption_records WHERE lot_id = ANY($1)",
        CONSUMPTION_COLUMNS
    ))
    .bind(lot_ids)
    .fetch_all(&mut *conn)
    .await?;
    insert_consumptions(book, rows)
}

fn insert_consumptions(book: &mut InventoryBook, rows: Vec<ConsumptionRow>) -> AppResult<Vec<ConsumptionRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let record: ConsumptionRecord = row.try_into()?;
        book.insert_consumption(record.clone());
        records.push(record);
    }
    Ok(records)
}

// ============================================================================
// Orders
// ============================================================================

/// Everything an order operation may read or change:
/// the order itself (locked), the restaurant's lots (locked), every other
/// in-flight order at the restaurant with its items and records, and the
/// catalog those items need. Returns the restaurant id.
pub async fn load_order_scope(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    order_id: Uuid,
    extra_products: &[Uuid],
) -> AppResult<Uuid> {
    let order: Order = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))?
    .try_into()?;
    let restaurant_id = order.restaurant_id;

    load_restaurant(conn, book, restaurant_id).await?;
    load_restaurant_lots(conn, book, restaurant_id, true).await?;

    let in_flight: Vec<&str> = [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Preparing]
        .iter()
        .map(|status| status.as_str())
        .collect();
    let others = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE restaurant_id = $1 AND status = ANY($2) AND id <> $3",
        ORDER_COLUMNS
    ))
    .bind(restaurant_id)
    .bind(&in_flight)
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut order_ids = vec![order_id];
    book.insert_order(order);
    for row in others {
        let other: Order = row.try_into()?;
        order_ids.push(other.id);
        book.insert_order(other);
    }

    let items = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {} FROM order_items WHERE order_id = ANY($1)",
        ORDER_ITEM_COLUMNS
    ))
    .bind(&order_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut product_ids: BTreeSet<Uuid> = extra_products.iter().copied().collect();
    let mut item_ids = Vec::with_capacity(items.len());
    for row in items {
        let item: OrderItem = row.try_into()?;
        product_ids.insert(item.product_id);
        item_ids.push(item.id);
        book.insert_item(item);
    }

    let records = sqlx::query_as::<_, ConsumptionRow>(&format!(
        "SELECT {} FROM consumption_records WHERE order_item_id = ANY($1)",
        CONSUMPTION_COLUMNS
    ))
    .bind(&item_ids)
    .fetch_all(&mut *conn)
    .await?;
    insert_consumptions(book, records)?;

    let product_ids: Vec<Uuid> = product_ids.into_iter().collect();
    load_catalog(conn, book, &product_ids).await?;
    Ok(restaurant_id)
}

/// Order id of an item, locking nothing
pub async fn order_of_item(conn: &mut PgConnection, item_id: Uuid) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT order_id FROM order_items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order item {}", item_id)))
}

pub async fn load_items(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    item_ids: &[Uuid],
) -> AppResult<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {} FROM order_items WHERE id = ANY($1)",
        ORDER_ITEM_COLUMNS
    ))
    .bind(item_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let item: OrderItem = row.try_into()?;
        book.insert_item(item.clone());
        items.push(item);
    }
    Ok(items)
}

pub async fn load_item_consumptions(
    conn: &mut PgConnection,
    book: &mut InventoryBook,
    item_id: Uuid,
) -> AppResult<Vec<ConsumptionRecord>> {
    let rows = sqlx::query_as::<_, ConsumptionRow>(&format!(
        "SELECT {} FROM consumption_records WHERE order_item_id = $1 ORDER BY consumed_at, id",
        CONSUMPTION_COLUMNS
    ))
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;
    insert_consumptions(book, rows)
}

// ============================================================================
// Write back
// ============================================================================

/// Write the net effect of the book's journal.
///
/// Parents are written before children and children deleted before parents:
/// lots, orders, items, then records out, records in, items out, lots out.
pub async fn persist(conn: &mut PgConnection, book: &InventoryBook) -> AppResult<NetChanges> {
    let net = book.changes().net();

    for id in &net.saved_lots {
        let lot = book
            .lot(*id)
            .ok_or_else(|| AppError::DataIntegrity(format!("Saved lot {} missing from book", id)))?;
        upsert_lot(conn, lot).await?;
    }
    for id in &net.saved_orders {
        let order = book
            .order(*id)
            .ok_or_else(|| AppError::DataIntegrity(format!("Saved order {} missing from book", id)))?;
        upsert_order(conn, order).await?;
    }
    for id in &net.saved_items {
        let item = book
            .item(*id)
            .ok_or_else(|| AppError::DataIntegrity(format!("Saved item {} missing from book", id)))?;
        upsert_item(conn, item).await?;
    }

    delete_ids(conn, "consumption_records", &net.deleted_consumptions).await?;
    for id in &net.created_consumptions {
        let record = book.consumption(*id).ok_or_else(|| {
            AppError::DataIntegrity(format!("Created record {} missing from book", id))
        })?;
        insert_consumption(conn, record).await?;
    }
    delete_ids(conn, "order_items", &net.deleted_items).await?;
    delete_ids(conn, "stock_lots", &net.deleted_lots).await?;

    Ok(net)
}

async fn delete_ids(conn: &mut PgConnection, table: &str, ids: &BTreeSet<Uuid>) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = ids.iter().copied().collect();
    sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", table))
        .bind(&ids)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn upsert_lot(conn: &mut PgConnection, lot: &StockLot) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_lots (
            id, stage, material_id, owner_id, source_kind, source_id, initial_quantity,
            current_quantity, unit, production_date, expiration_date, finished_at,
            storage_location, quality_score, quality_status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (id) DO UPDATE
        SET current_quantity = EXCLUDED.current_quantity,
            finished_at = EXCLUDED.finished_at
        "#,
    )
    .bind(lot.id)
    .bind(lot.stage.as_str())
    .bind(lot.material_id)
    .bind(lot.owner_id)
    .bind(lot.source.kind())
    .bind(lot.source.reference_id())
    .bind(lot.initial_quantity)
    .bind(lot.current_quantity)
    .bind(lot.unit.as_str())
    .bind(lot.production_date)
    .bind(lot.expiration_date)
    .bind(lot.finished_at)
    .bind(&lot.storage_location)
    .bind(lot.quality.map(|q| i16::from(q.score)))
    .bind(lot.quality.map(|q| q.status.as_str()))
    .bind(lot.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_order(conn: &mut PgConnection, order: &Order) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, reference, restaurant_id, customer_id, status, total_amount, order_date,
            delivered_at, note, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            total_amount = EXCLUDED.total_amount,
            delivered_at = EXCLUDED.delivered_at,
            note = EXCLUDED.note,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(order.id)
    .bind(&order.reference)
    .bind(order.restaurant_id)
    .bind(order.customer_id)
    .bind(order.status.as_str())
    .bind(order.total_amount)
    .bind(order.order_date)
    .bind(order.delivered_at)
    .bind(&order.note)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_item(conn: &mut PgConnection, item: &OrderItem) -> AppResult<()> {
    let quantity = i32::try_from(item.quantity)
        .map_err(|_| AppError::ValidationError(format!("Quantity {} is too large", item.quantity)))?;

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, quantity, unit_price, total_price, note, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE
        SET product_id = EXCLUDED.product_id,
            quantity = EXCLUDED.quantity,
            unit_price = EXCLUDED.unit_price,
            total_price = EXCLUDED.total_price,
            note = EXCLUDED.note,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(item.id)
    .bind(item.order_id)
    .bind(item.product_id)
    .bind(quantity)
    .bind(item.unit_price)
    .bind(item.total_price)
    .bind(&item.note)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_consumption(conn: &mut PgConnection, record: &ConsumptionRecord) -> AppResult<()> {
    let (kind, order_item_id, workstation_id, restaurant_id, actor_id) = consumer_columns(&record.consumer);

    sqlx::query(
        r#"
        INSERT INTO consumption_records (
            id, consumer_kind, order_item_id, workstation_id, restaurant_id, actor_id,
            lot_id, material_id, quantity, consumed_at, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(record.id)
    .bind(kind)
    .bind(order_item_id)
    .bind(workstation_id)
    .bind(restaurant_id)
    .bind(actor_id)
    .bind(record.lot_id)
    .bind(record.material_id)
    .bind(record.quantity)
    .bind(record.consumed_at)
    .bind(&record.notes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
