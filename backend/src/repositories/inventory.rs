//! Ledger positions and the transaction log

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use shared::models::{Movement, StockReference};

use crate::error::AppResult;
use crate::models::{InventoryItem, InventoryLocation, InventoryTransaction};

pub const ITEM_COLUMNS: &str = "id, material_id, warehouse_id, location_id, quantity, \
     min_quantity, monitor_stock_level, created_at, updated_at";

pub const TRANSACTION_COLUMNS: &str = "id, inventory_item_id, material_id, transaction_type, \
     quantity, from_warehouse_id, to_warehouse_id, project_id, purchase_order_item_id, \
     is_general_use, performed_by, notes, created_at";

/// One log entry about to be appended
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub inventory_item_id: Uuid,
    pub material_id: Uuid,
    pub movement: Movement,
    pub reference: StockReference,
    pub performed_by: Uuid,
    pub notes: String,
}

pub async fn find_item<'e, E>(executor: E, item_id: Uuid) -> AppResult<Option<InventoryItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1"
    ))
    .bind(item_id)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

/// Read a ledger position and hold its row lock until the transaction ends
pub async fn lock_item<'e, E>(executor: E, item_id: Uuid) -> AppResult<Option<InventoryItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE"
    ))
    .bind(item_id)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

/// Lock the position for (material, warehouse, location); `None` location
/// is the warehouse's unlocated slot
pub async fn lock_position<'e, E>(
    executor: E,
    material_id: Uuid,
    warehouse_id: Uuid,
    location_id: Option<Uuid>,
) -> AppResult<Option<InventoryItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        r#"
        SELECT {ITEM_COLUMNS} FROM inventory_items
        WHERE material_id = $1 AND warehouse_id = $2 AND location_id IS NOT DISTINCT FROM $3
        FOR UPDATE
        "#
    ))
    .bind(material_id)
    .bind(warehouse_id)
    .bind(location_id)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

/// Id of the position for (material, warehouse, location) without locking it
pub async fn find_position_id<'e, E>(
    executor: E,
    material_id: Uuid,
    warehouse_id: Uuid,
    location_id: Option<Uuid>,
) -> AppResult<Option<Uuid>>
where
    E: Executor<'e, Database = Postgres>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM inventory_items \
         WHERE material_id = $1 AND warehouse_id = $2 AND location_id IS NOT DISTINCT FROM $3",
    )
    .bind(material_id)
    .bind(warehouse_id)
    .bind(location_id)
    .fetch_optional(executor)
    .await?;

    Ok(id)
}

pub async fn insert_item<'e, E>(
    executor: E,
    material_id: Uuid,
    warehouse_id: Uuid,
    location_id: Option<Uuid>,
    quantity: Decimal,
    min_quantity: Decimal,
    monitor_stock_level: bool,
) -> Result<InventoryItem, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, InventoryItem>(&format!(
        r#"
        INSERT INTO inventory_items (material_id, warehouse_id, location_id, quantity,
                                     min_quantity, monitor_stock_level)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(material_id)
    .bind(warehouse_id)
    .bind(location_id)
    .bind(quantity)
    .bind(min_quantity)
    .bind(monitor_stock_level)
    .fetch_one(executor)
    .await
}

pub async fn set_quantity<'e, E>(
    executor: E,
    item_id: Uuid,
    quantity: Decimal,
) -> AppResult<InventoryItem>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        "UPDATE inventory_items SET quantity = $2 WHERE id = $1 RETURNING {ITEM_COLUMNS}"
    ))
    .bind(item_id)
    .bind(quantity)
    .fetch_one(executor)
    .await?;

    Ok(item)
}

pub async fn insert_transaction<'e, E>(
    executor: E,
    entry: NewTransaction,
) -> AppResult<InventoryTransaction>
where
    E: Executor<'e, Database = Postgres>,
{
    let transaction = sqlx::query_as::<_, InventoryTransaction>(&format!(
        r#"
        INSERT INTO inventory_transactions (
            inventory_item_id, material_id, transaction_type, quantity,
            from_warehouse_id, to_warehouse_id, project_id, purchase_order_item_id,
            is_general_use, performed_by, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    ))
    .bind(entry.inventory_item_id)
    .bind(entry.material_id)
    .bind(entry.movement.transaction_type.as_str())
    .bind(entry.movement.quantity)
    .bind(entry.movement.from_warehouse_id)
    .bind(entry.movement.to_warehouse_id)
    .bind(entry.reference.project_id())
    .bind(entry.reference.purchase_order_item_id())
    .bind(entry.reference.is_general_use())
    .bind(entry.performed_by)
    .bind(&entry.notes)
    .fetch_one(executor)
    .await?;

    Ok(transaction)
}

pub async fn find_location<'e, E>(
    executor: E,
    location_id: Uuid,
) -> AppResult<Option<InventoryLocation>>
where
    E: Executor<'e, Database = Postgres>,
{
    let location = sqlx::query_as::<_, InventoryLocation>(
        "SELECT id, warehouse_id, name, code, created_at, updated_at \
         FROM inventory_locations WHERE id = $1",
    )
    .bind(location_id)
    .fetch_optional(executor)
    .await?;

    Ok(location)
}
