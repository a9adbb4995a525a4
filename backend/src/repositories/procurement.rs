//! Purchase order headers and lines

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use shared::models::{PurchaseOrderItemStatus, PurchaseOrderStatus};

use crate::error::AppResult;
use crate::models::{PurchaseOrder, PurchaseOrderItem};

pub const ORDER_COLUMNS: &str = "id, order_number, supplier_id, project_id, warehouse_id, status, \
     order_date, expected_delivery, total_amount, notes, created_by, approved_by, approved_at, \
     received_at, created_at, updated_at";

pub const ORDER_ITEM_COLUMNS: &str = "id, purchase_order_id, material_id, quantity, unit_price, \
     total_price, received_quantity, status, created_at, updated_at";

pub async fn find_order<'e, E>(executor: E, order_id: Uuid) -> AppResult<Option<PurchaseOrder>>
where
    E: Executor<'e, Database = Postgres>,
{
    let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = $1"
    ))
    .bind(order_id)
    .fetch_optional(executor)
    .await?;

    Ok(order)
}

/// Lock the order header; every line mutation goes through this lock
pub async fn lock_order<'e, E>(executor: E, order_id: Uuid) -> AppResult<Option<PurchaseOrder>>
where
    E: Executor<'e, Database = Postgres>,
{
    let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(order_id)
    .fetch_optional(executor)
    .await?;

    Ok(order)
}

pub async fn order_items<'e, E>(executor: E, order_id: Uuid) -> AppResult<Vec<PurchaseOrderItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let items = sqlx::query_as::<_, PurchaseOrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM purchase_order_items \
         WHERE purchase_order_id = $1 ORDER BY created_at, id"
    ))
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

pub async fn find_order_item<'e, E>(
    executor: E,
    item_id: Uuid,
) -> AppResult<Option<PurchaseOrderItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, PurchaseOrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM purchase_order_items WHERE id = $1"
    ))
    .bind(item_id)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

pub async fn record_line_receipt<'e, E>(
    executor: E,
    item_id: Uuid,
    received_quantity: Decimal,
    status: PurchaseOrderItemStatus,
) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "UPDATE purchase_order_items SET received_quantity = $2, status = $3 WHERE id = $1",
    )
    .bind(item_id)
    .bind(received_quantity)
    .bind(status.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// Set every non-cancelled line of an order to `status`
pub async fn set_line_statuses<'e, E>(
    executor: E,
    order_id: Uuid,
    status: PurchaseOrderItemStatus,
) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "UPDATE purchase_order_items SET status = $2 \
         WHERE purchase_order_id = $1 AND status <> 'cancelled'",
    )
    .bind(order_id)
    .bind(status.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// Persist a new order status. `received_at` is stamped the first time
/// the order becomes fully received.
pub async fn set_order_status<'e, E>(
    executor: E,
    order_id: Uuid,
    status: PurchaseOrderStatus,
) -> AppResult<PurchaseOrder>
where
    E: Executor<'e, Database = Postgres>,
{
    let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
        r#"
        UPDATE purchase_orders
        SET status = $2,
            received_at = CASE WHEN $2 = 'fully_received' THEN COALESCE(received_at, NOW())
                               ELSE received_at END
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(order_id)
    .bind(status.as_str())
    .fetch_one(executor)
    .await?;

    Ok(order)
}

/// Recompute `total_amount` from the lines in one aggregate statement
pub async fn recompute_total<'e, E>(executor: E, order_id: Uuid) -> AppResult<Decimal>
where
    E: Executor<'e, Database = Postgres>,
{
    let total = sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE purchase_orders po
        SET total_amount = COALESCE(
            (SELECT SUM(total_price) FROM purchase_order_items
             WHERE purchase_order_id = po.id AND status <> 'cancelled'), 0)
        WHERE po.id = $1
        RETURNING total_amount
        "#,
    )
    .bind(order_id)
    .fetch_one(executor)
    .await?;

    Ok(total)
}
