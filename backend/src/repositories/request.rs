//! Material request headers and lines

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use shared::models::{RequestItemStatus, RequestStatus};

use crate::error::AppResult;
use crate::models::{Request, RequestItem};

pub const REQUEST_COLUMNS: &str = "id, number, project_id, warehouse_id, title, notes, status, \
     requested_by, approved_by, approved_at, fulfillment_date, created_at, updated_at";

pub const REQUEST_ITEM_COLUMNS: &str = "id, request_id, material_id, quantity, \
     quantity_fulfilled, is_fulfilled, status, notes, fulfillment_date, created_at, updated_at";

pub async fn find_request<'e, E>(executor: E, request_id: Uuid) -> AppResult<Option<Request>>
where
    E: Executor<'e, Database = Postgres>,
{
    let request = sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"
    ))
    .bind(request_id)
    .fetch_optional(executor)
    .await?;

    Ok(request)
}

pub async fn lock_request<'e, E>(executor: E, request_id: Uuid) -> AppResult<Option<Request>>
where
    E: Executor<'e, Database = Postgres>,
{
    let request = sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(request_id)
    .fetch_optional(executor)
    .await?;

    Ok(request)
}

pub async fn request_items<'e, E>(executor: E, request_id: Uuid) -> AppResult<Vec<RequestItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let items = sqlx::query_as::<_, RequestItem>(&format!(
        "SELECT {REQUEST_ITEM_COLUMNS} FROM request_items \
         WHERE request_id = $1 ORDER BY created_at, id"
    ))
    .bind(request_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

pub async fn find_request_item<'e, E>(executor: E, item_id: Uuid) -> AppResult<Option<RequestItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, RequestItem>(&format!(
        "SELECT {REQUEST_ITEM_COLUMNS} FROM request_items WHERE id = $1"
    ))
    .bind(item_id)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

pub async fn record_line_fulfillment<'e, E>(
    executor: E,
    item_id: Uuid,
    quantity_fulfilled: Decimal,
    is_fulfilled: bool,
    status: RequestItemStatus,
) -> AppResult<RequestItem>
where
    E: Executor<'e, Database = Postgres>,
{
    let item = sqlx::query_as::<_, RequestItem>(&format!(
        r#"
        UPDATE request_items
        SET quantity_fulfilled = $2, is_fulfilled = $3, status = $4,
            fulfillment_date = CASE WHEN $3 THEN NOW() ELSE fulfillment_date END
        WHERE id = $1
        RETURNING {REQUEST_ITEM_COLUMNS}
        "#
    ))
    .bind(item_id)
    .bind(quantity_fulfilled)
    .bind(is_fulfilled)
    .bind(status.as_str())
    .fetch_one(executor)
    .await?;

    Ok(item)
}

pub async fn set_request_status<'e, E>(
    executor: E,
    request_id: Uuid,
    status: RequestStatus,
    fulfillment_date: Option<DateTime<Utc>>,
) -> AppResult<Request>
where
    E: Executor<'e, Database = Postgres>,
{
    let request = sqlx::query_as::<_, Request>(&format!(
        r#"
        UPDATE requests
        SET status = $2, fulfillment_date = COALESCE($3, fulfillment_date)
        WHERE id = $1
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(request_id)
    .bind(status.as_str())
    .bind(fulfillment_date)
    .fetch_one(executor)
    .await?;

    Ok(request)
}

/// Move the given lines of one request to `status`
pub async fn set_item_statuses<'e, E>(
    executor: E,
    request_id: Uuid,
    item_ids: &[Uuid],
    status: RequestItemStatus,
) -> AppResult<u64>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE request_items SET status = $3 WHERE request_id = $1 AND id = ANY($2)",
    )
    .bind(request_id)
    .bind(item_ids)
    .bind(status.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
