//! SQL access for the entities that take part in stock movements
//!
//! Functions are generic over `sqlx::Executor` so the same query runs
//! against the pool or inside a service's transaction. Lookups return
//! `Option`; services decide what a miss means.

pub mod inventory;
pub mod procurement;
pub mod request;

use chrono::NaiveDate;
use shared::types::DocumentKind;
use sqlx::PgConnection;

use crate::error::AppResult;

/// Issue the next `PREFIX-YYYYMMDD-NNNN` number for `date`.
///
/// Takes a transaction-scoped advisory lock on the day's stem so two
/// concurrent creators cannot read the same last number. Must run inside
/// the transaction that inserts the document.
pub async fn next_document_number(
    conn: &mut PgConnection,
    kind: DocumentKind,
    date: NaiveDate,
) -> AppResult<String> {
    let stem = kind.stem(date);

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&stem)
        .execute(&mut *conn)
        .await?;

    let (table, column) = match kind {
        DocumentKind::PurchaseOrder => ("purchase_orders", "order_number"),
        DocumentKind::Request => ("requests", "number"),
        DocumentKind::QualityCheck => ("quality_checks", "check_number"),
    };

    let last = sqlx::query_scalar::<_, String>(&format!(
        "SELECT {column} FROM {table} WHERE {column} LIKE $1 \
         ORDER BY length({column}) DESC, {column} DESC LIMIT 1"
    ))
    .bind(format!("{}%", stem))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(kind.next_number(date, last.as_deref()))
}
