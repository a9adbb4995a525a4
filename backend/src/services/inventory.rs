//! Inventory service: warehouses, the stock ledger and the transaction log
//!
//! Every change to a ledger position goes through [`post_movement`], which
//! runs inside the caller's transaction on a row locked with
//! `SELECT ... FOR UPDATE`. Low-stock alerts are queued only after the
//! transaction has committed.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::models::{apply_delta, Movement, StockReference, TransactionType};
use shared::types::{PaginatedResponse, Pagination};
use shared::validation::{validate_code, validate_non_negative, validate_non_zero, validate_positive};

use crate::error::{AppError, AppResult};
use crate::models::{InventoryItem, InventoryLocation, InventoryTransaction, Warehouse};
use crate::repositories::inventory::{self as repo, NewTransaction, ITEM_COLUMNS, TRANSACTION_COLUMNS};
use crate::services::notification::{AlertEvent, AlertSender};

/// Inventory service for managing stock positions and movements
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    alerts: AlertSender,
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 20), custom = "validate_code")]
    pub code: String,
    #[validate(length(max = 200))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 20), custom = "validate_code")]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Option<Uuid>,
    #[validate(custom = "validate_non_negative")]
    #[serde(default)]
    pub quantity: Decimal,
    #[validate(custom = "validate_non_negative")]
    #[serde(default)]
    pub min_quantity: Decimal,
    #[serde(default)]
    pub monitor_stock_level: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateThresholdsInput {
    #[validate(custom = "validate_non_negative")]
    pub min_quantity: Option<Decimal>,
    pub monitor_stock_level: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustQuantityInput {
    #[validate(custom = "validate_non_zero")]
    pub quantity_change: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferInput {
    pub destination_location_id: Uuid,
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WarehouseOutputInput {
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignToProjectInput {
    pub project_id: Uuid,
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemFilter {
    pub material_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub material_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub general_use: Option<bool>,
}

/// Both sides of a completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub source: InventoryItem,
    pub destination: InventoryItem,
    pub transactions: Vec<InventoryTransaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialProjectUsage {
    pub material_id: Uuid,
    pub project_id: Uuid,
    pub total_issued: Decimal,
}

// ============================================================================
// Ledger primitive
// ============================================================================

/// One signed change to a ledger position
#[derive(Debug, Clone)]
pub(crate) struct Posting {
    pub transaction_type: TransactionType,
    pub delta: Decimal,
    pub reference: StockReference,
    pub performed_by: Uuid,
    pub notes: String,
}

/// Apply `posting` to a position the caller has locked, and append its
/// log entry. Nothing is written when the rules reject the change.
pub(crate) async fn post_movement(
    conn: &mut PgConnection,
    item: &InventoryItem,
    posting: Posting,
) -> AppResult<(InventoryItem, InventoryTransaction)> {
    let quantity = apply_delta(item.material_id, item.quantity, posting.delta).map_err(|e| {
        tracing::warn!(item_id = %item.id, delta = %posting.delta, "ledger change rejected: {}", e);
        e
    })?;

    let movement = Movement::for_delta(posting.transaction_type, posting.delta, item.warehouse_id);
    movement.validate()?;

    let updated = repo::set_quantity(&mut *conn, item.id, quantity).await?;
    let transaction = repo::insert_transaction(
        &mut *conn,
        NewTransaction {
            inventory_item_id: item.id,
            material_id: item.material_id,
            movement,
            reference: posting.reference,
            performed_by: posting.performed_by,
            notes: posting.notes,
        },
    )
    .await?;

    Ok((updated, transaction))
}

impl InventoryService {
    pub fn new(db: PgPool, alerts: AlertSender) -> Self {
        Self { db, alerts }
    }

    /// Queue alerts for positions left low by a committed unit of work
    pub(crate) fn raise_low_stock<'a>(
        alerts: &AlertSender,
        items: impl IntoIterator<Item = &'a InventoryItem>,
    ) {
        for item in items {
            if let Some(alert) = item.low_stock_alert() {
                tracing::info!(
                    item_id = %item.id,
                    quantity = %item.quantity,
                    min_quantity = %item.min_quantity,
                    "position below minimum"
                );
                alerts.notify(AlertEvent::LowStock(alert));
            }
        }
    }

    async fn ensure_exists(&self, table: &str, id: Uuid, entity: &str) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            table
        ))
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::not_found(entity))
        }
    }

    // ========================================================================
    // Warehouses and locations
    // ========================================================================

    pub async fn create_warehouse(&self, input: CreateWarehouseInput) -> AppResult<Warehouse> {
        input.validate()?;

        let warehouse = sqlx::query_as::<_, Warehouse>(
            r#"
            INSERT INTO warehouses (name, code, address)
            VALUES ($1, $2, $3)
            RETURNING id, name, code, address, is_active, created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.code)
        .bind(input.address.unwrap_or_default())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_duplicate(e, format!("Warehouse with code {}", input.code)))?;

        tracing::info!(warehouse_id = %warehouse.id, code = %warehouse.code, "warehouse created");
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self, active_only: bool) -> AppResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            r#"
            SELECT id, name, code, address, is_active, created_at, updated_at
            FROM warehouses
            WHERE (NOT $1 OR is_active)
            ORDER BY code
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(warehouses)
    }

    pub async fn create_location(
        &self,
        warehouse_id: Uuid,
        input: CreateLocationInput,
    ) -> AppResult<InventoryLocation> {
        input.validate()?;
        self.ensure_exists("warehouses", warehouse_id, "Warehouse").await?;

        let location = sqlx::query_as::<_, InventoryLocation>(
            r#"
            INSERT INTO inventory_locations (warehouse_id, name, code)
            VALUES ($1, $2, $3)
            RETURNING id, warehouse_id, name, code, created_at, updated_at
            "#,
        )
        .bind(warehouse_id)
        .bind(input.name.trim())
        .bind(&input.code)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_duplicate(e, format!("Location {} in this warehouse", input.code)))?;

        Ok(location)
    }

    pub async fn list_locations(&self, warehouse_id: Uuid) -> AppResult<Vec<InventoryLocation>> {
        self.ensure_exists("warehouses", warehouse_id, "Warehouse").await?;

        let locations = sqlx::query_as::<_, InventoryLocation>(
            r#"
            SELECT id, warehouse_id, name, code, created_at, updated_at
            FROM inventory_locations
            WHERE warehouse_id = $1
            ORDER BY code
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(locations)
    }

    // ========================================================================
    // Ledger positions
    // ========================================================================

    /// Open a ledger position. A non-zero opening quantity is logged as a
    /// general-use receipt.
    pub async fn create_item(
        &self,
        performed_by: Uuid,
        input: CreateItemInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;
        self.ensure_exists("materials", input.material_id, "Material").await?;
        self.ensure_exists("warehouses", input.warehouse_id, "Warehouse").await?;

        if let Some(location_id) = input.location_id {
            let location = repo::find_location(&self.db, location_id)
                .await?
                .ok_or_else(|| AppError::not_found("Inventory location"))?;
            if location.warehouse_id != input.warehouse_id {
                return Err(AppError::validation(
                    "location_id",
                    "Location does not belong to the selected warehouse",
                ));
            }
        }

        let mut tx = self.db.begin().await?;

        let mut item = repo::insert_item(
            &mut *tx,
            input.material_id,
            input.warehouse_id,
            input.location_id,
            Decimal::ZERO,
            input.min_quantity,
            input.monitor_stock_level,
        )
        .await
        .map_err(|e| AppError::on_duplicate(e, "Inventory item for this material and location"))?;

        if input.quantity > Decimal::ZERO {
            let (opened, _) = post_movement(
                &mut tx,
                &item,
                Posting {
                    transaction_type: TransactionType::Receipt,
                    delta: input.quantity,
                    reference: StockReference::GeneralUse,
                    performed_by,
                    notes: "Opening balance".to_string(),
                },
            )
            .await?;
            item = opened;
        }

        tx.commit().await?;

        tracing::info!(item_id = %item.id, material_id = %item.material_id, "inventory item created");
        Self::raise_low_stock(&self.alerts, [&item]);
        Ok(item)
    }

    pub async fn get_item(&self, item_id: Uuid) -> AppResult<InventoryItem> {
        repo::find_item(&self.db, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory item"))
    }

    pub async fn list_items(
        &self,
        filter: &ItemFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<InventoryItem>> {
        const WHERE: &str = "($1::uuid IS NULL OR material_id = $1) \
             AND ($2::uuid IS NULL OR warehouse_id = $2) \
             AND ($3::uuid IS NULL OR location_id = $3)";

        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.material_id)
        .bind(filter.warehouse_id)
        .bind(filter.location_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory_items WHERE {WHERE}"
        ))
        .bind(filter.material_id)
        .bind(filter.warehouse_id)
        .bind(filter.location_id)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(items, pagination, total.max(0) as u64))
    }

    /// Change `min_quantity` / `monitor_stock_level`; quantity is untouched
    pub async fn update_thresholds(
        &self,
        item_id: Uuid,
        input: UpdateThresholdsInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_items
            SET min_quantity = COALESCE($2, min_quantity),
                monitor_stock_level = COALESCE($3, monitor_stock_level)
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(input.min_quantity)
        .bind(input.monitor_stock_level)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item"))?;

        Self::raise_low_stock(&self.alerts, [&item]);
        Ok(item)
    }

    /// Items being monitored whose quantity is under their minimum
    pub async fn low_inventory(&self) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM inventory_items
            WHERE monitor_stock_level AND quantity < min_quantity
            ORDER BY (min_quantity - quantity) DESC
            "#
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    // ========================================================================
    // Movements
    // ========================================================================

    /// Lock one position, post a single movement to it and commit
    async fn post_single(&self, item_id: Uuid, posting: Posting) -> AppResult<InventoryItem> {
        let mut tx = self.db.begin().await?;

        let item = repo::lock_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory item"))?;

        let (updated, transaction) = post_movement(&mut tx, &item, posting).await?;

        tx.commit().await?;

        tracing::info!(
            item_id = %updated.id,
            transaction_id = %transaction.id,
            transaction_type = %transaction.transaction_type,
            quantity = %transaction.quantity,
            "stock movement recorded"
        );
        Self::raise_low_stock(&self.alerts, [&updated]);
        Ok(updated)
    }

    /// Add a signed change to an item, logged as an adjustment
    pub async fn adjust_quantity(
        &self,
        item_id: Uuid,
        performed_by: Uuid,
        input: AdjustQuantityInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;
        if let Some(project_id) = input.project_id {
            self.ensure_exists("projects", project_id, "Project").await?;
        }

        self.post_single(
            item_id,
            Posting {
                transaction_type: TransactionType::Adjustment,
                delta: input.quantity_change,
                reference: StockReference::for_project(input.project_id),
                performed_by,
                notes: input.reason,
            },
        )
        .await
    }

    /// Issue stock out of a warehouse for general use or a project
    pub async fn record_warehouse_output(
        &self,
        item_id: Uuid,
        performed_by: Uuid,
        input: WarehouseOutputInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;
        if let Some(project_id) = input.project_id {
            self.ensure_exists("projects", project_id, "Project").await?;
        }

        self.post_single(
            item_id,
            Posting {
                transaction_type: TransactionType::Issue,
                delta: -input.quantity,
                reference: StockReference::for_project(input.project_id),
                performed_by,
                notes: input.reason,
            },
        )
        .await
    }

    /// Issue stock to a project
    pub async fn assign_to_project(
        &self,
        item_id: Uuid,
        performed_by: Uuid,
        input: AssignToProjectInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;
        self.ensure_exists("projects", input.project_id, "Project").await?;

        self.post_single(
            item_id,
            Posting {
                transaction_type: TransactionType::Issue,
                delta: -input.quantity,
                reference: StockReference::Project(input.project_id),
                performed_by,
                notes: format!("Assigned to project: {}", input.reason),
            },
        )
        .await
    }

    /// Move stock to another location as two adjustment legs in one
    /// transaction. The destination position is opened at zero when missing.
    pub async fn transfer(
        &self,
        item_id: Uuid,
        performed_by: Uuid,
        input: TransferInput,
    ) -> AppResult<TransferResult> {
        input.validate()?;

        let destination_location = repo::find_location(&self.db, input.destination_location_id)
            .await?
            .ok_or_else(|| AppError::not_found("Destination location"))?;

        let mut tx = self.db.begin().await?;

        let source = repo::find_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory item"))?;

        if source.location_id == Some(destination_location.id) {
            return Err(AppError::validation(
                "destination_location_id",
                "Destination must differ from the source location",
            ));
        }

        let existing = repo::find_position_id(
            &mut *tx,
            source.material_id,
            destination_location.warehouse_id,
            Some(destination_location.id),
        )
        .await?;

        // Lock both rows in id order so opposite transfers cannot deadlock
        let (source, destination) = match existing {
            Some(dest_id) if dest_id < source.id => {
                let dest = repo::lock_item(&mut *tx, dest_id).await?;
                let src = repo::lock_item(&mut *tx, source.id).await?;
                (src, dest)
            }
            Some(dest_id) => {
                let src = repo::lock_item(&mut *tx, source.id).await?;
                let dest = repo::lock_item(&mut *tx, dest_id).await?;
                (src, dest)
            }
            None => {
                let src = repo::lock_item(&mut *tx, source.id).await?;
                let dest = repo::insert_item(
                    &mut *tx,
                    source.material_id,
                    destination_location.warehouse_id,
                    Some(destination_location.id),
                    Decimal::ZERO,
                    Decimal::ZERO,
                    false,
                )
                .await
                .map_err(|e| AppError::on_duplicate(e, "Destination inventory item"))?;
                (src, Some(dest))
            }
        };
        let source = source.ok_or_else(|| AppError::not_found("Inventory item"))?;
        let destination = destination.ok_or_else(|| AppError::not_found("Destination item"))?;

        let (source, outbound) = post_movement(
            &mut tx,
            &source,
            Posting {
                transaction_type: TransactionType::Adjustment,
                delta: -input.quantity,
                reference: StockReference::GeneralUse,
                performed_by,
                notes: format!("Transfer to location {}: {}", destination_location.code, input.reason),
            },
        )
        .await?;

        let source_label = match source.location_id {
            Some(location_id) => repo::find_location(&mut *tx, location_id)
                .await?
                .map(|l| l.code)
                .unwrap_or_else(|| location_id.to_string()),
            None => "unassigned".to_string(),
        };

        let (destination, inbound) = post_movement(
            &mut tx,
            &destination,
            Posting {
                transaction_type: TransactionType::Adjustment,
                delta: input.quantity,
                reference: StockReference::GeneralUse,
                performed_by,
                notes: format!("Transfer from location {}: {}", source_label, input.reason),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            source_id = %source.id,
            destination_id = %destination.id,
            quantity = %input.quantity,
            "stock transferred"
        );
        Self::raise_low_stock(&self.alerts, [&source, &destination]);

        Ok(TransferResult {
            source,
            destination,
            transactions: vec![outbound, inbound],
        })
    }

    // ========================================================================
    // Transaction log queries
    // ========================================================================

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<InventoryTransaction>> {
        const WHERE: &str = "($1::uuid IS NULL OR material_id = $1) \
             AND ($2::uuid IS NULL OR project_id = $2) \
             AND ($3::uuid IS NULL OR from_warehouse_id = $3 OR to_warehouse_id = $3) \
             AND ($4::varchar IS NULL OR transaction_type = $4) \
             AND ($5::date IS NULL OR created_at >= $5::date) \
             AND ($6::date IS NULL OR created_at < $6::date + 1) \
             AND ($7::bool IS NULL OR is_general_use = $7)";

        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(AppError::validation("date_from", "date_from must not be after date_to"));
            }
        }

        let transaction_type = filter.transaction_type.map(|t| t.as_str());

        let transactions = sqlx::query_as::<_, InventoryTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions WHERE {WHERE} \
             ORDER BY created_at DESC, id LIMIT $8 OFFSET $9"
        ))
        .bind(filter.material_id)
        .bind(filter.project_id)
        .bind(filter.warehouse_id)
        .bind(transaction_type)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.general_use)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory_transactions WHERE {WHERE}"
        ))
        .bind(filter.material_id)
        .bind(filter.project_id)
        .bind(filter.warehouse_id)
        .bind(transaction_type)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.general_use)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(transactions, pagination, total.max(0) as u64))
    }

    /// Total quantity of a material issued to a project
    pub async fn material_project_usage(
        &self,
        material_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<MaterialProjectUsage> {
        let total_issued = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM inventory_transactions
            WHERE material_id = $1 AND project_id = $2 AND transaction_type = 'issue'
            "#,
        )
        .bind(material_id)
        .bind(project_id)
        .fetch_one(&self.db)
        .await?;

        Ok(MaterialProjectUsage {
            material_id,
            project_id,
            total_issued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_input_rejects_zero_and_blank_reason() {
        let zero = AdjustQuantityInput {
            quantity_change: Decimal::ZERO,
            reason: "count".into(),
            project_id: None,
        };
        assert!(zero.validate().is_err());

        let blank = AdjustQuantityInput {
            quantity_change: Decimal::NEGATIVE_ONE,
            reason: String::new(),
            project_id: None,
        };
        assert!(blank.validate().is_err());

        let ok = AdjustQuantityInput {
            quantity_change: Decimal::NEGATIVE_ONE,
            reason: "damaged".into(),
            project_id: None,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn transfer_requires_positive_quantity() {
        let input = TransferInput {
            destination_location_id: Uuid::new_v4(),
            quantity: Decimal::ZERO,
            reason: "rebalance".into(),
        };
        let err: AppError = input.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
    }

    #[test]
    fn warehouse_codes_are_checked() {
        let input = CreateWarehouseInput {
            name: "Main".into(),
            code: "main yard".into(),
            address: None,
        };
        assert!(input.validate().is_err());
    }
}
