use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

use shared::models::{is_below_minimum, LowStockAlert, StockReference, TransactionType};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryLocation {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub name: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger position for one (material, warehouse, location)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub monitor_stock_level: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low(&self) -> bool {
        is_below_minimum(self.quantity, self.min_quantity, self.monitor_stock_level)
    }

    /// Alert to raise once the current state is committed, if any
    pub fn low_stock_alert(&self) -> Option<LowStockAlert> {
        self.is_low().then(|| LowStockAlert {
            inventory_item_id: self.id,
            material_id: self.material_id,
            warehouse_id: self.warehouse_id,
            quantity: self.quantity,
            min_quantity: self.min_quantity,
        })
    }
}

/// Immutable transaction log entry
#[derive(Debug, Clone, Serialize)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub material_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub from_warehouse_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
    pub reference: StockReference,
    pub performed_by: Uuid,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InventoryTransaction {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let transaction_type: String = row.try_get("transaction_type")?;
        let transaction_type = transaction_type
            .parse::<TransactionType>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let reference = StockReference::from_columns(
            row.try_get("project_id")?,
            row.try_get("purchase_order_item_id")?,
            row.try_get("is_general_use")?,
        )
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.try_get("id")?,
            inventory_item_id: row.try_get("inventory_item_id")?,
            material_id: row.try_get("material_id")?,
            transaction_type,
            quantity: row.try_get("quantity")?,
            from_warehouse_id: row.try_get("from_warehouse_id")?,
            to_warehouse_id: row.try_get("to_warehouse_id")?,
            reference,
            performed_by: row.try_get("performed_by")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
