//! Inventory ledger and transaction log rules
//!
//! Quantities in the transaction log are always positive magnitudes. The
//! direction of a movement is carried by its warehouse fields: a
//! `from_warehouse` means stock left that warehouse, a `to_warehouse`
//! means stock arrived there.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::{ensure_storable, MAX_QUANTITY};

string_enum! {
    /// Kind of stock movement recorded in the transaction log
    pub enum TransactionType {
        Receipt => "receipt",
        Issue => "issue",
        Transfer => "transfer",
        Adjustment => "adjustment",
    }
}

/// What a stock movement is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockReference {
    Project(Uuid),
    PurchaseOrderItem(Uuid),
    GeneralUse,
}

impl StockReference {
    /// Project attribution when one is given, general use otherwise
    pub fn for_project(project_id: Option<Uuid>) -> Self {
        project_id.map_or(StockReference::GeneralUse, StockReference::Project)
    }

    pub fn project_id(&self) -> Option<Uuid> {
        match self {
            StockReference::Project(id) => Some(*id),
            _ => None,
        }
    }

    pub fn purchase_order_item_id(&self) -> Option<Uuid> {
        match self {
            StockReference::PurchaseOrderItem(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_general_use(&self) -> bool {
        matches!(self, StockReference::GeneralUse)
    }

    /// Rebuild the reference from its persisted columns.
    ///
    /// Exactly one of the three must be set; the table carries the same
    /// CHECK constraint.
    pub fn from_columns(
        project_id: Option<Uuid>,
        purchase_order_item_id: Option<Uuid>,
        is_general_use: bool,
    ) -> DomainResult<Self> {
        match (project_id, purchase_order_item_id, is_general_use) {
            (Some(id), None, false) => Ok(StockReference::Project(id)),
            (None, Some(id), false) => Ok(StockReference::PurchaseOrderItem(id)),
            (None, None, true) => Ok(StockReference::GeneralUse),
            _ => Err(DomainError::validation(
                "reference",
                "a transaction must reference exactly one of project, purchase order item or general use",
            )),
        }
    }
}

/// A single stock movement about to be appended to the transaction log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub from_warehouse_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
}

impl Movement {
    /// Movement for a signed change on a ledger position in `warehouse_id`.
    ///
    /// Negative deltas leave the warehouse, positive deltas arrive in it.
    pub fn for_delta(transaction_type: TransactionType, delta: Decimal, warehouse_id: Uuid) -> Self {
        let (from_warehouse_id, to_warehouse_id) = if delta < Decimal::ZERO {
            (Some(warehouse_id), None)
        } else {
            (None, Some(warehouse_id))
        };

        Self {
            transaction_type,
            quantity: delta.abs(),
            from_warehouse_id,
            to_warehouse_id,
        }
    }

    /// Check the warehouse linkage required by each movement type
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(
                "quantity",
                "movement quantity must be positive",
            ));
        }

        match self.transaction_type {
            TransactionType::Receipt if self.to_warehouse_id.is_none() => Err(
                DomainError::validation("to_warehouse", "a receipt requires a destination warehouse"),
            ),
            TransactionType::Issue if self.from_warehouse_id.is_none() => Err(
                DomainError::validation("from_warehouse", "an issue requires a source warehouse"),
            ),
            TransactionType::Transfer => match (self.from_warehouse_id, self.to_warehouse_id) {
                (Some(from), Some(to)) if from != to => Ok(()),
                (Some(_), Some(_)) => Err(DomainError::validation(
                    "to_warehouse",
                    "a transfer must move stock between different warehouses",
                )),
                _ => Err(DomainError::validation(
                    "warehouse",
                    "a transfer requires both source and destination warehouses",
                )),
            },
            TransactionType::Adjustment
                if self.from_warehouse_id.is_some() == self.to_warehouse_id.is_some() =>
            {
                Err(DomainError::validation(
                    "warehouse",
                    "an adjustment applies to exactly one warehouse",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Apply a signed change to a ledger balance.
///
/// A zero change is rejected, as is one the ledger column cannot hold
/// exactly. A change that would drive the balance below zero fails with
/// `InsufficientQuantity` and leaves nothing to write.
pub fn apply_delta(material_id: Uuid, current: Decimal, delta: Decimal) -> DomainResult<Decimal> {
    if delta.is_zero() {
        return Err(DomainError::validation(
            "quantity_change",
            "quantity change must not be zero",
        ));
    }
    ensure_storable("quantity_change", delta, MAX_QUANTITY)?;

    if delta < Decimal::ZERO && delta.abs() > current {
        return Err(DomainError::InsufficientQuantity {
            material_id,
            available: current,
            requested: delta.abs(),
        });
    }

    let balance = current + delta;
    if balance > MAX_QUANTITY {
        return Err(DomainError::validation(
            "quantity_change",
            format!("resulting quantity {} exceeds the maximum of {}", balance, MAX_QUANTITY),
        ));
    }

    Ok(balance)
}

/// Whether a monitored position has dropped under its minimum
pub fn is_below_minimum(quantity: Decimal, min_quantity: Decimal, monitor_stock_level: bool) -> bool {
    monitor_stock_level && quantity < min_quantity
}

/// Raised after a committed movement leaves a monitored position low
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockAlert {
    pub inventory_item_id: Uuid,
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
}

impl LowStockAlert {
    pub fn message(&self, material_label: &str) -> String {
        format!(
            "Stock of {} is {} which is below the minimum of {}",
            material_label, self.quantity, self.min_quantity
        )
    }
}
