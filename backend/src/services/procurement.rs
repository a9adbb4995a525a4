//! Procurement service: suppliers, purchase orders and goods receiving

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::models::{
    line_total, plan_receipt, PurchaseOrderItemStatus, PurchaseOrderStatus, ReceiptLine,
    StockReference, TransactionType,
};
use shared::types::{DocumentKind, PaginatedResponse, Pagination};
use shared::validation::{validate_code, validate_non_negative, validate_positive};

use crate::error::{AppError, AppResult};
use crate::models::{InventoryItem, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem, Supplier};
use crate::repositories::{self, inventory as inventory_repo, procurement as repo};
use crate::repositories::procurement::{ORDER_COLUMNS, ORDER_ITEM_COLUMNS};
use crate::services::inventory::{post_movement, InventoryService, Posting};
use crate::services::notification::{AlertEvent, AlertSender};

const SUPPLIER_COLUMNS: &str = "id, name, code, contact_person, email, phone, address, is_active, \
     created_at, updated_at";

#[derive(Clone)]
pub struct ProcurementService {
    db: PgPool,
    alerts: AlertSender,
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "validate_code")]
    pub code: String,
    #[validate(length(max = 100))]
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrderItemInput {
    pub material_id: Uuid,
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: Uuid,
    pub project_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate]
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderItemInput {
    #[validate(custom = "validate_positive")]
    pub quantity: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseOrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveItemsInput {
    pub items: Vec<ReceiptLine>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectInput {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Order with supplier name, as shown in lists
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PurchaseOrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    #[sqlx(try_from = "String")]
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub total_amount: Decimal,
}

impl ProcurementService {
    pub fn new(db: PgPool, alerts: AlertSender) -> Self {
        Self { db, alerts }
    }

    // ========================================================================
    // Suppliers
    // ========================================================================

    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            INSERT INTO suppliers (name, code, contact_person, email, phone, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(&input.code)
        .bind(input.contact_person.unwrap_or_default())
        .bind(input.email.unwrap_or_default())
        .bind(input.phone.unwrap_or_default())
        .bind(input.address.unwrap_or_default())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_duplicate(e, format!("Supplier with code {}", input.code)))?;

        tracing::info!(supplier_id = %supplier.id, code = %supplier.code, "supplier created");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, supplier_id: Uuid) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier"))
    }

    pub async fn list_suppliers(
        &self,
        filter: &SupplierFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Supplier>> {
        const WHERE: &str = "($1::bool IS NULL OR is_active = $1) \
             AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR code ILIKE '%' || $2 || '%')";

        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE {WHERE} ORDER BY name LIMIT $3 OFFSET $4"
        ))
        .bind(filter.is_active)
        .bind(search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM suppliers WHERE {WHERE}"
        ))
        .bind(filter.is_active)
        .bind(search)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(suppliers, pagination, total.max(0) as u64))
    }

    pub async fn update_supplier(
        &self,
        supplier_id: Uuid,
        input: UpdateSupplierInput,
    ) -> AppResult<Supplier> {
        input.validate()?;

        sqlx::query_as::<_, Supplier>(&format!(
            r#"
            UPDATE suppliers
            SET name = COALESCE($2, name),
                contact_person = COALESCE($3, contact_person),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address)
            WHERE id = $1
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(supplier_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.contact_person)
        .bind(input.email)
        .bind(input.phone)
        .bind(input.address)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier"))
    }

    pub async fn set_supplier_active(&self, supplier_id: Uuid, active: bool) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(&format!(
            "UPDATE suppliers SET is_active = $2 WHERE id = $1 RETURNING {SUPPLIER_COLUMNS}"
        ))
        .bind(supplier_id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier"))
    }

    // ========================================================================
    // Purchase orders
    // ========================================================================

    /// Create a draft order, optionally with its first lines
    pub async fn create_order(
        &self,
        created_by: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        input.validate()?;

        let supplier = self.get_supplier(input.supplier_id).await?;
        if !supplier.is_active {
            return Err(AppError::validation("supplier_id", "Supplier is not active"));
        }

        if let (Some(order_date), Some(expected)) = (input.order_date, input.expected_delivery) {
            if expected < order_date {
                return Err(AppError::validation(
                    "expected_delivery",
                    "Expected delivery cannot be before the order date",
                ));
            }
        }

        let order_date = input.order_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let order_number =
            repositories::next_document_number(&mut tx, DocumentKind::PurchaseOrder, order_date)
                .await?;

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            INSERT INTO purchase_orders (order_number, supplier_id, project_id, warehouse_id,
                                         order_date, expected_delivery, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order_number)
        .bind(input.supplier_id)
        .bind(input.project_id)
        .bind(input.warehouse_id)
        .bind(order_date)
        .bind(input.expected_delivery)
        .bind(input.notes.unwrap_or_default())
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_constraint(e, format!("Purchase order {}", order_number)))?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            items.push(Self::insert_line(&mut tx, order.id, item).await?);
        }
        repo::recompute_total(&mut *tx, order.id).await?;
        let order = repo::find_order(&mut *tx, order.id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;

        tx.commit().await?;

        tracing::info!(order_id = %order.id, order_number = %order.order_number, "purchase order created");
        Ok(PurchaseOrderDetail { order, items })
    }

    async fn insert_line(
        conn: &mut sqlx::PgConnection,
        order_id: Uuid,
        input: &OrderItemInput,
    ) -> AppResult<PurchaseOrderItem> {
        let total_price = line_total(input.quantity, input.unit_price)?;

        sqlx::query_as::<_, PurchaseOrderItem>(&format!(
            r#"
            INSERT INTO purchase_order_items (purchase_order_id, material_id, quantity,
                                              unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_ITEM_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(input.material_id)
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(total_price)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::on_constraint(e, "A line for this material"))
    }

    /// Add a line to a draft order
    pub async fn add_item(
        &self,
        order_id: Uuid,
        input: OrderItemInput,
    ) -> AppResult<PurchaseOrderItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let order = repo::lock_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        ensure_editable(&order)?;

        let item = Self::insert_line(&mut tx, order.id, &input).await?;
        repo::recompute_total(&mut *tx, order.id).await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Change quantity or unit price of a line on a draft order
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateOrderItemInput,
    ) -> AppResult<PurchaseOrderItem> {
        input.validate()?;

        let existing = repo::find_order_item(&self.db, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order item"))?;

        let mut tx = self.db.begin().await?;

        let order = repo::lock_order(&mut *tx, existing.purchase_order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        ensure_editable(&order)?;

        let quantity = input.quantity.unwrap_or(existing.quantity);
        let unit_price = input.unit_price.unwrap_or(existing.unit_price);
        let total_price = line_total(quantity, unit_price)?;

        let item = sqlx::query_as::<_, PurchaseOrderItem>(&format!(
            r#"
            UPDATE purchase_order_items
            SET quantity = $2, unit_price = $3, total_price = $4
            WHERE id = $1
            RETURNING {ORDER_ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(total_price)
        .fetch_one(&mut *tx)
        .await?;

        let total = repo::recompute_total(&mut *tx, order.id).await?;

        tx.commit().await?;

        tracing::info!(order_id = %order.id, item_id = %item.id, total = %total, "order line updated");
        Ok(item)
    }

    pub async fn get_order(&self, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        let order = repo::find_order(&self.db, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        let items = repo::order_items(&self.db, order_id).await?;

        Ok(PurchaseOrderDetail { order, items })
    }

    pub async fn list_orders(
        &self,
        filter: &PurchaseOrderFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<PurchaseOrder>> {
        const WHERE: &str = "($1::varchar IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR supplier_id = $2) \
             AND ($3::uuid IS NULL OR project_id = $3)";

        let status = filter.status.map(|s| s.as_str());

        let orders = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE {WHERE} \
             ORDER BY order_date DESC, order_number DESC LIMIT $4 OFFSET $5"
        ))
        .bind(status)
        .bind(filter.supplier_id)
        .bind(filter.project_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM purchase_orders WHERE {WHERE}"
        ))
        .bind(status)
        .bind(filter.supplier_id)
        .bind(filter.project_id)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(orders, pagination, total.max(0) as u64))
    }

    /// Open orders expected within `days` days
    pub async fn due_soon(&self, days: u32) -> AppResult<Vec<PurchaseOrderSummary>> {
        let orders = sqlx::query_as::<_, PurchaseOrderSummary>(
            r#"
            SELECT po.id, po.order_number, po.supplier_id, s.name AS supplier_name, po.status,
                   po.order_date, po.expected_delivery, po.total_amount
            FROM purchase_orders po
            JOIN suppliers s ON s.id = po.supplier_id
            WHERE po.expected_delivery BETWEEN CURRENT_DATE AND CURRENT_DATE + $1::int
              AND po.status IN ('approved', 'sent', 'confirmed', 'partially_received')
            ORDER BY po.expected_delivery, po.order_number
            "#,
        )
        .bind(days.min(3650) as i32)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    /// Lock the order, check the allow-list and persist the new status
    async fn transition(
        &self,
        order_id: Uuid,
        next: PurchaseOrderStatus,
        note: Option<String>,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;

        let order = repo::lock_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        let status = order.status.transition_to(next).map_err(|e| {
            tracing::warn!(order_id = %order_id, "rejected transition: {}", e);
            e
        })?;

        if status == PurchaseOrderStatus::PendingApproval {
            let lines = repo::order_items(&mut *tx, order_id).await?;
            if lines.is_empty() {
                return Err(AppError::validation(
                    "items",
                    "A purchase order needs at least one item before submission",
                ));
            }
        }
        if status == PurchaseOrderStatus::Cancelled {
            repo::set_line_statuses(&mut *tx, order_id, PurchaseOrderItemStatus::Cancelled).await?;
        }

        if let Some(note) = note {
            sqlx::query(
                "UPDATE purchase_orders \
                 SET notes = CASE WHEN notes = '' THEN $2 ELSE notes || E'\\n' || $2 END \
                 WHERE id = $1",
            )
            .bind(order_id)
            .bind(note)
            .execute(&mut *tx)
            .await?;
        }

        let order = repo::set_order_status(&mut *tx, order_id, status).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, status = %order.status, "purchase order status changed");
        Ok(order)
    }

    pub async fn submit(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(order_id, PurchaseOrderStatus::PendingApproval, None).await
    }

    /// Approve a pending order; its lines become ordered
    pub async fn approve(&self, order_id: Uuid, approved_by: Uuid) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;

        let order = repo::lock_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        let status = order.status.transition_to(PurchaseOrderStatus::Approved)?;

        repo::set_line_statuses(&mut *tx, order_id, PurchaseOrderItemStatus::Ordered).await?;

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_orders
            SET status = $2, approved_by = $3, approved_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(status.as_str())
        .bind(approved_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order.id, approved_by = %approved_by, "purchase order approved");
        Ok(order)
    }

    /// Reject a pending order, appending the reason to its notes
    pub async fn reject(&self, order_id: Uuid, input: RejectInput) -> AppResult<PurchaseOrder> {
        input.validate()?;
        let note = input
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("Rejection reason: {}", r));

        self.transition(order_id, PurchaseOrderStatus::Rejected, note).await
    }

    pub async fn send(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(order_id, PurchaseOrderStatus::Sent, None).await
    }

    pub async fn confirm(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(order_id, PurchaseOrderStatus::Confirmed, None).await
    }

    pub async fn cancel(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(order_id, PurchaseOrderStatus::Cancelled, None).await
    }

    pub async fn complete(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(order_id, PurchaseOrderStatus::Completed, None).await
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Book delivered quantities against the order's lines and credit the
    /// ledger of the order's warehouse, all in one transaction.
    ///
    /// Each material must already have an unlocated position in that
    /// warehouse; no position is created implicitly.
    pub async fn receive_items(
        &self,
        order_id: Uuid,
        performed_by: Uuid,
        input: ReceiveItemsInput,
    ) -> AppResult<PurchaseOrderDetail> {
        let mut tx = self.db.begin().await?;

        let order = repo::lock_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        let lines = repo::order_items(&mut *tx, order_id).await?;
        let order_lines: Vec<_> = lines.iter().map(PurchaseOrderItem::to_line).collect();

        let plan = plan_receipt(order.status, &order_lines, &input.items).map_err(|e| {
            tracing::warn!(order_id = %order_id, "receipt rejected: {}", e);
            e
        })?;

        // Lock positions in material order
        let mut materials: Vec<Uuid> = plan.receipts.iter().map(|r| r.material_id).collect();
        materials.sort();
        materials.dedup();

        let mut positions: HashMap<Uuid, InventoryItem> = HashMap::new();
        for material_id in materials {
            let position =
                inventory_repo::lock_position(&mut *tx, material_id, order.warehouse_id, None)
                    .await?
                    .ok_or_else(|| {
                        AppError::validation(
                            "material_id",
                            format!(
                                "No inventory record for material {} in the order's warehouse",
                                material_id
                            ),
                        )
                    })?;
            positions.insert(material_id, position);
        }

        let notes = format!("Receipt from PO {}", order.order_number);
        for receipt in &plan.receipts {
            let position = positions
                .get(&receipt.material_id)
                .ok_or_else(|| AppError::Internal("position not locked".to_string()))?;

            let (updated, _) = post_movement(
                &mut tx,
                position,
                Posting {
                    transaction_type: TransactionType::Receipt,
                    delta: receipt.quantity,
                    reference: StockReference::PurchaseOrderItem(receipt.item_id),
                    performed_by,
                    notes: notes.clone(),
                },
            )
            .await?;
            positions.insert(receipt.material_id, updated);

            repo::record_line_receipt(
                &mut *tx,
                receipt.item_id,
                receipt.received_quantity,
                receipt.status,
            )
            .await?;
        }

        let order = repo::set_order_status(&mut *tx, order_id, plan.order_status).await?;
        let items = repo::order_items(&mut *tx, order_id).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            lines = plan.receipts.len(),
            status = %order.status,
            "purchase order received"
        );
        InventoryService::raise_low_stock(&self.alerts, positions.values());
        self.alerts.notify(AlertEvent::PurchaseOrderReceived {
            order_id: order.id,
            order_number: order.order_number.clone(),
            created_by: order.created_by,
            fully_received: order.status == PurchaseOrderStatus::FullyReceived,
        });

        Ok(PurchaseOrderDetail { order, items })
    }
}

fn ensure_editable(order: &PurchaseOrder) -> AppResult<()> {
    if order.status.is_editable() {
        Ok(())
    } else {
        Err(AppError::validation(
            "status",
            format!(
                "Items can only be changed on draft orders (current status: {})",
                order.status
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_item_input_checks_quantity_and_price() {
        let bad = OrderItemInput {
            material_id: Uuid::new_v4(),
            quantity: Decimal::ZERO,
            unit_price: Decimal::NEGATIVE_ONE,
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("quantity"));
        assert!(fields.contains_key("unit_price"));
    }

    #[test]
    fn nested_items_are_validated() {
        let input = CreatePurchaseOrderInput {
            supplier_id: Uuid::new_v4(),
            project_id: None,
            warehouse_id: Uuid::new_v4(),
            order_date: None,
            expected_delivery: None,
            notes: None,
            items: vec![OrderItemInput {
                material_id: Uuid::new_v4(),
                quantity: Decimal::ZERO,
                unit_price: Decimal::ONE,
            }],
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn supplier_email_must_be_valid() {
        let input = CreateSupplierInput {
            name: "Acme".into(),
            code: "ACME".into(),
            contact_person: None,
            email: Some("not-an-email".into()),
            phone: None,
            address: None,
        };
        assert!(input.validate().is_err());
    }
}
