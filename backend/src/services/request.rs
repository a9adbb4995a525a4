//! Material request service: drafting, approval and fulfillment from stock

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::models::{
    plan_fulfillment, plan_partial_fulfillment, RequestItemStatus, RequestStatus, StockReference,
    TransactionType,
};
use shared::types::{DocumentKind, PaginatedResponse, Pagination};
use shared::validation::validate_positive;

use crate::error::{AppError, AppResult};
use crate::models::{InventoryItem, Request, RequestDetail, RequestItem};
use crate::repositories::request::{REQUEST_COLUMNS, REQUEST_ITEM_COLUMNS};
use crate::repositories::{self, inventory as inventory_repo, request as repo};
use crate::services::inventory::{post_movement, InventoryService, Posting};
use crate::services::notification::{AlertEvent, AlertSender};

#[derive(Clone)]
pub struct RequestService {
    db: PgPool,
    alerts: AlertSender,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestItemInput {
    pub material_id: Uuid,
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequestInput {
    pub project_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub notes: Option<String>,
    #[validate]
    #[serde(default)]
    pub items: Vec<RequestItemInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub project_id: Option<Uuid>,
    pub requested_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequestInput {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PartialFulfillInput {
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
}

impl RequestService {
    pub fn new(db: PgPool, alerts: AlertSender) -> Self {
        Self { db, alerts }
    }

    async fn insert_item(
        conn: &mut PgConnection,
        request_id: Uuid,
        input: &RequestItemInput,
    ) -> AppResult<RequestItem> {
        let item = sqlx::query_as::<_, RequestItem>(&format!(
            r#"
            INSERT INTO request_items (request_id, material_id, quantity, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING {REQUEST_ITEM_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(input.material_id)
        .bind(input.quantity)
        .bind(input.notes.clone().unwrap_or_default())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::on_constraint(e, "Request line"))?;

        Ok(item)
    }

    /// Create a draft request with its lines
    pub async fn create_request(
        &self,
        requested_by: Uuid,
        input: CreateRequestInput,
    ) -> AppResult<RequestDetail> {
        input.validate()?;

        let project_ok = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)",
        )
        .bind(input.project_id)
        .fetch_one(&self.db)
        .await?;
        if !project_ok {
            return Err(AppError::not_found("Project"));
        }

        let mut tx = self.db.begin().await?;

        let number =
            repositories::next_document_number(&mut tx, DocumentKind::Request, Utc::now().date_naive())
                .await?;

        let request = sqlx::query_as::<_, Request>(&format!(
            r#"
            INSERT INTO requests (number, project_id, warehouse_id, title, notes, requested_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(&number)
        .bind(input.project_id)
        .bind(input.warehouse_id)
        .bind(input.title.trim())
        .bind(input.notes.clone().unwrap_or_default())
        .bind(requested_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_constraint(e, format!("Request {}", number)))?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            items.push(Self::insert_item(&mut tx, request.id, item).await?);
        }

        tx.commit().await?;

        tracing::info!(request_id = %request.id, number = %request.number, "request created");
        Ok(RequestDetail { request, items })
    }

    /// Add a line to a draft request
    pub async fn add_item(&self, request_id: Uuid, input: RequestItemInput) -> AppResult<RequestItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let request = repo::lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request"))?;
        if request.status != RequestStatus::Draft {
            return Err(AppError::validation(
                "status",
                format!("Items can only be added to draft requests (current status: {})", request.status),
            ));
        }

        let item = Self::insert_item(&mut tx, request_id, &input).await?;
        tx.commit().await?;

        Ok(item)
    }

    pub async fn get_request(&self, request_id: Uuid) -> AppResult<RequestDetail> {
        let request = repo::find_request(&self.db, request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request"))?;
        let items = repo::request_items(&self.db, request_id).await?;

        Ok(RequestDetail { request, items })
    }

    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Request>> {
        const WHERE: &str = "($1::varchar IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR project_id = $2) \
             AND ($3::uuid IS NULL OR requested_by = $3)";

        let status = filter.status.map(|s| s.as_str());

        let requests = sqlx::query_as::<_, Request>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(status)
        .bind(filter.project_id)
        .bind(filter.requested_by)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM requests WHERE {WHERE}"
        ))
        .bind(status)
        .bind(filter.project_id)
        .bind(filter.requested_by)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(requests, pagination, total.max(0) as u64))
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    async fn transition(
        &self,
        request_id: Uuid,
        next: RequestStatus,
        approved_by: Option<Uuid>,
        note: Option<String>,
    ) -> AppResult<Request> {
        let mut tx = self.db.begin().await?;

        let request = repo::lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request"))?;
        let status = request.status.transition_to(next).map_err(|e| {
            tracing::warn!(request_id = %request_id, "rejected transition: {}", e);
            e
        })?;

        if status == RequestStatus::PendingApproval {
            let items = repo::request_items(&mut *tx, request_id).await?;
            if items.is_empty() {
                return Err(AppError::validation(
                    "items",
                    "A request needs at least one item before submission",
                ));
            }
        }
        if status == RequestStatus::Cancelled {
            let open: Vec<Uuid> = repo::request_items(&mut *tx, request_id)
                .await?
                .iter()
                .filter(|i| i.status.is_open())
                .map(|i| i.id)
                .collect();
            repo::set_item_statuses(&mut *tx, request_id, &open, RequestItemStatus::Cancelled)
                .await?;
        }

        let request = sqlx::query_as::<_, Request>(&format!(
            r#"
            UPDATE requests
            SET status = $2,
                approved_by = COALESCE($3, approved_by),
                approved_at = CASE WHEN $3::uuid IS NULL THEN approved_at ELSE NOW() END,
                notes = CASE
                    WHEN $4::text IS NULL THEN notes
                    WHEN notes = '' THEN $4
                    ELSE notes || E'\n' || $4
                END
            WHERE id = $1
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(status.as_str())
        .bind(approved_by)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(request_id = %request.id, status = %request.status, "request status changed");
        Ok(request)
    }

    pub async fn submit(&self, request_id: Uuid) -> AppResult<Request> {
        self.transition(request_id, RequestStatus::PendingApproval, None, None).await
    }

    pub async fn approve(&self, request_id: Uuid, approved_by: Uuid) -> AppResult<Request> {
        let request = self
            .transition(request_id, RequestStatus::Approved, Some(approved_by), None)
            .await?;

        self.alerts.notify(AlertEvent::RequestApproved {
            request_id: request.id,
            number: request.number.clone(),
            requested_by: request.requested_by,
        });
        Ok(request)
    }

    /// Reject a pending request; the reason is appended to its notes
    pub async fn reject(&self, request_id: Uuid, input: RejectRequestInput) -> AppResult<Request> {
        input.validate()?;
        let note = format!("Rejection reason: {}", input.reason.trim());
        self.transition(request_id, RequestStatus::Rejected, None, Some(note)).await
    }

    pub async fn cancel(&self, request_id: Uuid) -> AppResult<Request> {
        self.transition(request_id, RequestStatus::Cancelled, None, None).await
    }

    // ========================================================================
    // Fulfillment
    // ========================================================================

    /// Issue every outstanding line from the request's warehouse.
    ///
    /// All lines are checked against stock before anything is written; one
    /// shortage fails the whole call.
    pub async fn fulfill(&self, request_id: Uuid, performed_by: Uuid) -> AppResult<RequestDetail> {
        let mut tx = self.db.begin().await?;

        let request = repo::lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request"))?;
        let items = repo::request_items(&mut *tx, request_id).await?;
        let lines: Vec<_> = items.iter().map(RequestItem::to_line).collect();

        let mut materials: Vec<Uuid> = lines
            .iter()
            .filter(|l| !l.is_fulfilled)
            .map(|l| l.material_id)
            .collect();
        materials.sort();
        materials.dedup();

        let mut positions: HashMap<Uuid, InventoryItem> = HashMap::new();
        for material_id in materials {
            if let Some(position) =
                inventory_repo::lock_position(&mut *tx, material_id, request.warehouse_id, None).await?
            {
                positions.insert(material_id, position);
            }
        }

        let issues = plan_fulfillment(request.status, &lines, |material_id| {
            positions.get(&material_id).map(|p| p.quantity)
        })
        .map_err(|e| {
            tracing::warn!(request_id = %request_id, "fulfillment rejected: {}", e);
            e
        })?;

        let notes = format!("Fulfillment of request {}", request.number);
        for issue in &issues {
            let position = positions
                .get(&issue.material_id)
                .ok_or_else(|| AppError::Internal("position not locked".to_string()))?;

            let (updated, _) = post_movement(
                &mut tx,
                position,
                Posting {
                    transaction_type: TransactionType::Issue,
                    delta: -issue.quantity,
                    reference: StockReference::Project(request.project_id),
                    performed_by,
                    notes: notes.clone(),
                },
            )
            .await?;
            positions.insert(issue.material_id, updated);

            let line = items
                .iter()
                .find(|i| i.id == issue.item_id)
                .ok_or_else(|| AppError::Internal("planned line missing".to_string()))?;
            repo::record_line_fulfillment(
                &mut *tx,
                issue.item_id,
                line.quantity,
                true,
                RequestItemStatus::Fulfilled,
            )
            .await?;
        }

        let status = request.status.transition_to(RequestStatus::Completed)?;
        let request =
            repo::set_request_status(&mut *tx, request_id, status, Some(Utc::now())).await?;
        let items = repo::request_items(&mut *tx, request_id).await?;

        tx.commit().await?;

        tracing::info!(request_id = %request.id, lines = issues.len(), "request fulfilled");
        InventoryService::raise_low_stock(&self.alerts, positions.values());

        Ok(RequestDetail { request, items })
    }

    /// Issue part of one line. The request moves to in progress, or to
    /// completed once every line is fulfilled.
    pub async fn partially_fulfill(
        &self,
        item_id: Uuid,
        performed_by: Uuid,
        input: PartialFulfillInput,
    ) -> AppResult<RequestItem> {
        input.validate()?;

        let request_id = repo::find_request_item(&self.db, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request item"))?
            .request_id;

        let mut tx = self.db.begin().await?;

        let request = repo::lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request"))?;
        let item = repo::find_request_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request item"))?;

        let position =
            inventory_repo::lock_position(&mut *tx, item.material_id, request.warehouse_id, None)
                .await?
                .ok_or_else(|| {
                    AppError::validation(
                        "material_id",
                        format!("No inventory found for material {}", item.material_id),
                    )
                })?;

        let outcome =
            plan_partial_fulfillment(request.status, &item.to_line(), input.quantity, position.quantity)?;

        let (position, _) = post_movement(
            &mut tx,
            &position,
            Posting {
                transaction_type: TransactionType::Issue,
                delta: -input.quantity,
                reference: StockReference::Project(request.project_id),
                performed_by,
                notes: format!("Partial fulfillment of request {}", request.number),
            },
        )
        .await?;

        let item = repo::record_line_fulfillment(
            &mut *tx,
            item_id,
            outcome.quantity_fulfilled,
            outcome.is_fulfilled,
            outcome.item_status,
        )
        .await?;

        let all_fulfilled = repo::request_items(&mut *tx, request_id)
            .await?
            .iter()
            .all(|i| i.is_fulfilled);
        let (next, fulfilled_at) = if all_fulfilled {
            (RequestStatus::Completed, Some(Utc::now()))
        } else {
            (RequestStatus::InProgress, None)
        };
        let status = request.status.transition_to(next)?;
        repo::set_request_status(&mut *tx, request_id, status, fulfilled_at).await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            item_id = %item.id,
            quantity = %input.quantity,
            status = %status,
            "request item partially fulfilled"
        );
        InventoryService::raise_low_stock(&self.alerts, [&position]);

        Ok(item)
    }
}
