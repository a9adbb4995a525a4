//! Per-user dashboard summary

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::models::{ProjectStatus, RequestStatus};

use crate::error::AppResult;
use crate::models::{InventoryItem, Project, Request};
use crate::repositories::inventory::ITEM_COLUMNS;
use crate::repositories::request::REQUEST_COLUMNS;
use crate::services::notification::{AlertSender, NotificationService};
use crate::services::procurement::{ProcurementService, PurchaseOrderSummary};
use crate::services::projects::ProjectService;

const RECENT: i64 = 5;
const PROJECT_HORIZON_DAYS: u32 = 30;
const DELIVERY_HORIZON_DAYS: u32 = 7;

#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub managed: i64,
    pub active: i64,
    pub ending_soon: Vec<Project>,
    pub recent: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct InventorySummary {
    pub low_count: i64,
    pub low_items: Vec<InventoryItem>,
}

#[derive(Debug, Serialize)]
pub struct RequestSummary {
    pub mine: i64,
    pub pending_approval: i64,
    pub recent: Vec<Request>,
}

#[derive(Debug, Serialize)]
pub struct ProcurementSummary {
    pub due_soon: Vec<PurchaseOrderSummary>,
    pub recent: Vec<PurchaseOrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub projects: ProjectSummary,
    pub inventory: InventorySummary,
    pub requests: RequestSummary,
    pub procurement: ProcurementSummary,
    pub unread_notifications: i64,
}

pub struct DashboardService {
    db: PgPool,
    alerts: AlertSender,
}

impl DashboardService {
    pub fn new(db: PgPool, alerts: AlertSender) -> Self {
        Self { db, alerts }
    }

    pub async fn for_user(&self, user_id: Uuid) -> AppResult<Dashboard> {
        Ok(Dashboard {
            projects: self.projects(user_id).await?,
            inventory: self.inventory().await?,
            requests: self.requests(user_id).await?,
            procurement: self.procurement().await?,
            unread_notifications: NotificationService::new(self.db.clone())
                .unread_count(user_id)
                .await?,
        })
    }

    async fn projects(&self, user_id: Uuid) -> AppResult<ProjectSummary> {
        let (managed, active) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = $2) \
             FROM projects WHERE manager_id = $1",
        )
        .bind(user_id)
        .bind(ProjectStatus::Active.as_str())
        .fetch_one(&self.db)
        .await?;

        let service = ProjectService::new(self.db.clone());
        let ending_soon = service.ending_soon(PROJECT_HORIZON_DAYS, Some(user_id)).await?;

        let recent = sqlx::query_as::<_, Project>(
            "SELECT id, name, number, start_date, end_date, status, manager_id, description, \
                    created_at, updated_at \
             FROM projects WHERE manager_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(RECENT)
        .fetch_all(&self.db)
        .await?;

        Ok(ProjectSummary {
            managed,
            active,
            ending_soon,
            recent,
        })
    }

    async fn inventory(&self) -> AppResult<InventorySummary> {
        const LOW: &str = "monitor_stock_level AND quantity < min_quantity";

        let low_count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory_items WHERE {LOW}"
        ))
        .fetch_one(&self.db)
        .await?;

        let low_items = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE {LOW} \
             ORDER BY (min_quantity - quantity) DESC LIMIT $1"
        ))
        .bind(RECENT)
        .fetch_all(&self.db)
        .await?;

        Ok(InventorySummary {
            low_count,
            low_items,
        })
    }

    async fn requests(&self, user_id: Uuid) -> AppResult<RequestSummary> {
        let (mine, pending_approval) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE requested_by = $1), \
                    COUNT(*) FILTER (WHERE status = $2) \
             FROM requests",
        )
        .bind(user_id)
        .bind(RequestStatus::PendingApproval.as_str())
        .fetch_one(&self.db)
        .await?;

        let recent = sqlx::query_as::<_, Request>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE requested_by = $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(RECENT)
        .fetch_all(&self.db)
        .await?;

        Ok(RequestSummary {
            mine,
            pending_approval,
            recent,
        })
    }

    async fn procurement(&self) -> AppResult<ProcurementSummary> {
        let service = ProcurementService::new(self.db.clone(), self.alerts.clone());
        let due_soon = service.due_soon(DELIVERY_HORIZON_DAYS).await?;

        let recent = sqlx::query_as::<_, PurchaseOrderSummary>(
            r#"
            SELECT po.id, po.order_number, po.supplier_id, s.name AS supplier_name, po.status,
                   po.order_date, po.expected_delivery, po.total_amount
            FROM purchase_orders po
            JOIN suppliers s ON s.id = po.supplier_id
            ORDER BY po.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT)
        .fetch_all(&self.db)
        .await?;

        Ok(ProcurementSummary { due_soon, recent })
    }
}
