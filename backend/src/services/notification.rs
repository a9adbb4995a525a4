//! Notification service
//!
//! Supports:
//! - Alert rules (which events a user wants to hear about)
//! - In-app notifications (list, unread count, mark read)
//! - A bounded queue plus background worker that turns committed stock
//!   and workflow events into notifications

use std::collections::HashSet;

use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

use shared::models::{AlertType, LowStockAlert};
use shared::types::{PaginatedResponse, Pagination};

use crate::error::{AppError, AppResult};
use crate::models::{AlertRule, Notification};

const NOTIFICATION_COLUMNS: &str = "id, user_id, alert_rule_id, title, message, entity_type, \
     entity_id, is_read, read_at, created_at";

const RULE_COLUMNS: &str =
    "id, name, alert_type, material_id, owner_id, is_active, created_at, updated_at";

// ============================================================================
// Alert queue
// ============================================================================

/// Event raised after a unit of work has committed
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    LowStock(LowStockAlert),
    PurchaseOrderReceived {
        order_id: Uuid,
        order_number: String,
        created_by: Uuid,
        fully_received: bool,
    },
    RequestApproved {
        request_id: Uuid,
        number: String,
        requested_by: Uuid,
    },
}

impl AlertEvent {
    pub fn alert_type(&self) -> AlertType {
        match self {
            AlertEvent::LowStock(_) => AlertType::InventoryLow,
            AlertEvent::PurchaseOrderReceived { .. } => AlertType::PoReceived,
            AlertEvent::RequestApproved { .. } => AlertType::RequestApproved,
        }
    }

    /// Material the event concerns, used to match material-scoped rules
    pub fn material_id(&self) -> Option<Uuid> {
        match self {
            AlertEvent::LowStock(alert) => Some(alert.material_id),
            _ => None,
        }
    }

    /// User who should hear about the event regardless of rules
    pub fn direct_recipient(&self) -> Option<Uuid> {
        match self {
            AlertEvent::LowStock(_) => None,
            AlertEvent::PurchaseOrderReceived { created_by, .. } => Some(*created_by),
            AlertEvent::RequestApproved { requested_by, .. } => Some(*requested_by),
        }
    }
}

/// Sending half of the alert queue.
///
/// `notify` never blocks and never fails the caller: a full or closed
/// queue drops the event with a warning.
#[derive(Clone, Debug)]
pub struct AlertSender {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertSender {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue an event; returns whether it was accepted
    pub fn notify(&self, event: AlertEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(alert_type = %event.alert_type(), "alert queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(alert_type = %event.alert_type(), "alert queue closed, dropping event");
                false
            }
        }
    }
}

/// Drain the queue until every sender is gone, delivering each event
pub fn spawn_alert_worker(db: PgPool, mut rx: mpsc::Receiver<AlertEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let service = NotificationService::new(db);
        while let Some(event) = rx.recv().await {
            match service.deliver(&event).await {
                Ok(count) => {
                    tracing::debug!(alert_type = %event.alert_type(), count, "alert delivered")
                }
                Err(e) => {
                    tracing::error!(alert_type = %event.alert_type(), "failed to deliver alert: {}", e)
                }
            }
        }
        tracing::info!("alert worker stopped");
    })
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAlertRuleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub alert_type: AlertType,
    pub material_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Title and message of a notification before recipients are resolved
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
}

/// Build the notification text for an event
pub fn draft_for(event: &AlertEvent, material_label: Option<&str>) -> NotificationDraft {
    match event {
        AlertEvent::LowStock(alert) => {
            let label = material_label
                .map(str::to_string)
                .unwrap_or_else(|| alert.material_id.to_string());
            NotificationDraft {
                title: "Low stock alert".to_string(),
                message: alert.message(&label),
                entity_type: "inventory_item",
                entity_id: alert.inventory_item_id,
            }
        }
        AlertEvent::PurchaseOrderReceived {
            order_id,
            order_number,
            fully_received,
            ..
        } => NotificationDraft {
            title: format!("Goods received: {}", order_number),
            message: if *fully_received {
                format!("Purchase order {} has been fully received", order_number)
            } else {
                format!("Purchase order {} has been partially received", order_number)
            },
            entity_type: "purchase_order",
            entity_id: *order_id,
        },
        AlertEvent::RequestApproved {
            request_id, number, ..
        } => NotificationDraft {
            title: format!("Request approved: {}", number),
            message: format!("Material request {} has been approved", number),
            entity_type: "request",
            entity_id: *request_id,
        },
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
}

impl NotificationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Insert one notification per interested user; returns how many
    pub async fn deliver(&self, event: &AlertEvent) -> AppResult<usize> {
        let material_label = match event.material_id() {
            Some(material_id) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT name || ' (' || code || ')' FROM materials WHERE id = $1",
                )
                .bind(material_id)
                .fetch_optional(&self.db)
                .await?
            }
            None => None,
        };
        let draft = draft_for(event, material_label.as_deref());

        let rules = sqlx::query_as::<_, AlertRule>(&format!(
            r#"
            SELECT {RULE_COLUMNS} FROM alert_rules
            WHERE is_active AND alert_type = $1
              AND (material_id IS NULL OR material_id = $2)
            "#
        ))
        .bind(event.alert_type().as_str())
        .bind(event.material_id())
        .fetch_all(&self.db)
        .await?;

        let mut seen = HashSet::new();
        let mut recipients: Vec<(Uuid, Option<Uuid>)> = Vec::new();
        if let Some(user_id) = event.direct_recipient() {
            seen.insert(user_id);
            recipients.push((user_id, None));
        }
        for rule in &rules {
            if seen.insert(rule.owner_id) {
                recipients.push((rule.owner_id, Some(rule.id)));
            }
        }

        for (user_id, rule_id) in &recipients {
            self.insert(*user_id, *rule_id, &draft).await?;
        }

        Ok(recipients.len())
    }

    async fn insert(
        &self,
        user_id: Uuid,
        alert_rule_id: Option<Uuid>,
        draft: &NotificationDraft,
    ) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (user_id, alert_rule_id, title, message, entity_type, entity_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(alert_rule_id)
        .bind(&draft.title)
        .bind(&draft.message)
        .bind(draft.entity_type)
        .bind(draft.entity_id)
        .fetch_one(&self.db)
        .await?;

        Ok(notification)
    }

    /// Notifications of a user, newest first
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        query: &NotificationQuery,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(query.unread_only)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
        )
        .bind(user_id)
        .bind(query.unread_only)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            notifications,
            pagination,
            total.max(0) as u64,
        ))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Notification"))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW() \
             WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Alert rules
    // ========================================================================

    pub async fn create_rule(
        &self,
        owner_id: Uuid,
        input: CreateAlertRuleInput,
    ) -> AppResult<AlertRule> {
        input.validate()?;

        if input.material_id.is_some() && input.alert_type != AlertType::InventoryLow {
            return Err(AppError::validation(
                "material_id",
                "Only inventory_low rules can be scoped to a material",
            ));
        }

        let rule = sqlx::query_as::<_, AlertRule>(&format!(
            r#"
            INSERT INTO alert_rules (name, alert_type, material_id, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(input.alert_type.as_str())
        .bind(input.material_id)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(rule_id = %rule.id, alert_type = %rule.alert_type, "alert rule created");
        Ok(rule)
    }

    pub async fn list_rules(&self, owner_id: Uuid) -> AppResult<Vec<AlertRule>> {
        let rules = sqlx::query_as::<_, AlertRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM alert_rules WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rules)
    }

    /// Flip `is_active` on one of the caller's rules
    pub async fn toggle_rule(&self, owner_id: Uuid, rule_id: Uuid) -> AppResult<AlertRule> {
        sqlx::query_as::<_, AlertRule>(&format!(
            r#"
            UPDATE alert_rules SET is_active = NOT is_active
            WHERE id = $1 AND owner_id = $2
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Alert rule"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn low_stock() -> AlertEvent {
        AlertEvent::LowStock(LowStockAlert {
            inventory_item_id: Uuid::new_v4(),
            material_id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            quantity: Decimal::from(5),
            min_quantity: Decimal::from(10),
        })
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (sender, mut rx) = AlertSender::channel(1);
        assert!(sender.notify(low_stock()));
        assert!(!sender.notify(low_stock()));

        assert!(rx.recv().await.is_some());
        assert!(sender.notify(low_stock()));
    }

    #[tokio::test]
    async fn closed_queue_is_reported_not_raised() {
        let (sender, rx) = AlertSender::channel(4);
        drop(rx);
        assert!(!sender.notify(low_stock()));
    }

    #[test]
    fn low_stock_draft_names_material() {
        let event = low_stock();
        let draft = draft_for(&event, Some("Cement (CEM-01)"));
        assert_eq!(draft.entity_type, "inventory_item");
        assert_eq!(
            draft.message,
            "Stock of Cement (CEM-01) is 5 which is below the minimum of 10"
        );
        assert_eq!(event.alert_type(), AlertType::InventoryLow);
        assert!(event.direct_recipient().is_none());
    }

    #[test]
    fn workflow_events_reach_their_owner() {
        let requester = Uuid::new_v4();
        let event = AlertEvent::RequestApproved {
            request_id: Uuid::new_v4(),
            number: "REQ-20240309-0001".into(),
            requested_by: requester,
        };
        assert_eq!(event.direct_recipient(), Some(requester));
        assert_eq!(event.material_id(), None);
        assert_eq!(draft_for(&event, None).title, "Request approved: REQ-20240309-0001");
    }
}
