use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use shared::models::AlertType;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub alert_type: AlertType,
    pub material_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub alert_rule_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
