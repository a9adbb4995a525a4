use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use shared::models::QualityCheckStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QualityStandard {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub criteria: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QualityCheck {
    pub id: Uuid,
    pub check_number: String,
    pub project_id: Uuid,
    pub material_id: Uuid,
    pub inventory_transaction_id: Option<Uuid>,
    pub inspector_id: Uuid,
    pub batch_number: String,
    #[sqlx(try_from = "String")]
    pub status: QualityCheckStatus,
    pub notes: String,
    pub check_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QualityCheckItem {
    pub id: Uuid,
    pub quality_check_id: Uuid,
    pub standard_id: Uuid,
    pub result: String,
    pub notes: String,
    pub is_passed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityCheckDetail {
    #[serde(flatten)]
    pub check: QualityCheck,
    pub items: Vec<QualityCheckItem>,
}
