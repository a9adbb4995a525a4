use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use shared::models::{RequestItemStatus, RequestLine, RequestStatus};

/// Internal material request header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Request {
    pub id: Uuid,
    pub number: String,
    pub project_id: Uuid,
    pub warehouse_id: Uuid,
    pub title: String,
    pub notes: String,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub fulfillment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RequestItem {
    pub id: Uuid,
    pub request_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub quantity_fulfilled: Decimal,
    pub is_fulfilled: bool,
    #[sqlx(try_from = "String")]
    pub status: RequestItemStatus,
    pub notes: String,
    pub fulfillment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestItem {
    pub fn to_line(&self) -> RequestLine {
        RequestLine {
            item_id: self.id,
            material_id: self.material_id,
            quantity: self.quantity,
            quantity_fulfilled: self.quantity_fulfilled,
            is_fulfilled: self.is_fulfilled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: Request,
    pub items: Vec<RequestItem>,
}
