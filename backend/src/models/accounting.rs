use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use shared::models::{AllocationType, ApprovalStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpenseCategory {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GeneralExpense {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub allocation_type: AllocationType,
    pub project_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub notes: String,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectIncome {
    pub id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub income_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub notes: String,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Price set on one logged stock movement
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccountingEntry {
    pub id: Uuid,
    pub inventory_transaction_id: Uuid,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub notes: String,
    pub set_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Total over one grouping key (project, category or month)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpenseTotal {
    pub key: Option<String>,
    pub label: Option<String>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenseSummary {
    pub by_project: Vec<ExpenseTotal>,
    pub by_category: Vec<ExpenseTotal>,
    pub by_month: Vec<ExpenseTotal>,
}
