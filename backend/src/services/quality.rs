//! Quality service: inspection standards and quality checks on received material

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::models::{ensure_all_passed, QualityCheckStatus};
use shared::types::{DocumentKind, PaginatedResponse, Pagination};
use shared::validation::validate_code;

use crate::error::{AppError, AppResult};
use crate::models::{QualityCheck, QualityCheckDetail, QualityCheckItem, QualityStandard};
use crate::repositories;

const STANDARD_COLUMNS: &str =
    "id, code, name, description, criteria, is_active, created_at, updated_at";

const CHECK_COLUMNS: &str = "id, check_number, project_id, material_id, inventory_transaction_id, \
     inspector_id, batch_number, status, notes, check_date, created_at, updated_at";

const CHECK_ITEM_COLUMNS: &str =
    "id, quality_check_id, standard_id, result, notes, is_passed, created_at, updated_at";

#[derive(Clone)]
pub struct QualityService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStandardInput {
    #[validate(custom = "validate_code")]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub criteria: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckItemInput {
    pub standard_id: Uuid,
    #[validate(length(max = 255))]
    pub result: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_passed: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckInput {
    pub project_id: Uuid,
    pub material_id: Uuid,
    pub inventory_transaction_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
    pub notes: Option<String>,
    pub check_date: Option<DateTime<Utc>>,
    #[validate]
    #[serde(default)]
    pub items: Vec<CheckItemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordResultInput {
    #[validate(length(max = 255))]
    pub result: String,
    pub notes: Option<String>,
    pub is_passed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct QualityCheckFilter {
    pub status: Option<QualityCheckStatus>,
    pub project_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
}

impl QualityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Standards
    // ========================================================================

    pub async fn create_standard(&self, input: CreateStandardInput) -> AppResult<QualityStandard> {
        input.validate()?;

        let standard = sqlx::query_as::<_, QualityStandard>(&format!(
            r#"
            INSERT INTO quality_standards (code, name, description, criteria)
            VALUES ($1, $2, $3, $4)
            RETURNING {STANDARD_COLUMNS}
            "#
        ))
        .bind(&input.code)
        .bind(input.name.trim())
        .bind(input.description.clone().unwrap_or_default())
        .bind(input.criteria.clone().unwrap_or_default())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_duplicate(e, format!("Quality standard with code {}", input.code)))?;

        tracing::info!(standard_id = %standard.id, code = %standard.code, "quality standard created");
        Ok(standard)
    }

    pub async fn list_standards(&self, active_only: bool) -> AppResult<Vec<QualityStandard>> {
        let standards = sqlx::query_as::<_, QualityStandard>(&format!(
            "SELECT {STANDARD_COLUMNS} FROM quality_standards \
             WHERE (NOT $1 OR is_active) ORDER BY code"
        ))
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(standards)
    }

    pub async fn set_standard_active(
        &self,
        standard_id: Uuid,
        active: bool,
    ) -> AppResult<QualityStandard> {
        sqlx::query_as::<_, QualityStandard>(&format!(
            "UPDATE quality_standards SET is_active = $2 WHERE id = $1 RETURNING {STANDARD_COLUMNS}"
        ))
        .bind(standard_id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Quality standard"))
    }

    // ========================================================================
    // Checks
    // ========================================================================

    async fn insert_item(
        conn: &mut PgConnection,
        check_id: Uuid,
        input: &CheckItemInput,
    ) -> AppResult<QualityCheckItem> {
        let item = sqlx::query_as::<_, QualityCheckItem>(&format!(
            r#"
            INSERT INTO quality_check_items (quality_check_id, standard_id, result, notes, is_passed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CHECK_ITEM_COLUMNS}
            "#
        ))
        .bind(check_id)
        .bind(input.standard_id)
        .bind(input.result.clone().unwrap_or_default())
        .bind(input.notes.clone().unwrap_or_default())
        .bind(input.is_passed)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::validation(
                "standard_id",
                format!("Unknown quality standard {}", input.standard_id),
            ),
            _ => AppError::DatabaseError(e),
        })?;

        Ok(item)
    }

    async fn check_items(&self, check_id: Uuid) -> AppResult<Vec<QualityCheckItem>> {
        let items = sqlx::query_as::<_, QualityCheckItem>(&format!(
            "SELECT {CHECK_ITEM_COLUMNS} FROM quality_check_items \
             WHERE quality_check_id = $1 ORDER BY created_at, id"
        ))
        .bind(check_id)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Open a draft check; the number is QC-YYYYMMDD-NNNN
    pub async fn create_check(
        &self,
        inspector_id: Uuid,
        input: CreateCheckInput,
    ) -> AppResult<QualityCheckDetail> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let check_date = input.check_date.unwrap_or_else(Utc::now);
        let number = repositories::next_document_number(
            &mut tx,
            DocumentKind::QualityCheck,
            check_date.date_naive(),
        )
        .await?;

        let check = sqlx::query_as::<_, QualityCheck>(&format!(
            r#"
            INSERT INTO quality_checks (check_number, project_id, material_id,
                                        inventory_transaction_id, inspector_id, batch_number,
                                        notes, check_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CHECK_COLUMNS}
            "#
        ))
        .bind(&number)
        .bind(input.project_id)
        .bind(input.material_id)
        .bind(input.inventory_transaction_id)
        .bind(inspector_id)
        .bind(input.batch_number.clone().unwrap_or_default())
        .bind(input.notes.clone().unwrap_or_default())
        .bind(check_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::validation(
                "body",
                "Project, material or inventory transaction does not exist",
            ),
            _ => AppError::DatabaseError(e),
        })?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            items.push(Self::insert_item(&mut tx, check.id, item).await?);
        }

        tx.commit().await?;

        tracing::info!(check_id = %check.id, number = %check.check_number, "quality check created");
        Ok(QualityCheckDetail { check, items })
    }

    pub async fn get_check(&self, check_id: Uuid) -> AppResult<QualityCheckDetail> {
        let check = sqlx::query_as::<_, QualityCheck>(&format!(
            "SELECT {CHECK_COLUMNS} FROM quality_checks WHERE id = $1"
        ))
        .bind(check_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Quality check"))?;
        let items = self.check_items(check_id).await?;

        Ok(QualityCheckDetail { check, items })
    }

    pub async fn list_checks(
        &self,
        filter: &QualityCheckFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<QualityCheck>> {
        const WHERE: &str = "($1::varchar IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR project_id = $2) \
             AND ($3::uuid IS NULL OR material_id = $3)";

        let status = filter.status.map(|s| s.as_str());

        let checks = sqlx::query_as::<_, QualityCheck>(&format!(
            "SELECT {CHECK_COLUMNS} FROM quality_checks WHERE {WHERE} \
             ORDER BY check_date DESC LIMIT $4 OFFSET $5"
        ))
        .bind(status)
        .bind(filter.project_id)
        .bind(filter.material_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM quality_checks WHERE {WHERE}"
        ))
        .bind(status)
        .bind(filter.project_id)
        .bind(filter.material_id)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(checks, pagination, total.max(0) as u64))
    }

    async fn lock_check(conn: &mut PgConnection, check_id: Uuid) -> AppResult<QualityCheck> {
        sqlx::query_as::<_, QualityCheck>(&format!(
            "SELECT {CHECK_COLUMNS} FROM quality_checks WHERE id = $1 FOR UPDATE"
        ))
        .bind(check_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Quality check"))
    }

    pub async fn add_item(&self, check_id: Uuid, input: CheckItemInput) -> AppResult<QualityCheckItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let check = Self::lock_check(&mut tx, check_id).await?;
        if !check.status.accepts_results() {
            return Err(AppError::validation(
                "status",
                format!("Items can only be added to draft checks (current status: {})", check.status),
            ));
        }

        let item = Self::insert_item(&mut tx, check_id, &input).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Record the outcome of one check item while the check is a draft
    pub async fn record_result(
        &self,
        item_id: Uuid,
        input: RecordResultInput,
    ) -> AppResult<QualityCheckItem> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let check_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT quality_check_id FROM quality_check_items WHERE id = $1",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Quality check item"))?;

        let check = Self::lock_check(&mut tx, check_id).await?;
        if !check.status.accepts_results() {
            return Err(AppError::validation(
                "status",
                format!("Results are locked once a check is {}", check.status),
            ));
        }

        let item = sqlx::query_as::<_, QualityCheckItem>(&format!(
            r#"
            UPDATE quality_check_items
            SET result = $2, notes = COALESCE($3, notes), is_passed = $4
            WHERE id = $1
            RETURNING {CHECK_ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(input.result.trim())
        .bind(input.notes)
        .bind(input.is_passed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(item_id = %item.id, passed = item.is_passed, "quality result recorded");
        Ok(item)
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    async fn transition(&self, check_id: Uuid, next: QualityCheckStatus) -> AppResult<QualityCheck> {
        let mut tx = self.db.begin().await?;

        let check = Self::lock_check(&mut tx, check_id).await?;
        let status = check.status.transition_to(next)?;

        if status == QualityCheckStatus::Submitted || status == QualityCheckStatus::Approved {
            let results = sqlx::query_scalar::<_, bool>(
                "SELECT is_passed FROM quality_check_items WHERE quality_check_id = $1",
            )
            .bind(check_id)
            .fetch_all(&mut *tx)
            .await?;

            if status == QualityCheckStatus::Approved {
                ensure_all_passed(&results)?;
            } else if results.is_empty() {
                return Err(AppError::validation(
                    "items",
                    "A quality check needs at least one item before submission",
                ));
            }
        }

        let check = sqlx::query_as::<_, QualityCheck>(&format!(
            "UPDATE quality_checks SET status = $2 WHERE id = $1 RETURNING {CHECK_COLUMNS}"
        ))
        .bind(check_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(check_id = %check.id, status = %check.status, "quality check status changed");
        Ok(check)
    }

    pub async fn submit(&self, check_id: Uuid) -> AppResult<QualityCheck> {
        self.transition(check_id, QualityCheckStatus::Submitted).await
    }

    /// Approve a submitted check; every item must have passed
    pub async fn approve(&self, check_id: Uuid) -> AppResult<QualityCheck> {
        self.transition(check_id, QualityCheckStatus::Approved).await
    }

    pub async fn reject(&self, check_id: Uuid) -> AppResult<QualityCheck> {
        self.transition(check_id, QualityCheckStatus::Rejected).await
    }

    pub async fn complete(&self, check_id: Uuid) -> AppResult<QualityCheck> {
        self.transition(check_id, QualityCheckStatus::Completed).await
    }

    pub async fn cancel(&self, check_id: Uuid) -> AppResult<QualityCheck> {
        self.transition(check_id, QualityCheckStatus::Cancelled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes_are_validated() {
        let input = CreateStandardInput {
            code: "bad code!".into(),
            name: "Compressive strength".into(),
            description: None,
            criteria: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn check_items_default_to_not_passed() {
        let item: CheckItemInput =
            serde_json::from_str(&format!(r#"{{"standard_id":"{}"}}"#, Uuid::nil())).unwrap();
        assert!(!item.is_passed);
        assert!(item.result.is_none());
    }
}
