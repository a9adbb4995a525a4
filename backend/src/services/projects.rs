//! Projects that consume material

use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use shared::models::ProjectStatus;
use shared::types::{PaginatedResponse, Pagination};
use shared::validation::validate_code;

use crate::error::{AppError, AppResult};
use crate::models::Project;

const PROJECT_COLUMNS: &str = "id, name, number, start_date, end_date, status, manager_id, \
     description, created_at, updated_at";

#[derive(Clone)]
pub struct ProjectService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_project_dates", skip_on_field_errors = false))]
pub struct CreateProjectInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "validate_code")]
    pub number: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<Uuid>,
    pub description: Option<String>,
}

fn validate_project_dates(input: &CreateProjectInput) -> Result<(), ValidationError> {
    match input.end_date {
        Some(end) if end < input.start_date => {
            let mut err = ValidationError::new("end_date");
            err.message = Some("end date must not be before start date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<Uuid>,
}

impl ProjectService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a project; the caller manages it unless another manager is given
    pub async fn create_project(
        &self,
        created_by: Uuid,
        input: CreateProjectInput,
    ) -> AppResult<Project> {
        input.validate()?;

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (name, number, start_date, end_date, status, manager_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(&input.number)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.status.unwrap_or(ProjectStatus::Planning).as_str())
        .bind(input.manager_id.unwrap_or(created_by))
        .bind(input.description.clone().unwrap_or_default())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_duplicate(e, format!("Project with number {}", input.number)))?;

        tracing::info!(project_id = %project.id, number = %project.number, "project created");
        Ok(project)
    }

    pub async fn get_project(&self, project_id: Uuid) -> AppResult<Project> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(project_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))
    }

    pub async fn list_projects(
        &self,
        filter: &ProjectFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Project>> {
        const WHERE: &str = "($1::varchar IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR manager_id = $2)";

        let status = filter.status.map(|s| s.as_str());

        let projects = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(filter.manager_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM projects WHERE {WHERE}"
        ))
        .bind(status)
        .bind(filter.manager_id)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(projects, pagination, total.max(0) as u64))
    }

    pub async fn update_project(
        &self,
        project_id: Uuid,
        input: UpdateProjectInput,
    ) -> AppResult<Project> {
        input.validate()?;

        let current = self.get_project(project_id).await?;
        let start = input.start_date.unwrap_or(current.start_date);
        if let Some(end) = input.end_date.or(current.end_date) {
            if end < start {
                return Err(AppError::validation(
                    "end_date",
                    "End date must not be before start date",
                ));
            }
        }

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                start_date = COALESCE($3, start_date),
                end_date = COALESCE($4, end_date),
                status = COALESCE($5, status),
                manager_id = COALESCE($6, manager_id),
                description = COALESCE($7, description)
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.manager_id)
        .bind(input.description)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))?;

        tracing::info!(project_id = %project.id, status = %project.status, "project updated");
        Ok(project)
    }

    /// Active projects whose end date falls within the next `days` days
    pub async fn ending_soon(&self, days: u32, manager_id: Option<Uuid>) -> AppResult<Vec<Project>> {
        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(i64::from(days));

        let projects = sqlx::query_as::<_, Project>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS} FROM projects
            WHERE status = $1
              AND end_date BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR manager_id = $4)
            ORDER BY end_date
            "#
        ))
        .bind(ProjectStatus::Active.as_str())
        .bind(today)
        .bind(horizon)
        .bind(manager_id)
        .fetch_all(&self.db)
        .await?;

        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(start: NaiveDate, end: Option<NaiveDate>) -> CreateProjectInput {
        CreateProjectInput {
            name: "North tower".into(),
            number: "PRJ-001".into(),
            start_date: start,
            end_date: end,
            status: None,
            manager_id: None,
            description: None,
        }
    }

    #[test]
    fn end_date_cannot_precede_start() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(input(start, Some(before)).validate().is_err());
        assert!(input(start, Some(start)).validate().is_ok());
        assert!(input(start, None).validate().is_ok());
    }
}
