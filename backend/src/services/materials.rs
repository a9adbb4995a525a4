//! Material catalogue: categories and materials

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use shared::types::{PaginatedResponse, Pagination};
use shared::validation::validate_code;

use crate::error::{AppError, AppResult};
use crate::models::{Material, MaterialCategory};

const CATEGORY_COLUMNS: &str = "id, name, parent_id, created_at, updated_at";

const MATERIAL_COLUMNS: &str = "id, code, name, description, category_id, unit_of_measure, \
     is_active, created_by, created_at, updated_at";

#[derive(Clone)]
pub struct MaterialService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialInput {
    #[validate(custom = "validate_code")]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub unit_of_measure: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMaterialInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50))]
    pub unit_of_measure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterialFilter {
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

fn unknown_category(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::validation("category_id", "Category does not exist")
        }
        _ => AppError::DatabaseError(err),
    }
}

impl MaterialService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<MaterialCategory> {
        input.validate()?;

        let category = sqlx::query_as::<_, MaterialCategory>(&format!(
            "INSERT INTO material_categories (name, parent_id) VALUES ($1, $2) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(input.parent_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::validation("parent_id", "Parent category does not exist")
            }
            _ => AppError::DatabaseError(e),
        })?;

        tracing::info!(category_id = %category.id, "material category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<MaterialCategory>> {
        let categories = sqlx::query_as::<_, MaterialCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM material_categories ORDER BY name"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }

    pub async fn create_material(
        &self,
        created_by: Uuid,
        input: CreateMaterialInput,
    ) -> AppResult<Material> {
        input.validate()?;

        let material = sqlx::query_as::<_, Material>(&format!(
            r#"
            INSERT INTO materials (code, name, description, category_id, unit_of_measure, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(&input.code)
        .bind(input.name.trim())
        .bind(input.description.clone().unwrap_or_default())
        .bind(input.category_id)
        .bind(input.unit_of_measure.trim())
        .bind(created_by)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry(format!("Material with code {}", input.code))
            }
            _ => unknown_category(e),
        })?;

        tracing::info!(material_id = %material.id, code = %material.code, "material created");
        Ok(material)
    }

    pub async fn get_material(&self, material_id: Uuid) -> AppResult<Material> {
        sqlx::query_as::<_, Material>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1"
        ))
        .bind(material_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Material"))
    }

    pub async fn list_materials(
        &self,
        filter: &MaterialFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Material>> {
        const WHERE: &str = "($1::uuid IS NULL OR category_id = $1) \
             AND ($2::bool IS NULL OR is_active = $2) \
             AND ($3::text IS NULL OR code ILIKE '%' || $3 || '%' OR name ILIKE '%' || $3 || '%')";

        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let materials = sqlx::query_as::<_, Material>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE {WHERE} \
             ORDER BY code LIMIT $4 OFFSET $5"
        ))
        .bind(filter.category_id)
        .bind(filter.is_active)
        .bind(search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM materials WHERE {WHERE}"
        ))
        .bind(filter.category_id)
        .bind(filter.is_active)
        .bind(search)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(materials, pagination, total.max(0) as u64))
    }

    pub async fn update_material(
        &self,
        material_id: Uuid,
        input: UpdateMaterialInput,
    ) -> AppResult<Material> {
        input.validate()?;

        sqlx::query_as::<_, Material>(&format!(
            r#"
            UPDATE materials
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                category_id = COALESCE($4, category_id),
                unit_of_measure = COALESCE($5, unit_of_measure)
            WHERE id = $1
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(material_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description)
        .bind(input.category_id)
        .bind(input.unit_of_measure.as_deref().map(str::trim))
        .fetch_optional(&self.db)
        .await
        .map_err(unknown_category)?
        .ok_or_else(|| AppError::not_found("Material"))
    }

    pub async fn set_active(&self, material_id: Uuid, active: bool) -> AppResult<Material> {
        let material = sqlx::query_as::<_, Material>(&format!(
            "UPDATE materials SET is_active = $2 WHERE id = $1 RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(material_id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Material"))?;

        tracing::info!(material_id = %material.id, active, "material activation changed");
        Ok(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_needs_unit_and_code() {
        let input = CreateMaterialInput {
            code: "CEM-42".into(),
            name: "Portland cement".into(),
            description: None,
            category_id: Uuid::new_v4(),
            unit_of_measure: String::new(),
        };
        assert!(input.validate().is_err());

        let input = CreateMaterialInput {
            unit_of_measure: "bag".into(),
            ..input
        };
        assert!(input.validate().is_ok());
    }
}
