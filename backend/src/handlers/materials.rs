//! HTTP handlers for the material catalogue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Material, MaterialCategory};
use crate::services::materials::{
    CreateCategoryInput, CreateMaterialInput, MaterialFilter, MaterialService, UpdateMaterialInput,
};
use crate::AppState;

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<(StatusCode, Json<MaterialCategory>)> {
    check_permission(&current_user.0, "materials", "create")?;
    let category = MaterialService::new(state.db).create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<MaterialCategory>>> {
    check_permission(&current_user.0, "materials", "read")?;
    let categories = MaterialService::new(state.db).list_categories().await?;
    Ok(Json(categories))
}

pub async fn create_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMaterialInput>,
) -> AppResult<(StatusCode, Json<Material>)> {
    check_permission(&current_user.0, "materials", "create")?;
    let material = MaterialService::new(state.db)
        .create_material(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn get_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Material>> {
    check_permission(&current_user.0, "materials", "read")?;
    let material = MaterialService::new(state.db).get_material(material_id).await?;
    Ok(Json(material))
}

pub async fn list_materials(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MaterialFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Material>>> {
    check_permission(&current_user.0, "materials", "read")?;
    let materials = MaterialService::new(state.db)
        .list_materials(&filter, &pagination)
        .await?;
    Ok(Json(materials))
}

pub async fn update_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
    Json(input): Json<UpdateMaterialInput>,
) -> AppResult<Json<Material>> {
    check_permission(&current_user.0, "materials", "update")?;
    let material = MaterialService::new(state.db)
        .update_material(material_id, input)
        .await?;
    Ok(Json(material))
}

pub async fn activate_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Material>> {
    check_permission(&current_user.0, "materials", "update")?;
    let material = MaterialService::new(state.db).set_active(material_id, true).await?;
    Ok(Json(material))
}

pub async fn deactivate_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Material>> {
    check_permission(&current_user.0, "materials", "update")?;
    let material = MaterialService::new(state.db).set_active(material_id, false).await?;
    Ok(Json(material))
}
