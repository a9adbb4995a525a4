//! HTTP handlers for quality standards and checks

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::handlers::ActiveQuery;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{QualityCheck, QualityCheckDetail, QualityCheckItem, QualityStandard};
use crate::services::quality::{
    CheckItemInput, CreateCheckInput, CreateStandardInput, QualityCheckFilter, QualityService,
    RecordResultInput,
};
use crate::AppState;

pub async fn create_standard(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateStandardInput>,
) -> AppResult<(StatusCode, Json<QualityStandard>)> {
    check_permission(&current_user.0, "quality", "create")?;
    let standard = QualityService::new(state.db).create_standard(input).await?;
    Ok((StatusCode::CREATED, Json(standard)))
}

pub async fn list_standards(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ActiveQuery>,
) -> AppResult<Json<Vec<QualityStandard>>> {
    check_permission(&current_user.0, "quality", "read")?;
    let standards = QualityService::new(state.db)
        .list_standards(query.active_only)
        .await?;
    Ok(Json(standards))
}

pub async fn deactivate_standard(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(standard_id): Path<Uuid>,
) -> AppResult<Json<QualityStandard>> {
    check_permission(&current_user.0, "quality", "update")?;
    let standard = QualityService::new(state.db)
        .set_standard_active(standard_id, false)
        .await?;
    Ok(Json(standard))
}

pub async fn create_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCheckInput>,
) -> AppResult<(StatusCode, Json<QualityCheckDetail>)> {
    check_permission(&current_user.0, "quality", "create")?;
    let check = QualityService::new(state.db)
        .create_check(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(check)))
}

pub async fn get_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
) -> AppResult<Json<QualityCheckDetail>> {
    check_permission(&current_user.0, "quality", "read")?;
    let check = QualityService::new(state.db).get_check(check_id).await?;
    Ok(Json(check))
}

pub async fn list_checks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<QualityCheckFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<QualityCheck>>> {
    check_permission(&current_user.0, "quality", "read")?;
    let checks = QualityService::new(state.db)
        .list_checks(&filter, &pagination)
        .await?;
    Ok(Json(checks))
}

pub async fn add_check_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
    Json(input): Json<CheckItemInput>,
) -> AppResult<(StatusCode, Json<QualityCheckItem>)> {
    check_permission(&current_user.0, "quality", "update")?;
    let item = QualityService::new(state.db).add_item(check_id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn record_check_result(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<RecordResultInput>,
) -> AppResult<Json<QualityCheckItem>> {
    check_permission(&current_user.0, "quality", "update")?;
    let item = QualityService::new(state.db)
        .record_result(item_id, input)
        .await?;
    Ok(Json(item))
}

pub async fn submit_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
) -> AppResult<Json<QualityCheck>> {
    check_permission(&current_user.0, "quality", "update")?;
    let check = QualityService::new(state.db).submit(check_id).await?;
    Ok(Json(check))
}

pub async fn approve_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
) -> AppResult<Json<QualityCheck>> {
    check_permission(&current_user.0, "quality", "approve")?;
    let check = QualityService::new(state.db).approve(check_id).await?;
    Ok(Json(check))
}

pub async fn reject_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
) -> AppResult<Json<QualityCheck>> {
    check_permission(&current_user.0, "quality", "approve")?;
    let check = QualityService::new(state.db).reject(check_id).await?;
    Ok(Json(check))
}

pub async fn complete_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
) -> AppResult<Json<QualityCheck>> {
    check_permission(&current_user.0, "quality", "update")?;
    let check = QualityService::new(state.db).complete(check_id).await?;
    Ok(Json(check))
}

pub async fn cancel_check(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(check_id): Path<Uuid>,
) -> AppResult<Json<QualityCheck>> {
    check_permission(&current_user.0, "quality", "update")?;
    let check = QualityService::new(state.db).cancel(check_id).await?;
    Ok(Json(check))
}
