//! HTTP handlers for projects

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::handlers::DaysQuery;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::Project;
use crate::services::projects::{
    CreateProjectInput, ProjectFilter, ProjectService, UpdateProjectInput,
};
use crate::AppState;

pub async fn create_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProjectInput>,
) -> AppResult<(StatusCode, Json<Project>)> {
    check_permission(&current_user.0, "projects", "create")?;
    let project = ProjectService::new(state.db)
        .create_project(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    check_permission(&current_user.0, "projects", "read")?;
    let project = ProjectService::new(state.db).get_project(project_id).await?;
    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProjectFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Project>>> {
    check_permission(&current_user.0, "projects", "read")?;
    let projects = ProjectService::new(state.db)
        .list_projects(&filter, &pagination)
        .await?;
    Ok(Json(projects))
}

pub async fn update_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<UpdateProjectInput>,
) -> AppResult<Json<Project>> {
    check_permission(&current_user.0, "projects", "update")?;
    let project = ProjectService::new(state.db)
        .update_project(project_id, input)
        .await?;
    Ok(Json(project))
}

/// Active projects ending within the next few days (default 30)
pub async fn projects_ending_soon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DaysQuery>,
) -> AppResult<Json<Vec<Project>>> {
    check_permission(&current_user.0, "projects", "read")?;
    let projects = ProjectService::new(state.db)
        .ending_soon(query.days_or(30), None)
        .await?;
    Ok(Json(projects))
}
