//! HTTP handlers for material requests

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::models::RequestStatus;
use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Request, RequestDetail, RequestItem};
use crate::services::request::{
    CreateRequestInput, PartialFulfillInput, RejectRequestInput, RequestFilter, RequestItemInput,
    RequestService,
};
use crate::AppState;

fn service(state: &AppState) -> RequestService {
    RequestService::new(state.db.clone(), state.alerts.clone())
}

pub async fn create_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRequestInput>,
) -> AppResult<(StatusCode, Json<RequestDetail>)> {
    check_permission(&current_user.0, "requests", "create")?;
    let request = service(&state)
        .create_request(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<RequestDetail>> {
    check_permission(&current_user.0, "requests", "read")?;
    let request = service(&state).get_request(request_id).await?;
    Ok(Json(request))
}

pub async fn list_requests(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RequestFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Request>>> {
    check_permission(&current_user.0, "requests", "read")?;
    let requests = service(&state).list_requests(&filter, &pagination).await?;
    Ok(Json(requests))
}

/// Requests raised by the caller
pub async fn my_requests(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Request>>> {
    let filter = RequestFilter {
        requested_by: Some(current_user.0.user_id),
        ..Default::default()
    };
    let requests = service(&state).list_requests(&filter, &pagination).await?;
    Ok(Json(requests))
}

/// Requests waiting for an approver
pub async fn pending_approval(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Request>>> {
    check_permission(&current_user.0, "requests", "approve")?;
    let filter = RequestFilter {
        status: Some(RequestStatus::PendingApproval),
        ..Default::default()
    };
    let requests = service(&state).list_requests(&filter, &pagination).await?;
    Ok(Json(requests))
}

pub async fn add_request_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(input): Json<RequestItemInput>,
) -> AppResult<(StatusCode, Json<RequestItem>)> {
    check_permission(&current_user.0, "requests", "update")?;
    let item = service(&state).add_item(request_id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn submit_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<Request>> {
    check_permission(&current_user.0, "requests", "update")?;
    let request = service(&state).submit(request_id).await?;
    Ok(Json(request))
}

pub async fn approve_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<Request>> {
    check_permission(&current_user.0, "requests", "approve")?;
    let request = service(&state)
        .approve(request_id, current_user.0.user_id)
        .await?;
    Ok(Json(request))
}

pub async fn reject_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(input): Json<RejectRequestInput>,
) -> AppResult<Json<Request>> {
    check_permission(&current_user.0, "requests", "approve")?;
    let request = service(&state).reject(request_id, input).await?;
    Ok(Json(request))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<Request>> {
    check_permission(&current_user.0, "requests", "update")?;
    let request = service(&state).cancel(request_id).await?;
    Ok(Json(request))
}

/// Issue every outstanding line from stock
pub async fn fulfill_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<RequestDetail>> {
    check_permission(&current_user.0, "requests", "fulfill")?;
    let request = service(&state)
        .fulfill(request_id, current_user.0.user_id)
        .await?;
    Ok(Json(request))
}

pub async fn partially_fulfill_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<PartialFulfillInput>,
) -> AppResult<Json<RequestItem>> {
    check_permission(&current_user.0, "requests", "fulfill")?;
    let item = service(&state)
        .partially_fulfill(item_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(item))
}
