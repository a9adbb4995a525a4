//! HTTP handlers for notifications and alert rules

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{AlertRule, Notification};
use crate::services::notification::{CreateAlertRuleInput, NotificationQuery, NotificationService};
use crate::AppState;

// ============================================================================
// Notifications
// ============================================================================

/// Notifications addressed to the caller
pub async fn list_notifications(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<NotificationQuery>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Notification>>> {
    let service = NotificationService::new(state.db);
    let notifications = service
        .list_notifications(current_user.0.user_id, &query, &pagination)
        .await?;
    Ok(Json(notifications))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

pub async fn unread_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UnreadCountResponse>> {
    let service = NotificationService::new(state.db);
    let count = service.unread_count(current_user.0.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let service = NotificationService::new(state.db);
    let notification = service
        .mark_read(current_user.0.user_id, notification_id)
        .await?;
    Ok(Json(notification))
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let service = NotificationService::new(state.db);
    let updated = service.mark_all_read(current_user.0.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

// ============================================================================
// Alert rules
// ============================================================================

pub async fn create_alert_rule(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAlertRuleInput>,
) -> AppResult<(StatusCode, Json<AlertRule>)> {
    let service = NotificationService::new(state.db);
    let rule = service.create_rule(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn list_alert_rules(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<AlertRule>>> {
    let service = NotificationService::new(state.db);
    let rules = service.list_rules(current_user.0.user_id).await?;
    Ok(Json(rules))
}

/// Flip a rule between active and inactive
pub async fn toggle_alert_rule(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(rule_id): Path<Uuid>,
) -> AppResult<Json<AlertRule>> {
    let service = NotificationService::new(state.db);
    let rule = service.toggle_rule(current_user.0.user_id, rule_id).await?;
    Ok(Json(rule))
}
