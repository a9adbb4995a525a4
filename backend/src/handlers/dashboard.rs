use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::dashboard::{Dashboard, DashboardService};
use crate::AppState;

/// Summary of projects, stock, requests and orders for the caller
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Dashboard>> {
    let service = DashboardService::new(state.db, state.alerts);
    let dashboard = service.for_user(current_user.0.user_id).await?;
    Ok(Json(dashboard))
}
