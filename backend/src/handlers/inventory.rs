//! HTTP handlers for warehouses, inventory items and stock movements

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
use crate::models::{InventoryItem, InventoryLocation, InventoryTransaction, Warehouse};
use crate::services::inventory::{
    AdjustQuantityInput, AssignToProjectInput, CreateItemInput, CreateLocationInput,
    CreateWarehouseInput, InventoryService, ItemFilter, MaterialProjectUsage, TransactionFilter,
    TransferInput, TransferResult, UpdateThresholdsInput, WarehouseOutputInput,
};
use crate::AppState;

fn service(state: &AppState) -> InventoryService {
    InventoryService::new(state.db.clone(), state.alerts.clone())
}

// ============================================================================
// Warehouses and locations
// ============================================================================

pub async fn create_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<(StatusCode, Json<Warehouse>)> {
    check_permission(&current_user.0, "inventory", "create")?;
    let warehouse = service(&state).create_warehouse(input).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ActiveQuery>,
) -> AppResult<Json<Vec<Warehouse>>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let warehouses = service(&state).list_warehouses(query.active_only).await?;
    Ok(Json(warehouses))
}

pub async fn create_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<(StatusCode, Json<InventoryLocation>)> {
    check_permission(&current_user.0, "inventory", "create")?;
    let location = service(&state).create_location(warehouse_id, input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn list_locations(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryLocation>>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let locations = service(&state).list_locations(warehouse_id).await?;
    Ok(Json(locations))
}

// ============================================================================
// Inventory items
// ============================================================================

/// Open a ledger position, optionally with an opening balance
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    check_permission(&current_user.0, "inventory", "create")?;
    let item = service(&state)
        .create_item(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<InventoryItem>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let item = service(&state).get_item(item_id).await?;
    Ok(Json(item))
}

pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ItemFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<InventoryItem>>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let items = service(&state).list_items(&filter, &pagination).await?;
    Ok(Json(items))
}

pub async fn update_thresholds(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateThresholdsInput>,
) -> AppResult<Json<InventoryItem>> {
    check_permission(&current_user.0, "inventory", "update")?;
    let item = service(&state).update_thresholds(item_id, input).await?;
    Ok(Json(item))
}

/// Monitored items below their minimum
pub async fn low_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<InventoryItem>>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let items = service(&state).low_inventory().await?;
    Ok(Json(items))
}

// ============================================================================
// Movements
// ============================================================================

pub async fn adjust_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AdjustQuantityInput>,
) -> AppResult<Json<InventoryItem>> {
    check_permission(&current_user.0, "inventory", "update")?;
    let item = service(&state)
        .adjust_quantity(item_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(item))
}

pub async fn record_warehouse_output(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<WarehouseOutputInput>,
) -> AppResult<Json<InventoryItem>> {
    check_permission(&current_user.0, "inventory", "update")?;
    let item = service(&state)
        .record_warehouse_output(item_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(item))
}

pub async fn assign_to_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AssignToProjectInput>,
) -> AppResult<Json<InventoryItem>> {
    check_permission(&current_user.0, "inventory", "update")?;
    let item = service(&state)
        .assign_to_project(item_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(item))
}

pub async fn transfer_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<TransferInput>,
) -> AppResult<Json<TransferResult>> {
    check_permission(&current_user.0, "inventory", "update")?;
    let result = service(&state)
        .transfer(item_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(result))
}

// ============================================================================
// Transaction log
// ============================================================================

pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TransactionFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<InventoryTransaction>>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let transactions = service(&state)
        .list_transactions(&filter, &pagination)
        .await?;
    Ok(Json(transactions))
}

/// Total quantity of a material issued to a project
pub async fn material_project_usage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((material_id, project_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MaterialProjectUsage>> {
    check_permission(&current_user.0, "inventory", "read")?;
    let usage = service(&state)
        .material_project_usage(material_id, project_id)
        .await?;
    Ok(Json(usage))
}
