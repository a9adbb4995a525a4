//! HTTP handlers for suppliers, purchase orders and goods receiving

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
use crate::models::{PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem, Supplier};
use crate::services::procurement::{
    CreatePurchaseOrderInput, CreateSupplierInput, OrderItemInput, ProcurementService,
    PurchaseOrderFilter, PurchaseOrderSummary, ReceiveItemsInput, RejectInput, SupplierFilter,
    UpdateOrderItemInput, UpdateSupplierInput,
};
use crate::AppState;

fn service(state: &AppState) -> ProcurementService {
    ProcurementService::new(state.db.clone(), state.alerts.clone())
}

// ============================================================================
// Suppliers
// ============================================================================

pub async fn create_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    check_permission(&current_user.0, "procurement", "create")?;
    let supplier = service(&state).create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    check_permission(&current_user.0, "procurement", "read")?;
    let supplier = service(&state).get_supplier(supplier_id).await?;
    Ok(Json(supplier))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SupplierFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Supplier>>> {
    check_permission(&current_user.0, "procurement", "read")?;
    let suppliers = service(&state).list_suppliers(&filter, &pagination).await?;
    Ok(Json(suppliers))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<UpdateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let supplier = service(&state).update_supplier(supplier_id, input).await?;
    Ok(Json(supplier))
}

pub async fn activate_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let supplier = service(&state).set_supplier_active(supplier_id, true).await?;
    Ok(Json(supplier))
}

pub async fn deactivate_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let supplier = service(&state).set_supplier_active(supplier_id, false).await?;
    Ok(Json(supplier))
}

// ============================================================================
// Purchase orders
// ============================================================================

pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrderDetail>)> {
    check_permission(&current_user.0, "procurement", "create")?;
    let order = service(&state)
        .create_order(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    check_permission(&current_user.0, "procurement", "read")?;
    let order = service(&state).get_order(order_id).await?;
    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<PurchaseOrderFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<PurchaseOrder>>> {
    check_permission(&current_user.0, "procurement", "read")?;
    let orders = service(&state).list_orders(&filter, &pagination).await?;
    Ok(Json(orders))
}

/// Open orders expected within the next few days (default 7)
pub async fn orders_due_soon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DaysQuery>,
) -> AppResult<Json<Vec<PurchaseOrderSummary>>> {
    check_permission(&current_user.0, "procurement", "read")?;
    let orders = service(&state).due_soon(query.days_or(7)).await?;
    Ok(Json(orders))
}

pub async fn add_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<OrderItemInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrderItem>)> {
    check_permission(&current_user.0, "procurement", "update")?;
    let item = service(&state).add_item(order_id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateOrderItemInput>,
) -> AppResult<Json<PurchaseOrderItem>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let item = service(&state).update_item(item_id, input).await?;
    Ok(Json(item))
}

// ============================================================================
// Status transitions
// ============================================================================

pub async fn submit_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let order = service(&state).submit(order_id).await?;
    Ok(Json(order))
}

pub async fn approve_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "approve")?;
    let order = service(&state)
        .approve(order_id, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

pub async fn reject_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "approve")?;
    let order = service(&state).reject(order_id, input).await?;
    Ok(Json(order))
}

pub async fn send_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let order = service(&state).send(order_id).await?;
    Ok(Json(order))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let order = service(&state).confirm(order_id).await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let order = service(&state).cancel(order_id).await?;
    Ok(Json(order))
}

pub async fn complete_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&current_user.0, "procurement", "update")?;
    let order = service(&state).complete(order_id).await?;
    Ok(Json(order))
}

/// Receive goods against an order into its delivery warehouse
pub async fn receive_order_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ReceiveItemsInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    check_permission(&current_user.0, "procurement", "receive")?;
    let order = service(&state)
        .receive_items(order_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(order))
}
