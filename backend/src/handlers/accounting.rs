//! HTTP handlers for expenses, project income and movement pricing

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{ApprovalStatus, ProjectBalance};
use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::handlers::ActiveQuery;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{AccountingEntry, ExpenseCategory, ExpenseSummary, GeneralExpense, ProjectIncome};
use crate::services::accounting::{
    AccountingService, CreateExpenseCategoryInput, CreateExpenseInput, CreateIncomeInput,
    DecisionInput, ExpenseFilter, SetPriceInput,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    pub status: Option<ApprovalStatus>,
}

pub async fn create_expense_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExpenseCategoryInput>,
) -> AppResult<(StatusCode, Json<ExpenseCategory>)> {
    check_permission(&current_user.0, "accounting", "create")?;
    let category = AccountingService::new(state.db).create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_expense_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ActiveQuery>,
) -> AppResult<Json<Vec<ExpenseCategory>>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let categories = AccountingService::new(state.db)
        .list_categories(query.active_only)
        .await?;
    Ok(Json(categories))
}

pub async fn create_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExpenseInput>,
) -> AppResult<(StatusCode, Json<GeneralExpense>)> {
    check_permission(&current_user.0, "accounting", "create")?;
    let expense = AccountingService::new(state.db)
        .create_expense(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn get_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<Json<GeneralExpense>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let expense = AccountingService::new(state.db).get_expense(expense_id).await?;
    Ok(Json(expense))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ExpenseFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<GeneralExpense>>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let expenses = AccountingService::new(state.db)
        .list_expenses(&filter, &pagination)
        .await?;
    Ok(Json(expenses))
}

pub async fn approve_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<Json<GeneralExpense>> {
    check_permission(&current_user.0, "accounting", "approve")?;
    let expense = AccountingService::new(state.db)
        .approve_expense(expense_id, current_user.0.user_id)
        .await?;
    Ok(Json(expense))
}

pub async fn reject_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<GeneralExpense>> {
    check_permission(&current_user.0, "accounting", "approve")?;
    let expense = AccountingService::new(state.db)
        .reject_expense(expense_id, input)
        .await?;
    Ok(Json(expense))
}

pub async fn expense_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ExpenseSummary>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let summary = AccountingService::new(state.db).expense_summary().await?;
    Ok(Json(summary))
}

pub async fn create_income(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateIncomeInput>,
) -> AppResult<(StatusCode, Json<ProjectIncome>)> {
    check_permission(&current_user.0, "accounting", "create")?;
    let income = AccountingService::new(state.db)
        .create_income(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(income)))
}

pub async fn list_project_incomes(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectIncome>>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let incomes = AccountingService::new(state.db).list_incomes(project_id).await?;
    Ok(Json(incomes))
}

pub async fn approve_income(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(income_id): Path<Uuid>,
) -> AppResult<Json<ProjectIncome>> {
    check_permission(&current_user.0, "accounting", "approve")?;
    let income = AccountingService::new(state.db)
        .approve_income(income_id, current_user.0.user_id)
        .await?;
    Ok(Json(income))
}

pub async fn reject_income(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(income_id): Path<Uuid>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<ProjectIncome>> {
    check_permission(&current_user.0, "accounting", "approve")?;
    let income = AccountingService::new(state.db)
        .reject_income(income_id, input)
        .await?;
    Ok(Json(income))
}

pub async fn project_balance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ProjectBalance>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let balance = AccountingService::new(state.db)
        .project_balance(project_id)
        .await?;
    Ok(Json(balance))
}

pub async fn set_transaction_price(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transaction_id): Path<Uuid>,
    Json(input): Json<SetPriceInput>,
) -> AppResult<Json<AccountingEntry>> {
    check_permission(&current_user.0, "accounting", "create")?;
    let entry = AccountingService::new(state.db)
        .set_price(current_user.0.user_id, transaction_id, input)
        .await?;
    Ok(Json(entry))
}

pub async fn list_accounting_entries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<EntryQuery>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<AccountingEntry>>> {
    check_permission(&current_user.0, "accounting", "read")?;
    let entries = AccountingService::new(state.db)
        .list_entries(query.status, &pagination)
        .await?;
    Ok(Json(entries))
}

pub async fn approve_accounting_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<AccountingEntry>> {
    check_permission(&current_user.0, "accounting", "approve")?;
    let entry = AccountingService::new(state.db)
        .approve_entry(entry_id, current_user.0.user_id)
        .await?;
    Ok(Json(entry))
}

pub async fn reject_accounting_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<AccountingEntry>> {
    check_permission(&current_user.0, "accounting", "approve")?;
    let entry = AccountingService::new(state.db)
        .reject_entry(entry_id, input)
        .await?;
    Ok(Json(entry))
}
