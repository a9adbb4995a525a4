//! Accounting service: general expenses, project income and the prices
//! set on logged stock movements

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::models::{allocate_by_weight, line_total, AllocationType, ApprovalStatus, ProjectBalance};
use shared::types::{PaginatedResponse, Pagination};
use shared::validation::{validate_amount, validate_non_negative};

use crate::error::{AppError, AppResult};
use crate::models::{
    AccountingEntry, ExpenseCategory, ExpenseSummary, ExpenseTotal, GeneralExpense, ProjectIncome,
};

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

const EXPENSE_COLUMNS: &str = "id, description, amount, expense_date, allocation_type, project_id, \
     category_id, status, notes, created_by, approved_by, approved_at, created_at, updated_at";

const INCOME_COLUMNS: &str = "id, project_id, description, amount, income_date, status, notes, \
     created_by, approved_by, approved_at, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, inventory_transaction_id, unit_price, total_price, currency, \
     status, notes, set_by, approved_by, approved_at, created_at, updated_at";

/// A table whose rows go through the pending → approved/rejected decision
struct Decided {
    table: &'static str,
    columns: &'static str,
    entity: &'static str,
    label: &'static str,
}

const EXPENSES: Decided = Decided {
    table: "general_expenses",
    columns: EXPENSE_COLUMNS,
    entity: "expense",
    label: "Expense",
};

const INCOMES: Decided = Decided {
    table: "project_incomes",
    columns: INCOME_COLUMNS,
    entity: "project income",
    label: "Project income",
};

const ENTRIES: Decided = Decided {
    table: "accounting_entries",
    columns: ENTRY_COLUMNS,
    entity: "accounting entry",
    label: "Accounting entry",
};

#[derive(Clone)]
pub struct AccountingService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseInput {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(custom = "validate_amount")]
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub allocation_type: AllocationType,
    pub project_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseFilter {
    pub status: Option<ApprovalStatus>,
    pub project_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncomeInput {
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(custom = "validate_amount")]
    pub amount: Decimal,
    pub income_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPriceInput {
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecisionInput {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

impl AccountingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Expense categories
    // ========================================================================

    pub async fn create_category(
        &self,
        input: CreateExpenseCategoryInput,
    ) -> AppResult<ExpenseCategory> {
        input.validate()?;

        let category = sqlx::query_as::<_, ExpenseCategory>(&format!(
            "INSERT INTO expense_categories (name, description) VALUES ($1, $2) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(input.description.unwrap_or_default())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_constraint(e, format!("Expense category {}", input.name.trim())))?;

        Ok(category)
    }

    pub async fn list_categories(&self, active_only: bool) -> AppResult<Vec<ExpenseCategory>> {
        let categories = sqlx::query_as::<_, ExpenseCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM expense_categories \
             WHERE (NOT $1 OR is_active) ORDER BY name"
        ))
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }

    // ========================================================================
    // Expenses
    // ========================================================================

    pub async fn create_expense(
        &self,
        created_by: Uuid,
        input: CreateExpenseInput,
    ) -> AppResult<GeneralExpense> {
        input.validate()?;
        input.allocation_type.check_project(input.project_id)?;

        let expense = sqlx::query_as::<_, GeneralExpense>(&format!(
            r#"
            INSERT INTO general_expenses (description, amount, expense_date, allocation_type,
                                          project_id, category_id, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(input.description.trim())
        .bind(input.amount)
        .bind(input.expense_date)
        .bind(input.allocation_type.as_str())
        .bind(input.project_id)
        .bind(input.category_id)
        .bind(input.notes.unwrap_or_default())
        .bind(created_by)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_constraint(e, "Expense"))?;

        tracing::info!(
            expense_id = %expense.id,
            amount = %expense.amount,
            allocation = %expense.allocation_type,
            "expense recorded"
        );
        Ok(expense)
    }

    pub async fn get_expense(&self, expense_id: Uuid) -> AppResult<GeneralExpense> {
        sqlx::query_as::<_, GeneralExpense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM general_expenses WHERE id = $1"
        ))
        .bind(expense_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Expense"))
    }

    pub async fn list_expenses(
        &self,
        filter: &ExpenseFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<GeneralExpense>> {
        const WHERE: &str = "($1::varchar IS NULL OR status = $1) \
             AND ($2::uuid IS NULL OR project_id = $2) \
             AND ($3::uuid IS NULL OR category_id = $3) \
             AND ($4::uuid IS NULL OR created_by = $4) \
             AND ($5::date IS NULL OR expense_date >= $5) \
             AND ($6::date IS NULL OR expense_date <= $6)";

        let status = filter.status.map(|s| s.as_str());

        let expenses = sqlx::query_as::<_, GeneralExpense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM general_expenses WHERE {WHERE} \
             ORDER BY expense_date DESC, created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(status)
        .bind(filter.project_id)
        .bind(filter.category_id)
        .bind(filter.created_by)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM general_expenses WHERE {WHERE}"
        ))
        .bind(status)
        .bind(filter.project_id)
        .bind(filter.category_id)
        .bind(filter.created_by)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(expenses, pagination, total.max(0) as u64))
    }

    pub async fn approve_expense(
        &self,
        expense_id: Uuid,
        approved_by: Uuid,
    ) -> AppResult<GeneralExpense> {
        self.decide(&EXPENSES, expense_id, ApprovalStatus::Approved, Some(approved_by), None)
            .await
    }

    pub async fn reject_expense(
        &self,
        expense_id: Uuid,
        input: DecisionInput,
    ) -> AppResult<GeneralExpense> {
        input.validate()?;
        self.decide(&EXPENSES, expense_id, ApprovalStatus::Rejected, None, rejection_note(input))
            .await
    }

    /// Approved expense totals by project, category and month
    pub async fn expense_summary(&self) -> AppResult<ExpenseSummary> {
        let by_project = sqlx::query_as::<_, ExpenseTotal>(
            r#"
            SELECT e.project_id::text AS key, p.name AS label, SUM(e.amount) AS total_amount
            FROM general_expenses e
            LEFT JOIN projects p ON p.id = e.project_id
            WHERE e.status = 'approved'
            GROUP BY e.project_id, p.name
            ORDER BY total_amount DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let by_category = sqlx::query_as::<_, ExpenseTotal>(
            r#"
            SELECT e.category_id::text AS key, c.name AS label, SUM(e.amount) AS total_amount
            FROM general_expenses e
            LEFT JOIN expense_categories c ON c.id = e.category_id
            WHERE e.status = 'approved'
            GROUP BY e.category_id, c.name
            ORDER BY total_amount DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let by_month = sqlx::query_as::<_, ExpenseTotal>(
            r#"
            SELECT to_char(expense_date, 'YYYY-MM') AS key, NULL::text AS label,
                   SUM(amount) AS total_amount
            FROM general_expenses
            WHERE status = 'approved'
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ExpenseSummary {
            by_project,
            by_category,
            by_month,
        })
    }

    // ========================================================================
    // Project income
    // ========================================================================

    pub async fn create_income(
        &self,
        created_by: Uuid,
        input: CreateIncomeInput,
    ) -> AppResult<ProjectIncome> {
        input.validate()?;

        let income = sqlx::query_as::<_, ProjectIncome>(&format!(
            r#"
            INSERT INTO project_incomes (project_id, description, amount, income_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {INCOME_COLUMNS}
            "#
        ))
        .bind(input.project_id)
        .bind(input.description.trim())
        .bind(input.amount)
        .bind(input.income_date)
        .bind(input.notes.unwrap_or_default())
        .bind(created_by)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_constraint(e, "Project income"))?;

        tracing::info!(income_id = %income.id, project_id = %income.project_id, "project income recorded");
        Ok(income)
    }

    pub async fn list_incomes(&self, project_id: Uuid) -> AppResult<Vec<ProjectIncome>> {
        let incomes = sqlx::query_as::<_, ProjectIncome>(&format!(
            "SELECT {INCOME_COLUMNS} FROM project_incomes WHERE project_id = $1 \
             ORDER BY income_date DESC, created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(&self.db)
        .await?;

        Ok(incomes)
    }

    pub async fn approve_income(&self, income_id: Uuid, approved_by: Uuid) -> AppResult<ProjectIncome> {
        self.decide(&INCOMES, income_id, ApprovalStatus::Approved, Some(approved_by), None)
            .await
    }

    pub async fn reject_income(&self, income_id: Uuid, input: DecisionInput) -> AppResult<ProjectIncome> {
        input.validate()?;
        self.decide(&INCOMES, income_id, ApprovalStatus::Rejected, None, rejection_note(input))
            .await
    }

    // ========================================================================
    // Accounting entries
    // ========================================================================

    /// Price a logged movement. The total is the unit price times the
    /// movement's quantity; a pending entry is repriced in place, a
    /// decided one is left alone.
    pub async fn set_price(
        &self,
        set_by: Uuid,
        transaction_id: Uuid,
        input: SetPriceInput,
    ) -> AppResult<AccountingEntry> {
        input.validate()?;

        let quantity = sqlx::query_scalar::<_, Decimal>(
            "SELECT quantity FROM inventory_transactions WHERE id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory transaction"))?;

        let total_price = line_total(quantity, input.unit_price)?;
        let currency = input
            .currency
            .as_deref()
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| "IRR".to_string());

        let entry = sqlx::query_as::<_, AccountingEntry>(&format!(
            r#"
            INSERT INTO accounting_entries (inventory_transaction_id, unit_price, total_price,
                                            currency, notes, set_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (inventory_transaction_id) DO UPDATE
            SET unit_price = EXCLUDED.unit_price,
                total_price = EXCLUDED.total_price,
                currency = EXCLUDED.currency,
                notes = EXCLUDED.notes,
                set_by = EXCLUDED.set_by
            WHERE accounting_entries.status = 'pending'
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(transaction_id)
        .bind(input.unit_price)
        .bind(total_price)
        .bind(&currency)
        .bind(input.notes.unwrap_or_default())
        .bind(set_by)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            AppError::validation(
                "inventory_transaction_id",
                "The price of this movement has already been decided",
            )
        })?;

        tracing::info!(
            entry_id = %entry.id,
            transaction_id = %transaction_id,
            total_price = %entry.total_price,
            "movement priced"
        );
        Ok(entry)
    }

    pub async fn list_entries(
        &self,
        status: Option<ApprovalStatus>,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<AccountingEntry>> {
        let status = status.map(|s| s.as_str());

        let entries = sqlx::query_as::<_, AccountingEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM accounting_entries \
             WHERE ($1::varchar IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM accounting_entries WHERE ($1::varchar IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(entries, pagination, total.max(0) as u64))
    }

    pub async fn approve_entry(&self, entry_id: Uuid, approved_by: Uuid) -> AppResult<AccountingEntry> {
        self.decide(&ENTRIES, entry_id, ApprovalStatus::Approved, Some(approved_by), None)
            .await
    }

    pub async fn reject_entry(&self, entry_id: Uuid, input: DecisionInput) -> AppResult<AccountingEntry> {
        input.validate()?;
        self.decide(&ENTRIES, entry_id, ApprovalStatus::Rejected, None, rejection_note(input))
            .await
    }

    // ========================================================================
    // Project balance
    // ========================================================================

    /// Approved income against approved costs for one project.
    ///
    /// Weight-based expenses are spread over projects by the quantity of
    /// material issued to each; material cost is the approved price of
    /// the stock issued to the project.
    pub async fn project_balance(&self, project_id: Uuid) -> AppResult<ProjectBalance> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(project_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::not_found("Project"));
        }

        let income = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM project_incomes \
             WHERE project_id = $1 AND status = 'approved'",
        )
        .bind(project_id)
        .fetch_one(&self.db)
        .await?;

        let direct_expenses = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM general_expenses \
             WHERE project_id = $1 AND status = 'approved'",
        )
        .bind(project_id)
        .fetch_one(&self.db)
        .await?;

        let material_cost = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(ae.total_price), 0)
            FROM accounting_entries ae
            JOIN inventory_transactions t ON t.id = ae.inventory_transaction_id
            WHERE t.project_id = $1 AND t.transaction_type = 'issue'
              AND ae.status = 'approved'
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.db)
        .await?;

        let weights: Vec<(Uuid, Decimal)> = sqlx::query_as(
            r#"
            SELECT project_id, SUM(quantity)
            FROM inventory_transactions
            WHERE project_id IS NOT NULL AND transaction_type = 'issue'
            GROUP BY project_id
            ORDER BY project_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let shared_amounts = sqlx::query_scalar::<_, Decimal>(
            "SELECT amount FROM general_expenses \
             WHERE allocation_type = 'weight_based' AND status = 'approved'",
        )
        .fetch_all(&self.db)
        .await?;

        let allocated_expenses = allocation_totals(&shared_amounts, &weights)
            .get(&project_id)
            .copied()
            .unwrap_or_default();

        Ok(ProjectBalance::new(
            project_id,
            income,
            direct_expenses,
            allocated_expenses,
            material_cost,
        ))
    }

    /// Lock a row, check the decision against the allow-list and persist it
    async fn decide<T>(
        &self,
        target: &Decided,
        id: Uuid,
        next: ApprovalStatus,
        approved_by: Option<Uuid>,
        note: Option<String>,
    ) -> AppResult<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(&format!(
            "SELECT status FROM {} WHERE id = $1 FOR UPDATE",
            target.table
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(target.label))?;

        let status = current
            .parse::<ApprovalStatus>()?
            .transition_to(next, target.entity)
            .map_err(|e| {
                tracing::warn!(id = %id, "rejected decision: {}", e);
                e
            })?;

        let row = sqlx::query_as::<_, T>(&format!(
            r#"
            UPDATE {table}
            SET status = $2,
                approved_by = COALESCE($3, approved_by),
                approved_at = CASE WHEN $3::uuid IS NULL THEN approved_at ELSE NOW() END,
                notes = CASE
                    WHEN $4::text IS NULL THEN notes
                    WHEN notes = '' THEN $4
                    ELSE notes || E'\n' || $4
                END
            WHERE id = $1
            RETURNING {columns}
            "#,
            table = target.table,
            columns = target.columns,
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(approved_by)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(id = %id, status = %status, "{} decided", target.entity);
        Ok(row)
    }
}

fn rejection_note(input: DecisionInput) -> Option<String> {
    input
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| format!("Rejection reason: {}", r))
}

/// Sum of shares per project over several weight-based expenses
pub fn allocation_totals(
    amounts: &[Decimal],
    weights: &[(Uuid, Decimal)],
) -> HashMap<Uuid, Decimal> {
    let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
    for amount in amounts {
        for (project_id, share) in allocate_by_weight(*amount, weights) {
            *totals.entry(project_id).or_default() += share;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn expense_amount_is_checked() {
        let input = CreateExpenseInput {
            description: "Site security".into(),
            amount: dec("120.005"),
            expense_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            allocation_type: AllocationType::WeightBased,
            project_id: None,
            category_id: None,
            notes: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("amount"));
    }

    #[test]
    fn allocation_type_reads_snake_case() {
        let input: CreateExpenseInput = serde_json::from_str(
            r#"{"description":"Crane rental","amount":"900.00","expense_date":"2024-05-02",
                "allocation_type":"project_specific","project_id":"00000000-0000-0000-0000-000000000000"}"#,
        )
        .unwrap();
        assert_eq!(input.allocation_type, AllocationType::ProjectSpecific);
        assert!(input.validate().is_ok());
        assert!(input.allocation_type.check_project(input.project_id).is_ok());
    }

    #[test]
    fn blank_rejection_reason_adds_no_note() {
        assert_eq!(rejection_note(DecisionInput { reason: Some("  ".into()) }), None);
        assert_eq!(
            rejection_note(DecisionInput { reason: Some("duplicate invoice".into()) }).as_deref(),
            Some("Rejection reason: duplicate invoice")
        );
    }

    #[test]
    fn currency_must_be_three_letters() {
        let input = SetPriceInput {
            unit_price: dec("12.50"),
            currency: Some("EURO".into()),
            notes: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn shared_expenses_accumulate_per_project() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let totals = allocation_totals(&[dec("100"), dec("50")], &[(a, dec("3")), (b, dec("1"))]);
        assert_eq!(totals[&a], dec("112.50"));
        assert_eq!(totals[&b], dec("37.50"));
    }
}
