//! Error handling for the SCM back office
//!
//! Maps domain and infrastructure failures onto consistent JSON error
//! responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient quantity: {0}")]
    InsufficientQuantity(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(entity.to_string())
    }

    /// Turn a unique-constraint violation into `DuplicateEntry`, leaving
    /// every other database error untouched
    pub fn on_duplicate(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry(what.into())
            }
            _ => AppError::DatabaseError(err),
        }
    }

    /// Map the constraint violations an insert can hit: unique keys become
    /// `DuplicateEntry`, foreign keys a validation error on the referencing
    /// column. Other database errors are left untouched.
    pub fn on_constraint(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry(what.into())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                let field = referenced_field(db.table(), db.constraint());
                let message = format!("Referenced {} does not exist", field);
                AppError::Validation { field, message }
            }
            _ => AppError::DatabaseError(err),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::InvalidStateTransition(_)
            | AppError::InsufficientQuantity(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Column named by a Postgres foreign-key constraint
/// (`request_items_material_id_fkey` on `request_items` is `material_id`)
fn referenced_field(table: Option<&str>, constraint: Option<&str>) -> String {
    let Some(constraint) = constraint else {
        return "reference".to_string();
    };
    let column = constraint.strip_suffix("_fkey").unwrap_or(constraint);
    table
        .and_then(|t| column.strip_prefix(t))
        .and_then(|c| c.strip_prefix('_'))
        .unwrap_or(column)
        .to_string()
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientQuantity { .. } => {
                AppError::InsufficientQuantity(err.to_string())
            }
            DomainError::InvalidTransition { .. } => AppError::InvalidStateTransition(err.to_string()),
            DomainError::Validation { field, message } => AppError::Validation { field, message },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("body".to_string(), errors.to_string()));

        AppError::Validation { field, message }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            AppError::Unauthorized(msg) => ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            AppError::InsufficientPermissions(perm) => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                format!("You do not have permission to perform this action ({})", perm),
            ),
            AppError::Validation { field, message } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message: message.clone(),
                field: Some(field.clone()),
            },
            AppError::DuplicateEntry(what) => {
                ErrorDetail::new("DUPLICATE_ENTRY", format!("{} already exists", what))
            }
            AppError::NotFound(entity) => {
                ErrorDetail::new("NOT_FOUND", format!("{} not found", entity))
            }
            AppError::InvalidStateTransition(msg) => {
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone())
            }
            AppError::InsufficientQuantity(msg) => {
                ErrorDetail::new("INSUFFICIENT_QUANTITY", msg.clone())
            }
            AppError::DatabaseError(_) => {
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::Internal(_) => {
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sqlx::error::{DatabaseError, ErrorKind};
    use uuid::Uuid;

    #[derive(Debug)]
    struct PgViolation {
        kind: ErrorKind,
        table: &'static str,
        constraint: &'static str,
    }

    impl std::fmt::Display for PgViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violates constraint {}", self.constraint)
        }
    }

    impl std::error::Error for PgViolation {}

    impl DatabaseError for PgViolation {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn table(&self) -> Option<&str> {
            Some(self.table)
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> ErrorKind {
            match &self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn violation(kind: ErrorKind, table: &'static str, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgViolation {
            kind,
            table,
            constraint,
        }))
    }

    #[test]
    fn unknown_reference_is_bad_request() {
        let err = AppError::on_constraint(
            violation(
                ErrorKind::ForeignKeyViolation,
                "request_items",
                "request_items_material_id_fkey",
            ),
            "Request line",
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "material_id"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let err = AppError::on_constraint(
            violation(
                ErrorKind::ForeignKeyViolation,
                "requests",
                "requests_warehouse_id_fkey",
            ),
            "Request",
        );
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "warehouse_id"));
    }

    #[test]
    fn unique_violation_is_conflict() {
        let err = AppError::on_constraint(
            violation(ErrorKind::UniqueViolation, "requests", "requests_number_key"),
            "Request REQ-20240101-0001",
        );
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = AppError::on_constraint(
            violation(ErrorKind::CheckViolation, "requests", "requests_check"),
            "Request",
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::on_constraint(sqlx::Error::RowNotFound, "Request").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn constraint_names_resolve_to_columns() {
        assert_eq!(
            referenced_field(Some("purchase_orders"), Some("purchase_orders_warehouse_id_fkey")),
            "warehouse_id"
        );
        assert_eq!(referenced_field(None, Some("custom_fk")), "custom_fk");
        assert_eq!(referenced_field(Some("requests"), None), "reference");
    }

    #[test]
    fn domain_errors_map_to_bad_request() {
        let insufficient: AppError = DomainError::InsufficientQuantity {
            material_id: Uuid::nil(),
            available: Decimal::ONE,
            requested: Decimal::TEN,
        }
        .into();
        assert_eq!(insufficient.status_code(), StatusCode::BAD_REQUEST);

        let transition: AppError = DomainError::InvalidTransition {
            entity: "purchase order",
            from: "draft".into(),
            to: "approved".into(),
        }
        .into();
        assert!(matches!(transition, AppError::InvalidStateTransition(_)));
        assert_eq!(transition.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(AppError::not_found("Inventory item").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InsufficientPermissions("inventory:adjust".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::DuplicateEntry("Material".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_unique_database_errors_pass_through() {
        let err = AppError::on_duplicate(sqlx::Error::RowNotFound, "Supplier");
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[test]
    fn into_response_uses_status() {
        let response = AppError::validation("quantity", "must be positive").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
