//! Domain errors raised by the pure business rules

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Rule violations detected before anything is written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error(
        "Insufficient quantity for material {material_id}: available {available}, requested {requested}"
    )]
    InsufficientQuantity {
        material_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Invalid {entity} status transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{field}: {message}")]
    Validation { field: String, message: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
