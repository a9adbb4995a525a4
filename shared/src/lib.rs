//! Shared domain types and rules for the SCM back office
//!
//! This crate holds everything that can be decided without touching the
//! database: status enumerations and their transition tables, stock
//! movement validation, ledger arithmetic and the receiving/fulfillment
//! planners used by the backend inside its transactions.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
