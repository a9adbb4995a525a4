//! Database models for the SCM back office
//!
//! Re-exports the domain types from the shared crate and adds the row
//! types read from PostgreSQL.

pub use shared::models::*;

mod accounting;
mod inventory;
mod material;
mod notification;
mod procurement;
mod project;
mod quality;
mod request;

pub use accounting::{
    AccountingEntry, ExpenseCategory, ExpenseSummary, ExpenseTotal, GeneralExpense, ProjectIncome,
};
pub use inventory::{InventoryItem, InventoryLocation, InventoryTransaction, Warehouse};
pub use material::{Material, MaterialCategory};
pub use notification::{AlertRule, Notification};
pub use procurement::{PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem, Supplier};
pub use project::Project;
pub use quality::{QualityCheck, QualityCheckDetail, QualityCheckItem, QualityStandard};
pub use request::{Request, RequestDetail, RequestItem};
