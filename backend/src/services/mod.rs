//! Business logic services for the SCM back office

pub mod accounting;
pub mod dashboard;
pub mod inventory;
pub mod materials;
pub mod notification;
pub mod procurement;
pub mod projects;
pub mod quality;
pub mod request;

pub use accounting::AccountingService;
pub use dashboard::DashboardService;
pub use inventory::InventoryService;
pub use materials::MaterialService;
pub use notification::{spawn_alert_worker, AlertEvent, AlertSender, NotificationService};
pub use procurement::ProcurementService;
pub use projects::ProjectService;
pub use quality::QualityService;
pub use request::RequestService;
