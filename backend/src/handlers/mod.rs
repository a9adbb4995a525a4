//! HTTP handlers for the SCM back office

use serde::Deserialize;

pub mod accounting;
pub mod dashboard;
pub mod health;
pub mod inventory;
pub mod materials;
pub mod notification;
pub mod procurement;
pub mod projects;
pub mod quality;
pub mod request;

pub use accounting::*;
pub use dashboard::*;
pub use health::*;
pub use inventory::*;
pub use materials::*;
pub use notification::*;
pub use procurement::*;
pub use projects::*;
pub use quality::*;
pub use request::*;

/// `?active_only=true` on reference-data listings
#[derive(Debug, Default, Deserialize)]
pub struct ActiveQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// `?days=N` look-ahead window
#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

impl DaysQuery {
    pub fn days_or(&self, default: u32) -> u32 {
        self.days.unwrap_or(default).min(365)
    }
}
