//! Common types used across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

const MAX_PER_PAGE: u32 = 1000;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    100
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    /// Page size clamped to 1..=1000
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }

    pub fn meta(&self, total_items: u64) -> PaginationMeta {
        let per_page = self.limit() as u64;
        PaginationMeta {
            page: self.page.max(1),
            per_page: per_page as u32,
            total_items,
            total_pages: total_items.div_ceil(per_page) as u32,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: u64) -> Self {
        Self {
            data,
            pagination: pagination.meta(total_items),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Prefixes of generated document numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PurchaseOrder,
    Request,
    QualityCheck,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::Request => "REQ",
            DocumentKind::QualityCheck => "QC",
        }
    }

    /// `PREFIX-YYYYMMDD-` stem shared by every number issued on `date`
    pub fn stem(&self, date: NaiveDate) -> String {
        format!("{}-{}-", self.prefix(), date.format("%Y%m%d"))
    }

    /// Number following `last` (the highest number issued on `date`)
    pub fn next_number(&self, date: NaiveDate, last: Option<&str>) -> String {
        let sequence = last
            .and_then(|number| number.rsplit('-').next())
            .and_then(|tail| tail.parse::<u32>().ok())
            .unwrap_or(0)
            + 1;
        format!("{}{:04}", self.stem(date), sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_bounds() {
        let p = Pagination { page: 3, per_page: 20 };
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 40);

        let p = Pagination { page: 0, per_page: 5000 };
        assert_eq!(p.limit(), 1000);
        assert_eq!(p.offset(), 0);

        let meta = Pagination { page: 1, per_page: 20 }.meta(41);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn document_numbers() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(DocumentKind::PurchaseOrder.next_number(date, None), "PO-20240309-0001");
        assert_eq!(
            DocumentKind::Request.next_number(date, Some("REQ-20240309-0041")),
            "REQ-20240309-0042"
        );
        assert_eq!(
            DocumentKind::Request.next_number(date, Some("REQ-20240309-9999")),
            "REQ-20240309-10000"
        );
        assert_eq!(
            DocumentKind::Request.next_number(date, Some("REQ-20240309-10000")),
            "REQ-20240309-10001"
        );
        assert_eq!(
            DocumentKind::QualityCheck.next_number(date, Some("garbage")),
            "QC-20240309-0001"
        );
    }
}
