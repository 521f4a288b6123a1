//! `/api` route groups.

pub mod analytics;
pub mod dashboard;
pub mod database;
pub mod email_marketing;
pub mod export;
pub mod lead_prospecting;
pub mod leads;
pub mod settings;
pub mod web_scraping;

use crate::state::AppState;
use axum::Router;
use serde::Serialize;

/// Every route group, mounted under `/api` by [`crate::router`].
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/leads", leads::router())
        .nest("/dashboard", dashboard::router())
        .nest("/analytics", analytics::router())
        .nest("/export", export::router())
        .nest("/settings", settings::router())
        .nest("/database", database::router())
        .nest("/lead-prospecting", lead_prospecting::router())
        .nest("/web-scraping", web_scraping::router())
        .nest("/email-marketing", email_marketing::router())
}

/// Page metadata returned by paged listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// 1-based page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Unpaged total
    pub total: i64,
    /// Number of pages
    pub pages: i64,
}

impl Pagination {
    /// Metadata for `total` items split into pages of `limit`.
    #[must_use]
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            pages: (total + i64::from(limit) - 1) / i64::from(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).pages, 1);
        assert_eq!(Pagination::new(2, 10, 11).pages, 2);
    }
}
