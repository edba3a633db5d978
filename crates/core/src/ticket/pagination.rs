//! 1-based pagination over list results.

use serde::Serialize;

use crate::config::PaginationConfig;

/// A requested page, before normalisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number. Zero or negative means the first page.
    pub page: i64,
    /// Items per page. Zero or negative means the configured default.
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// Applies defaults and caps, returning `(page, page_size)`.
    pub fn normalize(self, config: &PaginationConfig) -> (u64, u64) {
        let page = if self.page < 1 { 1 } else { self.page as u64 };
        let size = if self.page_size < 1 {
            config.default_page_size
        } else {
            (self.page_size as u64).min(config.max_page_size)
        };
        (page, size)
    }
}

/// Rows to skip before `page` of size `page_size`.
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// One page of results plus the totals needed to navigate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    /// Wraps one page of `items` taken from `total` matches.
    pub fn new(items: Vec<T>, total: u64, current_page: u64, page_size: u64) -> Self {
        Self {
            items,
            total,
            total_pages: total.div_ceil(page_size),
            current_page,
            page_size,
        }
    }

    /// Converts the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            total_pages: self.total_pages,
            current_page: self.current_page,
            page_size: self.page_size,
        }
    }
}
