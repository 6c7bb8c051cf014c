//! Paginated result sets

use serde::{Deserialize, Serialize};

/// Where a page of results came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageOrigin {
    /// Fetched from the remote catalog during this call
    Remote,
    /// Read from the local cache (offline, or the remote call failed)
    Cache,
}

/// One page of a paginated result set.
///
/// Page numbers are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub origin: PageOrigin,
}

/// Treat page 0 as page 1
pub fn sanitize_page(page: u32) -> u32 {
    page.max(1)
}

/// `ceil(total / page_size)`, with a zero page size counting as one
pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(total_items.div_ceil(size)).unwrap_or(u32::MAX)
}

/// Offset of the first item on `page`
pub fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(sanitize_page(page) - 1) * u64::from(page_size)
}

impl<T> Page<T> {
    /// Build a page from its items and the total size of the result set
    pub fn new(
        items: Vec<T>,
        total_items: u64,
        page: u32,
        page_size: u32,
        origin: PageOrigin,
    ) -> Self {
        let current_page = sanitize_page(page);
        let total_pages = total_pages(total_items, page_size);
        Self {
            items,
            total_items,
            current_page,
            total_pages,
            has_more: current_page < total_pages,
            origin,
        }
    }

    /// Every item in a single page with nothing further to fetch
    pub fn single(items: Vec<T>, origin: PageOrigin) -> Self {
        Self {
            total_items: items.len() as u64,
            items,
            current_page: 1,
            total_pages: 1,
            has_more: false,
            origin,
        }
    }

    /// An empty cache answer, as opposed to a remote search that found nothing
    pub fn is_offline_empty(&self) -> bool {
        self.origin == PageOrigin::Cache && self.items.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
