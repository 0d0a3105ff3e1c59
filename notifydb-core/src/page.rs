//! Pagination and paged result types.
//!
//! [`Pagination::compute`] derives page metadata from a total count, a page size and the
//! current page. [`PageWindow`] validates the requested page and turns it into a skip/limit
//! pair. [`PagedResult`] is what every paged query returns to the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Page metadata derived from a total count, a page size and the current page.
///
/// # Example
///
/// ```ignore
/// use notifydb_core::page::Pagination;
///
/// let pagination = Pagination::compute(35, 10, 2)?;
/// assert_eq!(pagination.total_page, 4);
/// assert_eq!(pagination.next_page, Some(3));
/// assert_eq!(pagination.previous_page, Some(1));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Total count of items across all pages.
    pub total: u64,
    /// The current page number (1-indexed).
    pub current_page: u64,
    /// Number of pages needed to hold `total` items.
    pub total_page: u64,
    /// The next page number (if more pages exist).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
    /// The previous page number (if this is not the first page).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<u64>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    /// Computes the page metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPageSize`] when `limit <= 0` and
    /// [`DocumentStoreError::InvalidPageNumber`] when `current_page <= 0` or the page lies
    /// beyond any addressable offset.
    pub fn compute(total: u64, limit: i64, current_page: i64) -> DocumentStoreResult<Self> {
        Ok(PageWindow::new(current_page, limit)?.paginate(total))
    }
}

fn positive(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|v| *v > 0)
}

/// A validated page request.
///
/// Pages are 1-indexed (page 1 is the first page).
///
/// # Example
///
/// ```ignore
/// use notifydb_core::page::PageWindow;
///
/// let window = PageWindow::new(3, 20)?;
/// assert_eq!(window.offset(), 40);  // Skip 40 items for page 3
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page: u64,
    limit: u64,
    offset: u64,
}

impl PageWindow {
    /// Validates a page number and page size.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPageSize`] when `limit <= 0`, and
    /// [`DocumentStoreError::InvalidPageNumber`] when `page <= 0` or the skip count overflows.
    pub fn new(page: i64, limit: i64) -> DocumentStoreResult<Self> {
        let limit_value = positive(limit).ok_or(DocumentStoreError::InvalidPageSize(limit))?;
        let page_value = positive(page).ok_or(DocumentStoreError::InvalidPageNumber(page))?;
        let offset = (page_value - 1)
            .checked_mul(limit_value)
            .ok_or(DocumentStoreError::InvalidPageNumber(page))?;

        Ok(Self {
            page: page_value,
            limit: limit_value,
            offset,
        })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of items to skip before this page starts.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Computes the page metadata for this window given the total matching count.
    pub fn paginate(&self, total: u64) -> Pagination {
        let total_page = total.div_ceil(self.limit);
        let has_next_page = total_page > self.page;
        let has_previous_page = self.page > 1;

        Pagination {
            total,
            current_page: self.page,
            total_page,
            next_page: has_next_page.then(|| self.page + 1),
            previous_page: has_previous_page.then(|| self.page - 1),
            has_next_page,
            has_previous_page,
        }
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self { page: 1, limit: 10, offset: 0 }
    }
}

/// A single page of query results along with its metadata.
///
/// Serializes to the flat JSON shape expected by HTTP callers:
///
/// ```json
/// { "total": 35, "currentPage": 2, "totalPage": 4, "pageSize": 10,
///   "nextPage": 3, "previousPage": 1, "hasNextPage": true, "hasPreviousPage": true,
///   "items": [ ... ] }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    #[serde(flatten)]
    pub pagination: Pagination,
    /// Number of items actually returned in this page.
    pub page_size: usize,
    pub items: Vec<T>,
}

impl<T> PagedResult<T> {
    /// Assembles a page. `page_size` is always the number of items given.
    pub fn new(pagination: Pagination, items: Vec<T>) -> Self {
        Self {
            pagination,
            page_size: items.len(),
            items,
        }
    }

    /// Converts every item while keeping the page metadata.
    pub fn map<U, F>(self, f: F) -> PagedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PagedResult::new(self.pagination, self.items.into_iter().map(f).collect())
    }
}

impl<T: Serialize> PagedResult<T> {
    /// Converts the page to its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if an item cannot be serialized.
    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
