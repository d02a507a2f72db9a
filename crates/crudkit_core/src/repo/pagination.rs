//! Page envelope and page arithmetic.
//!
//! # Invariants
//! - `pages == ceil(total / limit)`.
//! - `result` is the slice `[page * limit, page * limit + limit)` of the
//!   ordered source, so `result.len() <= limit`.
//! - A zero `limit` is rejected instead of dividing by zero.

use crate::repo::error::{RepoError, RepoResult};
use serde::Serialize;

/// Items per page when the caller does not choose one.
pub const DEFAULT_PAGE_LIMIT: u32 = 15;

/// Zero-based page index plus page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Result envelope returned by every pagination call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub result: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub pages: u64,
}

/// Slice bounds for one page of a source with `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub offset: u64,
    pub limit: u64,
    pub pages: u64,
}

/// Computes page count and slice bounds.
///
/// # Errors
/// - `InvalidArgument` when `request.limit == 0`.
pub fn page_bounds(total: u64, request: PageRequest) -> RepoResult<PageBounds> {
    if request.limit == 0 {
        return Err(RepoError::InvalidArgument(
            "page limit must be greater than zero".to_string(),
        ));
    }

    let limit = u64::from(request.limit);
    Ok(PageBounds {
        offset: u64::from(request.page) * limit,
        limit,
        pages: total.div_ceil(limit),
    })
}

/// Paginates an already materialized sequence without re-querying.
pub fn paginate_collection<T>(items: Vec<T>, request: PageRequest) -> RepoResult<Page<T>> {
    let total = items.len() as u64;
    let bounds = page_bounds(total, request)?;

    let offset = usize::try_from(bounds.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(bounds.limit).unwrap_or(usize::MAX);
    let result = items.into_iter().skip(offset).take(limit).collect();

    Ok(Page {
        result,
        total,
        page: request.page,
        pages: bounds.pages,
    })
}
