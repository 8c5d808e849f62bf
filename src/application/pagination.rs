//! Offset pagination for the public article listing.

use serde::Serialize;
use thiserror::Error;

pub const MAX_PER_PAGE: u32 = 100;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Result<Self, PaginationError> {
        if page == 0 {
            return Err(PaginationError::InvalidPage(page));
        }
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(PaginationError::InvalidPerPage(per_page));
        }
        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

/// Rows of one page plus the exact total reported by the remote query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlice<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> PageSlice<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn from_slice(request: PageRequest, slice: PageSlice<T>) -> Self {
        Self {
            items: slice.items,
            total: slice.total,
            page: request.page,
            per_page: request.per_page,
            total_pages: slice.total.div_ceil(u64::from(request.per_page)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page must be at least 1 (got {0})")]
    InvalidPage(u32),
    #[error("per_page must be between 1 and {MAX_PER_PAGE} (got {0})")]
    InvalidPerPage(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_follows_page_number() {
        let first = PageRequest::new(1, 10).expect("first page");
        assert_eq!(first.offset(), 0);
        assert_eq!(first.limit(), 10);

        let third = PageRequest::new(3, 10).expect("third page");
        assert_eq!(third.offset(), 20);
    }

    #[test]
    fn rejects_out_of_range_requests() {
        assert_eq!(
            PageRequest::new(0, 10).expect_err("page zero"),
            PaginationError::InvalidPage(0)
        );
        assert_eq!(
            PageRequest::new(1, 0).expect_err("empty page"),
            PaginationError::InvalidPerPage(0)
        );
        assert_eq!(
            PageRequest::new(1, 101).expect_err("oversized page"),
            PaginationError::InvalidPerPage(101)
        );
    }

    #[test]
    fn total_pages_round_up() {
        let request = PageRequest::new(2, 10).expect("request");
        let page = Page::from_slice(request, PageSlice::new(vec![1, 2, 3], 23));
        assert_eq!(page.total_pages, 3);

        let empty = Page::<u8>::from_slice(request, PageSlice::new(Vec::new(), 0));
        assert_eq!(empty.total_pages, 0);
    }
}
