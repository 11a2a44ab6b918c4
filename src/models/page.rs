use serde::Serialize;

use crate::error::ServiceError;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Validated limit/offset pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    /// Apply defaults and reject limits outside `1..=100`.
    pub fn resolve(limit: Option<u32>, offset: Option<u32>) -> Result<Self, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ServiceError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        Self {
            total,
            limit: request.limit,
            offset: request.offset,
            has_more: i64::from(request.offset) + i64::from(request.limit) < total,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let page = PageRequest::resolve(None, None).unwrap();
        assert_eq!(page, PageRequest { limit: 10, offset: 0 });
    }

    #[test]
    fn rejects_out_of_range_limit() {
        assert!(PageRequest::resolve(Some(0), None).is_err());
        assert!(PageRequest::resolve(Some(101), None).is_err());
        assert!(PageRequest::resolve(Some(100), Some(5)).is_ok());
    }

    #[test]
    fn has_more_reflects_remaining_rows() {
        let request = PageRequest { limit: 10, offset: 10 };
        assert!(Pagination::new(request, 21).has_more);
        assert!(!Pagination::new(request, 20).has_more);
    }
}
