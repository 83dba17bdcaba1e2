//! Shared pagination request/response shapes, reused by the operator and
//! labor-overview list endpoints.

use serde::{Deserialize, Serialize};

use crate::error::WmsError;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    /// Validate raw query-string values: `page >= 1`, `limit in [1, 200]`
    /// defaulting to 50 when absent.
    pub fn parse(page: Option<i64>, limit: Option<i64>) -> Result<Self, WmsError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(WmsError::invalid("page must be >= 1"));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(WmsError::invalid(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied_when_absent() {
        let p = PageParams::parse(None, None).unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, DEFAULT_LIMIT);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn rejects_out_of_range_limit() {
        assert!(PageParams::parse(Some(1), Some(0)).is_err());
        assert!(PageParams::parse(Some(1), Some(201)).is_err());
        assert!(PageParams::parse(Some(0), Some(50)).is_err());
    }

    #[test]
    fn offset_follows_page_and_limit() {
        let p = PageParams::parse(Some(3), Some(20)).unwrap();
        assert_eq!(p.offset(), 40);
    }
}
