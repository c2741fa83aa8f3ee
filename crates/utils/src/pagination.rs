use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Page metadata attached to list-shaped responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = total.div_ceil(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let meta = Pagination::new(2, 5, 10);
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn remainder_adds_a_page() {
        let meta = Pagination::new(1, 5, 11);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn empty_result_set_has_no_pages() {
        let meta = Pagination::new(1, 10, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }
}
