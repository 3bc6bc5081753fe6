use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Clamp client paging parameters to `(limit, offset)`.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamps() {
        assert_eq!(page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page(Some(1000), Some(-5)), (MAX_PAGE_SIZE, 0));
        assert_eq!(page(Some(0), Some(20)), (1, 20));
    }
}
