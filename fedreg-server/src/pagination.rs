//! Offset pagination shared by all list endpoints
//!
//! Pages are 1-indexed. The page number is never clamped to the last page:
//! a page past the end yields an empty list with correct totals.

/// Sanitized pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub page_size: i64,
    /// Offset for SQL LIMIT/OFFSET or slice skipping
    pub offset: i64,
}

/// Calculate the window for a requested page and page size
///
/// `page < 1` becomes 1; the page size falls back to `default_size` when
/// absent and is clamped to `1..=max_size`.
///
/// # Examples
/// ```
/// use fedreg_server::pagination::calculate_pagination;
///
/// let p = calculate_pagination(Some(3), Some(10), 10, 100);
/// assert_eq!(p.offset, 20);
///
/// let p = calculate_pagination(Some(0), Some(500), 10, 100);
/// assert_eq!(p.page, 1);
/// assert_eq!(p.page_size, 100);
/// ```
pub fn calculate_pagination(
    requested_page: Option<i64>,
    requested_size: Option<i64>,
    default_size: i64,
    max_size: i64,
) -> Pagination {
    let page = requested_page.unwrap_or(1).max(1);
    let page_size = requested_size.unwrap_or(default_size).clamp(1, max_size.max(1));
    let offset = (page - 1).saturating_mul(page_size);

    Pagination {
        page,
        page_size,
        offset,
    }
}

/// `ceil(total / page_size)`
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}

/// Apply a window to an in-memory, already ordered list
pub fn paginate<T>(items: Vec<T>, window: Pagination) -> Vec<T> {
    items
        .into_iter()
        .skip(window.offset.max(0) as usize)
        .take(window.page_size.max(0) as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(Some(2), Some(10), 10, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.page_size, 10);
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn test_pagination_defaults() {
        let p = calculate_pagination(None, None, 10, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 10);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(Some(-4), Some(0), 10, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_high_page_not_clamped() {
        let p = calculate_pagination(Some(99), Some(10), 10, 100);
        assert_eq!(p.page, 99);
        assert_eq!(p.offset, 980);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 0), 0);
    }

    #[test]
    fn test_paginate_slices() {
        let items: Vec<i32> = (1..=25).collect();
        let window = calculate_pagination(Some(3), Some(10), 10, 100);
        assert_eq!(paginate(items.clone(), window), vec![21, 22, 23, 24, 25]);

        let past_end = calculate_pagination(Some(4), Some(10), 10, 100);
        assert!(paginate(items, past_end).is_empty());
    }
}
