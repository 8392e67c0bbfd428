//! Page identity and resident page representation
//!
//! A page is a fixed-size contiguous run of the logical item sequence and is
//! the unit of fetch and eviction.

use std::sync::Arc;

/// Identifies one fixed-size page of the logical sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageNumber(pub u64);

impl PageNumber {
    /// Create a new page number.
    #[inline]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Page owning the given logical index.
    #[inline]
    pub const fn of_index(index: u64, page_size: usize) -> Self {
        Self(index / page_size as u64)
    }

    /// Get the raw value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Logical index of the first item on this page.
    #[inline]
    pub const fn first_index(self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl From<u64> for PageNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<PageNumber> for u64 {
    fn from(page: PageNumber) -> Self {
        page.0
    }
}

impl std::fmt::Display for PageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {}", self.0)
    }
}

/// A materialized page: an ordered run of items plus access bookkeeping.
///
/// Pages are owned exclusively by the store; readers receive copies of
/// individual items, never the page itself.
#[derive(Debug, Clone)]
pub(crate) struct Page<T> {
    number: PageNumber,
    items: Arc<Vec<T>>,
    last_access: u64,
}

impl<T> Page<T> {
    /// Create a page from a completed fetch.
    pub(crate) fn new(number: PageNumber, items: Arc<Vec<T>>, stamp: u64) -> Self {
        Self {
            number,
            items,
            last_access: stamp,
        }
    }

    /// The page's position in the logical sequence.
    #[inline]
    pub(crate) fn number(&self) -> PageNumber {
        self.number
    }

    /// Number of items on this page. Only the final page of the sequence may
    /// hold fewer than the configured page size.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Stamp of the most recent access to any index on this page.
    #[inline]
    pub(crate) fn last_access(&self) -> u64 {
        self.last_access
    }

    /// Record an access.
    #[inline]
    pub(crate) fn touch(&mut self, stamp: u64) {
        self.last_access = stamp;
    }

    /// Shared handle to the page's item vector.
    #[inline]
    pub(crate) fn items(&self) -> &Arc<Vec<T>> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_arithmetic() {
        assert_eq!(PageNumber::of_index(0, 10), PageNumber::new(0));
        assert_eq!(PageNumber::of_index(9, 10), PageNumber::new(0));
        assert_eq!(PageNumber::of_index(10, 10), PageNumber::new(1));
        assert_eq!(PageNumber::of_index(25, 10), PageNumber::new(2));

        assert_eq!(PageNumber::new(2).first_index(10), 20);
        assert_eq!(PageNumber::new(0).first_index(10), 0);
    }

    #[test]
    fn test_page_number_ordering() {
        assert!(PageNumber::new(1) < PageNumber::new(2));
        assert_eq!(PageNumber::from(7).raw(), 7);
        assert_eq!(u64::from(PageNumber::new(7)), 7);
    }

    #[test]
    fn test_page_touch() {
        let mut page = Page::new(PageNumber::new(3), Arc::new(vec![1, 2, 3]), 10);
        assert_eq!(page.number(), PageNumber::new(3));
        assert_eq!(page.len(), 3);
        assert_eq!(page.last_access(), 10);

        page.touch(42);
        assert_eq!(page.last_access(), 42);
    }
}
