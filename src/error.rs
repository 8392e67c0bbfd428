//! Error types for store and fetch operations
//!
//! Failures are surfaced to the immediate caller and never swallowed; a
//! failed fetch leaves the resident set exactly as it was, and the failed
//! page is retried on the next access rather than cached as known-bad.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::fetch::BoxError;
use crate::page::PageNumber;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`PageStore`](crate::PageStore) operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Construction-time parameter violation. The store is not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Requested index lies outside `[0, count)`. No state was changed.
    #[error("index {index} out of range for store of {count} items")]
    IndexOutOfRange {
        /// The requested logical index.
        index: u64,
        /// The logical item count at the time of the call.
        count: u64,
    },

    /// The page-fetch collaborator failed. The resident set is unchanged and
    /// a later access to the same page retries the fetch.
    #[error(transparent)]
    FetchFailed(#[from] FetchError),

    /// The fetcher returned fewer items than the requested offset requires,
    /// violating its postcondition for a non-final page.
    #[error("{page} holds only {len} items, offset {offset} is out of range")]
    ShortPage {
        /// The page that came up short.
        page: PageNumber,
        /// Offset within the page that was requested.
        offset: usize,
        /// Number of items the fetched page actually holds.
        len: usize,
    },
}

/// A failed page fetch, carrying the page number and the underlying cause.
///
/// Cloneable so a single in-flight failure can be delivered to every caller
/// awaiting the same page.
#[derive(Debug, Clone)]
pub struct FetchError {
    page: PageNumber,
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl FetchError {
    /// Wrap a fetch failure for `page`.
    pub fn new(page: PageNumber, source: BoxError) -> Self {
        Self {
            page,
            source: Arc::from(source),
        }
    }

    /// The page whose fetch failed.
    pub fn page(&self) -> PageNumber {
        self.page
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch for {} failed: {}", self.page, self.source)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref() as &(dyn std::error::Error + 'static))
    }
}
