//! Asynchronous page-fetch collaborator contract
//!
//! The store performs no I/O of its own; the embedding application supplies
//! a [`PageFetcher`] backed by whatever actually holds the data (a remote
//! API, a local database, a file).

use std::future::Future;

use futures::future::BoxFuture;

use crate::page::PageNumber;

/// Boxed error type fetchers may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single page fetch.
pub type FetchOutcome<T> = std::result::Result<Vec<T>, BoxError>;

/// Supplies page contents on demand.
///
/// Implementations must map `(page, page_size)` deterministically to the
/// same logical item range for a given data-source version, returning
/// exactly `page_size` items except for the final page of the sequence,
/// which may be shorter.
///
/// `fetch_page` is invoked while the store's internal state is locked: it
/// must only construct the future, deferring all I/O to the future itself.
pub trait PageFetcher<T>: Send + Sync {
    /// Fetch up to `page_size` items starting at
    /// `page.first_index(page_size)`.
    fn fetch_page(&self, page: PageNumber, page_size: usize) -> BoxFuture<'static, FetchOutcome<T>>;
}

/// Adapter turning an async closure into a [`PageFetcher`].
///
/// Built with [`fetch_fn`].
pub struct FnFetcher<F> {
    f: F,
}

/// Wrap an async closure as a [`PageFetcher`].
///
/// ```ignore
/// let fetcher = fetch_fn(|page, page_size| async move {
///     let first = page.first_index(page_size);
///     Ok(backend.rows(first, page_size).await?)
/// });
/// ```
pub fn fetch_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher { f }
}

impl<T, F, Fut> PageFetcher<T> for FnFetcher<F>
where
    F: Fn(PageNumber, usize) -> Fut + Send + Sync,
    Fut: Future<Output = FetchOutcome<T>> + Send + 'static,
{
    fn fetch_page(&self, page: PageNumber, page_size: usize) -> BoxFuture<'static, FetchOutcome<T>> {
        Box::pin((self.f)(page, page_size))
    }
}
