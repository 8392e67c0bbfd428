//! Paged virtual store: on-demand fetch, bounded residency, LRU eviction
//!
//! [`PageStore`] presents a logically indexable sequence while keeping at
//! most `max_resident_pages` pages materialized. Reads of resident items
//! return without suspension; misses suspend on a fetch shared by every
//! caller waiting on the same page, so concurrent reads of one missing page
//! issue exactly one `fetch_page` call. The internal lock is held only for
//! map transitions, never across an await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{FetchError, Result, StoreError};
use crate::eviction::{EvictionPolicy, LruEviction};
use crate::fetch::PageFetcher;
use crate::page::{Page, PageNumber};
use crate::{DEFAULT_MAX_RESIDENT_PAGES, DEFAULT_PAGE_SIZE};

/// Configuration for a [`PageStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Items per page: the unit of fetch granularity and eviction.
    pub page_size: usize,
    /// Upper bound on simultaneously materialized pages.
    pub max_resident_pages: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_resident_pages: DEFAULT_MAX_RESIDENT_PAGES,
        }
    }
}

impl StoreConfig {
    /// Set the page size.
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the residency budget.
    pub fn max_resident_pages(mut self, pages: usize) -> Self {
        self.max_resident_pages = pages;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StoreError::InvalidConfig(
                "page size must be greater than 0".to_string(),
            ));
        }

        if self.max_resident_pages == 0 {
            return Err(StoreError::InvalidConfig(
                "max resident pages must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Counters describing store behavior since construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Pages currently materialized.
    pub resident_pages: usize,
    /// Fetches currently in flight.
    pub pending_fetches: usize,
    /// Item reads served from a resident page.
    pub hits: u64,
    /// Item reads that had to wait on a fetch.
    pub misses: u64,
    /// `fetch_page` calls issued.
    pub fetches: u64,
    /// `fetch_page` calls that failed.
    pub failed_fetches: u64,
    /// Pages dropped to stay within the residency budget.
    pub evictions: u64,
}

impl StoreStats {
    /// Fraction of reads served without suspension (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Future shared by every caller waiting on one in-flight page fetch.
type SharedFetch<T> = Shared<BoxFuture<'static, std::result::Result<Arc<Vec<T>>, FetchError>>>;

/// State for one in-flight fetch: the shared future plus a single-winner
/// claim bit so exactly one waiter applies the outcome to the maps.
struct FetchState<T> {
    future: SharedFetch<T>,
    finalized: AtomicBool,
}

impl<T> FetchState<T> {
    fn new(future: SharedFetch<T>) -> Self {
        Self {
            future,
            finalized: AtomicBool::new(false),
        }
    }

    /// Returns true for exactly one caller, which installs or discards the
    /// fetched page.
    #[inline]
    fn try_claim(&self) -> bool {
        !self.finalized.swap(true, Ordering::AcqRel)
    }
}

/// Mutable store state: resident pages and in-flight fetch markers.
struct StoreState<T> {
    resident: HashMap<PageNumber, Page<T>>,
    pending: HashMap<PageNumber, Arc<FetchState<T>>>,
}

/// A logically indexable sequence backed by on-demand page fetches.
///
/// Items are copied out (`T: Clone`), so cache bookkeeping can never be
/// bypassed through a shared page; the page's item vector itself is held in
/// an `Arc`, making it free to share one fetch result with all waiters.
///
/// After any completed operation the number of resident pages never exceeds
/// the configured budget.
pub struct PageStore<T> {
    config: StoreConfig,
    count: AtomicU64,
    /// Logical access clock. Monotonic per store, which totally orders
    /// accesses and makes eviction reproducible.
    clock: AtomicU64,
    state: Mutex<StoreState<T>>,
    policy: Box<dyn EvictionPolicy>,
    fetcher: Arc<dyn PageFetcher<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    failed_fetches: AtomicU64,
    evictions: AtomicU64,
}

impl<T> PageStore<T> {
    /// Create a store over `count` logical items served by `fetcher`.
    pub fn new(
        config: StoreConfig,
        count: u64,
        fetcher: impl PageFetcher<T> + 'static,
    ) -> Result<Self> {
        Self::with_policy(config, count, fetcher, LruEviction)
    }

    /// Create a store with a custom eviction policy.
    pub fn with_policy(
        config: StoreConfig,
        count: u64,
        fetcher: impl PageFetcher<T> + 'static,
        policy: impl EvictionPolicy + 'static,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            count: AtomicU64::new(count),
            clock: AtomicU64::new(0),
            state: Mutex::new(StoreState {
                resident: HashMap::new(),
                pending: HashMap::new(),
            }),
            policy: Box::new(policy),
            fetcher: Arc::new(fetcher),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            failed_fetches: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Drop every resident page and every pending-fetch marker.
    ///
    /// Idempotent and synchronous. Call after the underlying data source
    /// changes shape so later reads refetch fresh pages; a fetch completing
    /// after invalidation is discarded instead of installed, though callers
    /// already waiting on it still receive its items.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        let dropped = state.resident.len();
        state.resident.clear();
        state.pending.clear();
        debug!(dropped, "invalidated all resident pages");
    }

    /// Drop one page (and its pending-fetch marker) if present.
    pub fn invalidate(&self, page: PageNumber) {
        let mut state = self.state.lock();
        state.resident.remove(&page);
        state.pending.remove(&page);
    }

    /// Update the logical item count.
    ///
    /// Resident pages are not touched: a caller that shrinks or reorders the
    /// underlying data must call [`invalidate_all`](Self::invalidate_all)
    /// first. Reads are always bounds-checked against the current count
    /// before residency is consulted.
    pub fn set_len(&self, count: u64) {
        self.count.store(count, Ordering::Release);
    }

    /// Logical number of items.
    pub fn len(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the logical sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items per page.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Residency budget, in pages.
    #[inline]
    pub fn max_resident_pages(&self) -> usize {
        self.config.max_resident_pages
    }

    /// Whether `page` is currently materialized.
    pub fn is_resident(&self, page: PageNumber) -> bool {
        self.state.lock().resident.contains_key(&page)
    }

    /// Currently materialized pages, sorted by page number.
    pub fn resident_pages(&self) -> Vec<PageNumber> {
        let state = self.state.lock();
        let mut pages: Vec<PageNumber> = state.resident.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Snapshot of the store counters.
    pub fn stats(&self) -> StoreStats {
        let state = self.state.lock();
        StoreStats {
            resident_pages: state.resident.len(),
            pending_fetches: state.pending.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            failed_fetches: self.failed_fetches.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl<T> PageStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Return the item at `index`, fetching its page if necessary.
    ///
    /// Suspends only when the owning page is not resident. Concurrent calls
    /// for the same missing page share a single fetch and observe the same
    /// result or the same failure. Dropping one caller's future does not
    /// cancel the shared fetch for the others.
    pub async fn get(&self, index: u64) -> Result<T> {
        let count = self.len();
        if index >= count {
            return Err(StoreError::IndexOutOfRange { index, count });
        }

        let page = PageNumber::of_index(index, self.config.page_size);
        let offset = (index % self.config.page_size as u64) as usize;

        let items = self.load_page(page).await?;
        items
            .get(offset)
            .cloned()
            .ok_or_else(|| StoreError::ShortPage {
                page,
                offset,
                len: items.len(),
            })
    }

    /// Materialize the page owning `index` without copying an item out.
    ///
    /// Shares the fetch path of [`get`](Self::get), including the
    /// one-fetch-per-page guarantee.
    pub async fn prefetch(&self, index: u64) -> Result<()> {
        let count = self.len();
        if index >= count {
            return Err(StoreError::IndexOutOfRange { index, count });
        }

        let page = PageNumber::of_index(index, self.config.page_size);
        self.load_page(page).await.map(|_| ())
    }

    /// Resolve a page to its item vector, joining or starting a fetch on a
    /// miss.
    async fn load_page(&self, page: PageNumber) -> Result<Arc<Vec<T>>> {
        let fetch = {
            let mut state = self.state.lock();

            if let Some(resident) = state.resident.get_mut(&page) {
                let stamp = self.tick();
                resident.touch(stamp);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(resident.items()));
            }

            self.misses.fetch_add(1, Ordering::Relaxed);

            match state.pending.get(&page) {
                Some(inflight) => Arc::clone(inflight),
                None => {
                    // Only the future is constructed under the lock; nothing
                    // is polled until the lock is released.
                    let raw = self.fetcher.fetch_page(page, self.config.page_size);
                    let future = async move {
                        match raw.await {
                            Ok(items) => Ok(Arc::new(items)),
                            Err(cause) => Err(FetchError::new(page, cause)),
                        }
                    }
                    .boxed()
                    .shared();

                    let inflight = Arc::new(FetchState::new(future));
                    state.pending.insert(page, Arc::clone(&inflight));
                    self.fetches.fetch_add(1, Ordering::Relaxed);
                    debug!(page = page.raw(), "page fetch started");
                    inflight
                }
            }
        };

        let outcome = fetch.future.clone().await;
        self.finalize(page, &fetch, &outcome);
        outcome.map_err(StoreError::from)
    }

    /// Apply a fetch outcome to the maps.
    ///
    /// Exactly one waiter wins the claim. The page is installed only if its
    /// pending marker survived; invalidation while the fetch was in flight
    /// discards the result.
    fn finalize(
        &self,
        page: PageNumber,
        fetch: &Arc<FetchState<T>>,
        outcome: &std::result::Result<Arc<Vec<T>>, FetchError>,
    ) {
        if !fetch.try_claim() {
            return;
        }

        let mut state = self.state.lock();
        let current = match state.pending.get(&page) {
            Some(inflight) => Arc::ptr_eq(inflight, fetch),
            None => false,
        };
        if current {
            state.pending.remove(&page);
        }

        match outcome {
            Ok(items) if current => {
                let stamp = self.tick();
                let entry = Page::new(page, Arc::clone(items), stamp);
                trace!(page = page.raw(), items = entry.len(), "page installed");
                state.resident.insert(page, entry);
                self.evict_over_budget(&mut state);
            }
            Ok(_) => {
                trace!(page = page.raw(), "fetched page discarded after invalidation");
            }
            Err(err) => {
                self.failed_fetches.fetch_add(1, Ordering::Relaxed);
                debug!(page = page.raw(), error = %err, "page fetch failed");
            }
        }
    }

    /// Drop least-recently-accessed pages until the budget holds again.
    ///
    /// Called with the state lock held, immediately after an insertion, so a
    /// caller never observes an over-budget resident set.
    fn evict_over_budget(&self, state: &mut StoreState<T>) {
        while state.resident.len() > self.config.max_resident_pages {
            let candidates: Vec<(PageNumber, u64)> = state
                .resident
                .values()
                .map(|p| (p.number(), p.last_access()))
                .collect();

            let victim = match self.policy.select_victim(&candidates) {
                Some(victim) => victim,
                None => break,
            };

            state.resident.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            trace!(page = victim.raw(), "page evicted");
        }
    }
}
