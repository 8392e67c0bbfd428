//! Eviction policy for resident pages
//!
//! The store consults a policy whenever an insertion pushes it over its
//! residency budget. The default is least-recently-accessed with a
//! deterministic tie-break.

use crate::page::PageNumber;

/// Chooses which resident page to drop when the store is over budget.
pub trait EvictionPolicy: Send + Sync {
    /// Pick a victim among `(page, last_access)` candidates.
    ///
    /// Returns `None` only when `candidates` is empty.
    fn select_victim(&self, candidates: &[(PageNumber, u64)]) -> Option<PageNumber>;
}

/// Least-recently-accessed eviction with a deterministic tie-break.
///
/// The page with the oldest access stamp loses; among pages with equal
/// stamps the lowest page number loses, so a fixed access sequence always
/// reproduces the same resident set.
#[derive(Debug, Default, Clone, Copy)]
pub struct LruEviction;

impl EvictionPolicy for LruEviction {
    fn select_victim(&self, candidates: &[(PageNumber, u64)]) -> Option<PageNumber> {
        candidates
            .iter()
            .min_by_key(|(page, stamp)| (*stamp, *page))
            .map(|(page, _)| *page)
    }
}
