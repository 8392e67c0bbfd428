//! Bounded object pool for recycling short-lived mutable records
//!
//! A LIFO free list behind a mutex: [`ObjectPool::get`] pops a recycled
//! instance or builds a fresh one, [`ObjectPool::put`] resets and retains
//! the instance unless the free list is full, in which case it is dropped
//! to bound memory.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

type Generator<T> = Box<dyn Fn() -> T + Send + Sync>;
type Reset<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// A bounded free list of reusable instances.
///
/// The pool does not track checked-out objects: callers either hand them
/// back with [`put`](Self::put) (or by dropping a [`PooledItem`]) or simply
/// drop them, in which case the pool never sees them again.
///
/// Pools are plain owned values; share one across tasks by wrapping it in an
/// `Arc` and passing the handle to whoever needs it.
pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
    generator: Generator<T>,
    reset: Option<Reset<T>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

impl<T> ObjectPool<T> {
    /// Create a pool retaining at most `max_size` free instances.
    ///
    /// A `max_size` of 0 disables retention entirely: every `get` builds a
    /// fresh instance and every `put` drops its argument.
    pub fn new(max_size: usize, generator: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_size)),
            generator: Box::new(generator),
            reset: None,
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Install a reset applied to every instance accepted back by `put`.
    ///
    /// Without one, recycled instances keep their previous state and the
    /// caller must overwrite every field before use. The reset runs under
    /// the pool's lock and must not call back into the pool.
    pub fn with_reset(mut self, reset: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.reset = Some(Box::new(reset));
        self
    }

    /// Take a recycled instance, or build a fresh one if none is free.
    pub fn get(&self) -> T {
        let recycled = self.free.lock().pop();
        match recycled {
            Some(item) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                (self.generator)()
            }
        }
    }

    /// Take an instance wrapped in a guard that returns it on drop.
    pub fn checkout(&self) -> PooledItem<'_, T> {
        PooledItem {
            pool: self,
            item: Some(self.get()),
        }
    }

    /// Hand an instance back to the pool.
    ///
    /// If the free list is already at capacity the instance is dropped
    /// without being reset; otherwise it is reset (when a reset is
    /// installed) and retained for reuse.
    pub fn put(&self, mut item: T) {
        let mut free = self.free.lock();
        if free.len() >= self.max_size {
            drop(free);
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if let Some(reset) = &self.reset {
            reset(&mut item);
        }
        free.push(item);
    }

    /// Drop every retained instance. Idempotent.
    pub fn clear(&self) {
        self.free.lock().clear();
    }

    /// Number of instances currently retained.
    pub fn free_len(&self) -> usize {
        self.free.lock().len()
    }

    /// Whether the free list is empty.
    pub fn is_empty(&self) -> bool {
        self.free.lock().is_empty()
    }

    /// Maximum number of retained instances.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free: self.free_len(),
            capacity: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

impl<T: Default + 'static> ObjectPool<T> {
    /// Pool whose generator is `T::default`.
    pub fn with_default(max_size: usize) -> Self {
        Self::new(max_size, T::default)
    }
}

/// RAII guard that returns its instance to the pool on drop.
///
/// Derefs to the payload; use [`detach`](Self::detach) to keep the instance
/// and bypass the return.
pub struct PooledItem<'a, T> {
    pool: &'a ObjectPool<T>,
    item: Option<T>,
}

impl<T> PooledItem<'_, T> {
    /// Take ownership of the instance; it will not be returned to the pool.
    pub fn detach(mut self) -> T {
        self.item.take().expect("item present until detach")
    }
}

impl<T> Deref for PooledItem<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("item present until detach")
    }
}

impl<T> DerefMut for PooledItem<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("item present until detach")
    }
}

impl<T> Drop for PooledItem<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

/// Counters describing pool behavior since construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    /// Instances currently retained in the free list.
    pub free: usize,
    /// Maximum retained instances.
    pub capacity: usize,
    /// `get` calls served from the free list.
    pub hits: u64,
    /// `get` calls that built a fresh instance.
    pub misses: u64,
    /// Returned instances dropped because the free list was full.
    pub discarded: u64,
}

impl PoolStats {
    /// Fraction of `get` calls served from the free list (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Scratch {
        value: u64,
        label: String,
    }

    fn scratch_pool(max_size: usize) -> ObjectPool<Scratch> {
        ObjectPool::new(max_size, Scratch::default).with_reset(|s| {
            s.value = 0;
            s.label.clear();
        })
    }

    #[test]
    fn test_get_recycles_lifo() {
        let pool = scratch_pool(4);

        let a = pool.get();
        let b = pool.get();
        assert_eq!(pool.stats().misses, 2);

        pool.put(a);
        pool.put(b);
        assert_eq!(pool.free_len(), 2);

        let _again = pool.get();
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.free_len(), 1);
    }

    #[test]
    fn test_put_beyond_capacity_discards() {
        let pool = scratch_pool(2);

        pool.put(Scratch::default());
        pool.put(Scratch::default());
        pool.put(Scratch::default());

        assert_eq!(pool.free_len(), 2);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn test_reset_clears_state_on_return() {
        let pool = scratch_pool(2);

        let mut item = pool.get();
        item.value = 99;
        item.label = "dirty".to_string();
        pool.put(item);

        let recycled = pool.get();
        assert_eq!(recycled, Scratch::default());
    }

    #[test]
    fn test_zero_capacity_disables_retention() {
        let pool = scratch_pool(0);

        pool.put(Scratch::default());
        assert_eq!(pool.free_len(), 0);
        assert_eq!(pool.stats().discarded, 1);

        let _item = pool.get();
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn test_clear_empties_free_list() {
        let pool = scratch_pool(4);

        pool.put(Scratch::default());
        pool.put(Scratch::default());
        assert_eq!(pool.free_len(), 2);

        pool.clear();
        pool.clear(); // idempotent
        assert!(pool.is_empty());
    }

    #[test]
    fn test_checkout_returns_on_drop() {
        let pool = scratch_pool(4);

        {
            let mut item = pool.checkout();
            item.value = 7;
        }
        assert_eq!(pool.free_len(), 1);

        let detached = pool.checkout().detach();
        assert_eq!(pool.free_len(), 0);
        drop(detached);
        assert_eq!(pool.free_len(), 0);
    }

    #[test]
    fn test_with_default_generator() {
        let pool: ObjectPool<Vec<u8>> = ObjectPool::with_default(2);
        assert!(pool.get().is_empty());
    }

    #[test]
    fn test_stats_hit_rate() {
        let pool = scratch_pool(2);
        pool.put(pool.get());
        pool.get();

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
