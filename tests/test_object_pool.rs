//! Integration tests for ObjectPool: free-list bounds, reset discipline,
//! and safety under concurrent use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use pagevec::ObjectPool;

#[derive(Debug, Default)]
struct Record {
    id: u64,
    payload: Vec<u8>,
}

// ===========================================================================
// 1. Free list fills on return and recycles on get
// ===========================================================================
#[test]
fn returns_fill_free_list_until_capacity() {
    let pool: ObjectPool<Record> = ObjectPool::with_default(2);

    let a = pool.get();
    let b = pool.get();
    assert_eq!(pool.free_len(), 0, "fresh gets build new instances");

    pool.put(a);
    pool.put(b);
    assert_eq!(pool.free_len(), 2);

    // One slot frees up, then an extra return beyond capacity is dropped.
    let _reused = pool.get();
    assert_eq!(pool.free_len(), 1);
    pool.put(Record::default());
    assert_eq!(pool.free_len(), 2);
    pool.put(Record::default());
    assert_eq!(pool.free_len(), 2, "free list never exceeds capacity");
    assert_eq!(pool.stats().discarded, 1);
}

// ===========================================================================
// 2. Reset runs exactly once between return and reuse
// ===========================================================================
#[test]
fn reset_applied_exactly_once_per_accepted_return() {
    let resets = Arc::new(AtomicU64::new(0));
    let resets_in = Arc::clone(&resets);

    let pool: ObjectPool<Record> = ObjectPool::new(4, Record::default).with_reset(move |r| {
        resets_in.fetch_add(1, Ordering::SeqCst);
        r.id = 0;
        r.payload.clear();
    });

    let mut item = pool.get();
    item.id = 42;
    item.payload.extend_from_slice(b"scratch");
    assert_eq!(resets.load(Ordering::SeqCst), 0, "get never resets");

    pool.put(item);
    assert_eq!(resets.load(Ordering::SeqCst), 1, "put resets once");

    let recycled = pool.get();
    assert_eq!(resets.load(Ordering::SeqCst), 1, "reuse does not reset again");
    assert_eq!(recycled.id, 0);
    assert!(recycled.payload.is_empty(), "no state leaks across a recycle");
}

// ===========================================================================
// 3. Discarded returns are not reset
// ===========================================================================
#[test]
fn overflow_returns_are_dropped_without_reset() {
    let resets = Arc::new(AtomicU64::new(0));
    let resets_in = Arc::clone(&resets);

    let pool: ObjectPool<Record> = ObjectPool::new(1, Record::default)
        .with_reset(move |_| {
            resets_in.fetch_add(1, Ordering::SeqCst);
        });

    pool.put(Record::default());
    pool.put(Record::default());

    assert_eq!(pool.free_len(), 1);
    assert_eq!(resets.load(Ordering::SeqCst), 1, "only the retained return resets");
}

// ===========================================================================
// 4. Zero capacity means every get allocates and every put drops
// ===========================================================================
#[test]
fn zero_capacity_pool_never_retains() {
    let pool: ObjectPool<Record> = ObjectPool::with_default(0);

    for _ in 0..5 {
        pool.put(pool.get());
    }

    assert_eq!(pool.free_len(), 0);
    assert_eq!(pool.stats().misses, 5);
    assert_eq!(pool.stats().hits, 0);
    assert_eq!(pool.stats().discarded, 5);
}

// ===========================================================================
// 5. Checkout guard returns its instance automatically
// ===========================================================================
#[test]
fn checkout_guard_round_trips() {
    let pool: ObjectPool<Record> = ObjectPool::with_default(4);

    {
        let mut guard = pool.checkout();
        guard.id = 7;
        guard.payload.push(1);
    }
    assert_eq!(pool.free_len(), 1, "dropped guard returns to the pool");

    let kept = pool.checkout().detach();
    assert_eq!(pool.free_len(), 0);
    assert_eq!(kept.id, 7, "no reset configured, state survives the recycle");
}

// ===========================================================================
// 6. Free list stays bounded under concurrent churn
// ===========================================================================
#[test]
fn concurrent_churn_respects_capacity() {
    let pool: Arc<ObjectPool<Record>> = Arc::new(ObjectPool::with_default(4));

    let mut workers = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        workers.push(thread::spawn(move || {
            for _ in 0..1000 {
                let item = pool.get();
                pool.put(item);
            }
        }));
    }

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(
        pool.free_len() <= 4,
        "free list exceeded capacity under concurrent use"
    );

    let stats = pool.stats();
    assert_eq!(stats.hits + stats.misses, 8000);
}
