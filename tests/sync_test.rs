//! Integration tests for the synchronization primitives
//!
//! Covers the cancellable Mutex and RwMutex, WaitGroup, the Limiter discard
//! protocol, the PriorityQueue, and permit lending to a bound resource pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use prometheus_scheduler::core::{
    Grant, LimitPool, Limiter, Prioritized, PriorityQueue, ResourcePool, SyncError,
};
use prometheus_scheduler::util::Priority;
use prometheus_scheduler::{receive, Context, Mutex, RwMutex, WaitGroup};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn counter_limiter(items: usize) -> Arc<Limiter<usize, usize>> {
    Arc::new(Limiter::new(
        items,
        |n: &usize| *n > 0,
        |n: &mut usize| {
            *n -= 1;
            *n
        },
    ))
}

#[derive(Debug, Clone, PartialEq)]
struct Item(&'static str, i64);

impl Prioritized for Item {
    fn priority(&self) -> Priority {
        Priority(self.1)
    }
}

// ============================================================================
// MUTEX AND RWMUTEX
// ============================================================================

#[test]
fn test_mutex_serializes_threads() {
    let mutex = Arc::new(Mutex::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            let inside = Arc::clone(&inside);
            let total = Arc::clone(&total);
            thread::spawn(move || {
                let ctx = Context::background();
                for _ in 0..50 {
                    mutex.lock(&ctx).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    total.fetch_add(1, Ordering::SeqCst);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    mutex.unlock();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(total.load(Ordering::SeqCst), 400);
    assert!(!mutex.is_locked());
}

#[test]
fn test_mutex_waiter_lends_pool_permit() {
    let pool = Arc::new(LimitPool::new(1));
    let ctx = Context::background().with_pool(pool.clone());
    let mutex = Arc::new(Mutex::for_context(&ctx));
    mutex.lock(&Context::background()).unwrap();

    pool.alloc(&ctx).unwrap();
    assert_eq!(pool.available(), 0);
    let waiter = {
        let mutex = Arc::clone(&mutex);
        let ctx = ctx.clone();
        thread::spawn(move || mutex.lock(&ctx))
    };

    // The blocked locker gives its permit back while it sleeps.
    wait_until("permit lent", || pool.available() == 1);
    mutex.unlock();
    waiter.join().unwrap().unwrap();

    assert!(mutex.is_locked());
    assert_eq!(pool.available(), 0);
    mutex.unlock();
    pool.release(&ctx);
    assert_eq!(pool.available(), 1);
}

#[test]
fn test_rwmutex_cancelled_writer_leaves_readers() {
    let lock = Arc::new(RwMutex::new());
    let ctx = Context::background();
    lock.rlock(&ctx).unwrap();

    let writer_ctx = ctx.child();
    let writer = {
        let lock = Arc::clone(&lock);
        let writer_ctx = writer_ctx.clone();
        thread::spawn(move || lock.lock(&writer_ctx))
    };
    thread::sleep(Duration::from_millis(20));
    writer_ctx.cancel();
    assert_eq!(writer.join().unwrap(), Err(SyncError::Cancelled));

    assert!(lock.try_rlock());
    assert_eq!(lock.readers(), 2);
    lock.runlock();
    lock.runlock();
    assert!(lock.try_lock());
    lock.unlock();
}

#[test]
fn test_rwmutex_writer_excludes_readers() {
    let lock = Arc::new(RwMutex::new());
    let ctx = Context::background();
    lock.lock(&ctx).unwrap();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.rlock(&Context::background()).unwrap();
            })
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(lock.readers(), 0);

    lock.unlock();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(lock.readers(), 3);
    assert!(!lock.try_lock());
}

// ============================================================================
// WAIT GROUP
// ============================================================================

#[test]
fn test_wait_group_waits_for_all_workers() {
    let group = Arc::new(WaitGroup::new());
    let finished = Arc::new(AtomicUsize::new(0));
    group.add(4);
    for n in 0..4 {
        let group = Arc::clone(&group);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5 * n));
            finished.fetch_add(1, Ordering::SeqCst);
            group.done();
        });
    }
    group.wait(&Context::background()).unwrap();
    assert_eq!(finished.load(Ordering::SeqCst), 4);
    assert_eq!(group.count(), 0);
}

// ============================================================================
// LIMITER AND QUEUE
// ============================================================================

#[test]
fn test_limiter_discard_retires_exactly_one_request() {
    let limiter = counter_limiter(0);
    let requests: Vec<_> = (0..3)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || limiter.request(&Context::background()).unwrap())
        })
        .collect();
    wait_until("requests blocked", || limiter.has_waiting());
    thread::sleep(Duration::from_millis(20));

    limiter.discard(&Context::background()).unwrap();
    {
        let mut guard = limiter.lock();
        guard.value().items += 2;
        guard.signal_all();
    }

    let grants: Vec<Grant<usize>> = requests.into_iter().map(|h| h.join().unwrap()).collect();
    let discarded = grants.iter().filter(|g| **g == Grant::Discarded).count();
    assert_eq!(discarded, 1);
    assert!(!limiter.has_discarded());
}

#[test]
fn test_cancelled_discard_and_request_settle_one_retirement() {
    for round in 0..40 {
        let limiter = counter_limiter(1);
        let ctx = Context::background();
        let discarder = {
            let limiter = Arc::clone(&limiter);
            let ctx = ctx.clone();
            thread::spawn(move || limiter.discard(&ctx))
        };
        wait_until("discard pending", || limiter.has_discarded());

        let canceller = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                if round % 2 == 0 {
                    thread::yield_now();
                }
                ctx.cancel();
            })
        };
        let grant = limiter.request(&Context::background()).unwrap();
        canceller.join().unwrap();
        let discarded = discarder.join().unwrap();

        // Either the discard retired this request, or it was withdrawn.
        assert_eq!(discarded.is_ok(), grant == Grant::Discarded, "round {round}");
        assert!(!limiter.has_discarded(), "round {round}");
    }
}

#[test]
fn test_queue_serves_blocked_consumers() {
    let queue = Arc::new(PriorityQueue::<Item>::new());
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let ctx = Context::background();
            let mut taken = Vec::new();
            while let Some(item) = queue.get(&ctx).unwrap() {
                taken.push(item);
            }
            taken
        })
    };
    wait_until("consumer blocked", || queue.has_waiting());

    queue.add(Item("first", 0));
    wait_until("first taken", || queue.is_empty());
    queue.discard(&Context::background()).unwrap();

    assert_eq!(consumer.join().unwrap(), vec![Item("first", 0)]);
    assert!(!queue.has_discarded());
}

#[test]
fn test_queue_remove_and_snapshot() {
    let queue = PriorityQueue::new();
    queue.add(Item("low", 1));
    queue.add(Item("high", 9));
    queue.add(Item("mid", 5));
    assert!(queue.remove(&Item("mid", 5)));
    assert!(!queue.remove(&Item("mid", 5)));
    assert_eq!(queue.snapshot(), vec![Item("high", 9), Item("low", 1)]);
    assert_eq!(queue.try_get(), Some(Item("high", 9)));
    assert_eq!(queue.len(), 1);
}

// ============================================================================
// CHANNEL HELPERS
// ============================================================================

#[test]
fn test_receive_cancelled() {
    let (_tx, rx) = crossbeam_channel::unbounded::<u32>();
    let ctx = Context::background();
    let waiter = {
        let ctx = ctx.clone();
        thread::spawn(move || receive(&ctx, &rx))
    };
    thread::sleep(Duration::from_millis(10));
    ctx.cancel();
    assert_eq!(waiter.join().unwrap(), Err(SyncError::Cancelled));
}
