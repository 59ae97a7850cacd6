//! Permit pools.
//!
//! A [`ResourcePool`] hands out permits. Blocking primitives bound to a pool
//! release the caller's permit before sleeping and allocate one again before
//! resuming, so threads parked on application-level synchronization do not
//! count against the pool's limit.

use std::fmt;

use crate::context::Context;
use crate::core::error::SyncError;
use crate::monitor::Monitor;

/// A source of permits.
pub trait ResourcePool: Send + Sync {
    /// Acquire a permit, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled while waiting.
    fn alloc(&self, ctx: &Context) -> Result<(), SyncError>;

    /// Give a permit back.
    fn release(&self, ctx: &Context);
}

/// Receives reports about the execution slot of the current holder.
pub trait Activity: Send + Sync {
    /// The holder waits to regain a slot.
    fn ready(&self);
    /// The holder owns a slot again.
    fn running(&self);
    /// The holder gave its slot away while blocking.
    fn blocked(&self);
}

/// Pool with unlimited permits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPool;

impl ResourcePool for DefaultPool {
    fn alloc(&self, _ctx: &Context) -> Result<(), SyncError> {
        Ok(())
    }

    fn release(&self, _ctx: &Context) {}
}

#[derive(Debug, Clone, Copy)]
struct Permits {
    limit: usize,
    available: usize,
}

/// Counting pool with an adjustable limit.
///
/// Invariant: `0 <= available <= limit`. Permits released while somebody
/// waits are handed to the oldest waiter directly.
pub struct LimitPool {
    monitor: Monitor<Permits>,
}

impl LimitPool {
    /// Create a pool with `limit` free permits.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            monitor: Monitor::new(Permits {
                limit,
                available: limit,
            }),
        }
    }

    /// Current limit.
    pub fn limit(&self) -> usize {
        self.monitor.lock().value().limit
    }

    /// Currently free permits.
    pub fn available(&self) -> usize {
        self.monitor.lock().value().available
    }

    /// Raise the limit by one and make the new permit available.
    pub fn inc(&self) {
        let mut guard = self.monitor.lock();
        guard.value().limit += 1;
        if guard.has_waiting() {
            guard.signal();
        } else {
            guard.value().available += 1;
        }
    }

    /// Retire one permit, waiting for it to become free.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PoolEmpty`] if the limit is already zero, or
    /// [`SyncError::Cancelled`] if `ctx` is cancelled while waiting.
    pub fn dec(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        if guard.value().limit == 0 {
            return Err(SyncError::PoolEmpty);
        }
        if guard.value().available > 0 {
            guard.value().available -= 1;
        } else {
            guard.wait(ctx)?;
        }
        guard.value().limit -= 1;
        Ok(())
    }

    /// Retire one free permit without blocking.
    pub fn try_dec(&self) -> bool {
        let mut guard = self.monitor.lock();
        let mut permits = guard.value();
        if permits.limit == 0 || permits.available == 0 {
            return false;
        }
        permits.available -= 1;
        permits.limit -= 1;
        true
    }
}

impl ResourcePool for LimitPool {
    fn alloc(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        if guard.value().available > 0 {
            guard.value().available -= 1;
            return Ok(());
        }
        guard.wait(ctx)
    }

    fn release(&self, _ctx: &Context) {
        let mut guard = self.monitor.lock();
        if guard.has_waiting() {
            guard.signal();
            return;
        }
        let mut permits = guard.value();
        assert!(permits.available < permits.limit, "release exceeds limit");
        permits.available += 1;
    }
}

impl fmt::Debug for LimitPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let permits = *self.monitor.lock().value();
        f.debug_struct("LimitPool")
            .field("limit", &permits.limit)
            .field("available", &permits.available)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_alloc_and_release() {
        let pool = LimitPool::new(2);
        let ctx = Context::background();
        pool.alloc(&ctx).unwrap();
        pool.alloc(&ctx).unwrap();
        assert_eq!(pool.available(), 0);
        pool.release(&ctx);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.limit(), 2);
    }

    #[test]
    #[should_panic(expected = "release exceeds limit")]
    fn test_release_above_limit_panics() {
        let pool = LimitPool::new(1);
        pool.release(&Context::background());
    }

    #[test]
    fn test_dec_on_empty_pool_fails() {
        let pool = LimitPool::new(0);
        assert_eq!(pool.dec(&Context::background()), Err(SyncError::PoolEmpty));
        assert!(!pool.try_dec());
    }

    #[test]
    fn test_release_hands_permit_to_waiter() {
        let pool = Arc::new(LimitPool::new(1));
        let ctx = Context::background();
        pool.alloc(&ctx).unwrap();

        let p = Arc::clone(&pool);
        let handle = thread::spawn(move || p.alloc(&Context::background()));
        while !pool.monitor.lock().has_waiting() {
            thread::sleep(Duration::from_millis(1));
        }
        pool.release(&ctx);
        handle.join().unwrap().unwrap();
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_dec_waits_for_release() {
        let pool = Arc::new(LimitPool::new(1));
        let ctx = Context::background();
        pool.alloc(&ctx).unwrap();

        let p = Arc::clone(&pool);
        let handle = thread::spawn(move || p.dec(&Context::background()));
        while !pool.monitor.lock().has_waiting() {
            thread::sleep(Duration::from_millis(1));
        }
        pool.release(&ctx);
        handle.join().unwrap().unwrap();
        assert_eq!(pool.limit(), 0);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_inc_grows_limit() {
        let pool = LimitPool::new(0);
        pool.inc();
        assert_eq!(pool.limit(), 1);
        assert_eq!(pool.available(), 1);
        assert!(pool.try_dec());
        assert_eq!(pool.limit(), 0);
    }

    #[test]
    fn test_cancelled_alloc_returns_error() {
        let pool = Arc::new(LimitPool::new(0));
        let ctx = Context::background();
        let p = Arc::clone(&pool);
        let c = ctx.clone();
        let handle = thread::spawn(move || p.alloc(&c));
        while !pool.monitor.lock().has_waiting() {
            thread::sleep(Duration::from_millis(1));
        }
        ctx.cancel();
        assert_eq!(handle.join().unwrap(), Err(SyncError::Cancelled));
    }
}
