//! Cancellable reader-writer lock built on [`Monitor`].
//!
//! Any number of readers or a single writer may hold the lock. Releasing a
//! write lock, or the last read lock, hands the monitor to the oldest waiter.
//! A reader that is woken passes the hand-off on, so a queue of readers is
//! admitted together.
//!
//! # Examples
//!
//! ```
//! use prometheus_scheduler::{Context, RwMutex};
//!
//! let ctx = Context::background();
//! let lock = RwMutex::new();
//!
//! lock.rlock(&ctx).unwrap();
//! lock.rlock(&ctx).unwrap();
//! assert!(!lock.try_lock());
//! lock.runlock();
//! lock.runlock();
//!
//! lock.lock(&ctx).unwrap();
//! assert!(!lock.try_rlock());
//! lock.unlock();
//! ```

use std::fmt;

use crate::context::Context;
use crate::core::error::SyncError;
use crate::monitor::Monitor;

#[derive(Debug, Default, Clone, Copy)]
struct Holders {
    locked: bool,
    readers: usize,
}

/// Reader-writer lock with cancellable acquisition.
pub struct RwMutex {
    monitor: Monitor<Holders>,
}

impl RwMutex {
    /// Create an unlocked reader-writer lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            monitor: Monitor::new(Holders::default()),
        }
    }

    /// Create a lock whose waiters lend the pool permit of `ctx`.
    #[must_use]
    pub fn for_context(ctx: &Context) -> Self {
        Self {
            monitor: Monitor::for_context(Holders::default(), ctx),
        }
    }

    /// Acquire the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled first.
    pub fn lock(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        loop {
            let holders = *guard.value();
            if !holders.locked && holders.readers == 0 {
                break;
            }
            guard.wait(ctx)?;
        }
        guard.value().locked = true;
        Ok(())
    }

    /// Acquire the write lock if nobody holds the lock.
    pub fn try_lock(&self) -> bool {
        let mut guard = self.monitor.lock();
        let mut holders = guard.value();
        if holders.locked || holders.readers > 0 {
            return false;
        }
        holders.locked = true;
        true
    }

    /// Release the write lock.
    ///
    /// # Panics
    ///
    /// Panics if the write lock is not held.
    pub fn unlock(&self) {
        let mut guard = self.monitor.lock();
        assert!(guard.value().locked, "unlocking unlocked rwmutex");
        guard.value().locked = false;
        guard.signal();
    }

    /// Acquire a read lock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled first.
    pub fn rlock(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        let mut woken = false;
        while guard.value().locked {
            guard.wait(ctx)?;
            woken = true;
        }
        guard.value().readers += 1;
        if woken && guard.has_waiting() {
            guard.signal();
        }
        Ok(())
    }

    /// Acquire a read lock if no writer holds the lock.
    pub fn try_rlock(&self) -> bool {
        let mut guard = self.monitor.lock();
        let mut holders = guard.value();
        if holders.locked {
            return false;
        }
        holders.readers += 1;
        true
    }

    /// Release a read lock.
    ///
    /// # Panics
    ///
    /// Panics if no read lock is held.
    pub fn runlock(&self) {
        let mut guard = self.monitor.lock();
        assert!(guard.value().readers > 0, "unlocking unlocked rwmutex");
        guard.value().readers -= 1;
        if guard.value().readers == 0 {
            guard.signal();
        }
    }

    /// Number of active readers.
    pub fn readers(&self) -> usize {
        self.monitor.lock().value().readers
    }
}

impl Default for RwMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RwMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let holders = *self.monitor.lock().value();
        f.debug_struct("RwMutex")
            .field("locked", &holders.locked)
            .field("readers", &holders.readers)
            .finish()
    }
}
