//! Cancellable mutex built on [`Monitor`].
//!
//! Unlike `parking_lot::Mutex` this lock is not tied to a scope: it is
//! acquired with a [`Context`] that can abort the wait, and released
//! explicitly. Releasing hands ownership to the oldest waiter.
//!
//! When created for a context carrying a resource pool, a blocked locker
//! lends its permit to the pool until it gets the lock.
//!
//! # Examples
//!
//! ```
//! use prometheus_scheduler::{Context, Mutex};
//!
//! let ctx = Context::background();
//! let mutex = Mutex::new();
//! mutex.lock(&ctx).unwrap();
//! assert!(!mutex.try_lock());
//! mutex.unlock();
//! assert!(mutex.try_lock());
//! ```

use std::fmt;

use crate::context::Context;
use crate::core::error::SyncError;
use crate::monitor::Monitor;

/// Mutual exclusion lock with cancellable acquisition.
pub struct Mutex {
    monitor: Monitor<bool>,
}

impl Mutex {
    /// Create an unlocked mutex.
    #[must_use]
    pub fn new() -> Self {
        Self {
            monitor: Monitor::new(false),
        }
    }

    /// Create an unlocked mutex whose waiters lend the pool permit of `ctx`.
    #[must_use]
    pub fn for_context(ctx: &Context) -> Self {
        Self {
            monitor: Monitor::for_context(false, ctx),
        }
    }

    /// Acquire the lock, blocking until it is free or `ctx` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled first.
    pub fn lock(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        while *guard.value() {
            guard.wait(ctx)?;
        }
        *guard.value() = true;
        Ok(())
    }

    /// Acquire the lock if it is free.
    pub fn try_lock(&self) -> bool {
        let mut guard = self.monitor.lock();
        let mut locked = guard.value();
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    /// Release the lock.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is not locked.
    pub fn unlock(&self) {
        let mut guard = self.monitor.lock();
        assert!(*guard.value(), "mutex not locked");
        *guard.value() = false;
        guard.signal();
    }

    /// Whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        *self.monitor.lock().value()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}
