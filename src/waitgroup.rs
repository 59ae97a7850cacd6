//! Cancellable, pool-aware wait group.

use std::fmt;

use crate::context::Context;
use crate::core::error::SyncError;
use crate::monitor::Monitor;

/// Counter that lets callers wait for it to drop to zero.
///
/// A waiter whose context carries a resource pool lends its permit to the
/// pool while it waits.
pub struct WaitGroup {
    monitor: Monitor<usize>,
}

impl WaitGroup {
    /// Create a wait group with count zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_count(0)
    }

    /// Create a wait group with an initial count.
    #[must_use]
    pub fn with_count(count: usize) -> Self {
        Self {
            monitor: Monitor::new(count),
        }
    }

    /// Adjust the counter by `delta`, waking all waiters when it reaches zero.
    ///
    /// # Panics
    ///
    /// Panics if the counter would become negative.
    pub fn add(&self, delta: isize) {
        let mut guard = self.monitor.lock();
        let count = *guard.value();
        let next = count
            .checked_add_signed(delta)
            .unwrap_or_else(|| panic!("negative wait group count"));
        *guard.value() = next;
        if next == 0 {
            guard.signal_all();
        }
    }

    /// Decrement the counter by one.
    pub fn done(&self) {
        self.add(-1);
    }

    /// Current count.
    pub fn count(&self) -> usize {
        *self.monitor.lock().value()
    }

    /// Block until the counter is zero.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled first.
    pub fn wait(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        while *guard.value() > 0 {
            match ctx.pool() {
                Some(pool) => guard.wait_lending(ctx, pool.as_ref())?,
                None => guard.wait(ctx)?,
            }
        }
        Ok(())
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WaitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitGroup")
            .field("count", &self.count())
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
    fn test_wait_on_zero_returns() {
        let wg = WaitGroup::new();
        wg.wait(&Context::background()).unwrap();
    }

    #[test]
    fn test_wait_until_done() {
        let wg = Arc::new(WaitGroup::with_count(3));
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let wg = Arc::clone(&wg);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * i));
                    wg.done();
                })
            })
            .collect();
        wg.wait(&Context::background()).unwrap();
        assert_eq!(wg.count(), 0);
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_wait_cancelled() {
        let wg = Arc::new(WaitGroup::with_count(1));
        let ctx = Context::background();
        let w = Arc::clone(&wg);
        let c = ctx.clone();
        let handle = thread::spawn(move || w.wait(&c));
        thread::sleep(Duration::from_millis(20));
        ctx.cancel();
        assert_eq!(handle.join().unwrap(), Err(SyncError::Cancelled));
    }

    #[test]
    #[should_panic(expected = "negative wait group count")]
    fn test_negative_count_panics() {
        WaitGroup::new().done();
    }
}
