//! Monitor with FIFO waiting lists and lock hand-off.
//!
//! A [`Monitor`] is a lock around a value plus a FIFO list of waiters. The
//! lock is *logical*: ownership is represented by a [`MonitorGuard`] and can be
//! handed directly to a woken waiter by [`MonitorGuard::signal`], so the waiter
//! resumes as the owner without re-contending for the lock.
//!
//! Each waiter parks on its own single-use channel. Cancellation races are
//! settled under the waiting-list lock: a waiter whose slot has already been
//! claimed by a signal ignores the cancellation and proceeds as signalled.
//!
//! A monitor may be bound to a [`ResourcePool`]. Waiting then lends the
//! caller's permit to the pool while it sleeps and allocates a permit again
//! before the caller resumes ownership. Neither lending nor allocation runs
//! under the monitor: the waiter is registered and the monitor unlocked before
//! the permit is lent, and allocation, which may block, happens after waking.
//! Pool-bound waiters therefore re-acquire the lock after waking and must
//! re-check their predicate.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, MappedMutexGuard, Mutex, MutexGuard};

use crate::context::Context;
use crate::core::error::SyncError;
use crate::core::resource_pool::ResourcePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wakeup {
    /// Lock ownership travels with the wakeup.
    Handoff,
    /// The waiter must acquire the lock itself.
    Reacquire,
}

struct Slot {
    tx: Sender<Wakeup>,
    rx: Receiver<Wakeup>,
    /// Whether the waiter accepts lock ownership with the wakeup.
    handoff: bool,
}

impl Slot {
    fn new(handoff: bool) -> Arc<Self> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Arc::new(Self { tx, rx, handoff })
    }
}

/// FIFO list of parked waiters.
///
/// Every monitor owns one list; additional lists can be attached to the same
/// monitor to wait for different predicates.
#[derive(Default)]
pub struct Waiting {
    slots: Mutex<VecDeque<Arc<Slot>>>,
}

impl Waiting {
    /// Create an empty waiting list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether somebody waits on this list.
    #[must_use]
    pub fn has_waiting(&self) -> bool {
        !self.slots.lock().is_empty()
    }

    /// Number of parked waiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_waiting()
    }

    /// Park on this list, releasing the monitor held by `guard`.
    ///
    /// Returns with the monitor owned again, whether signalled or cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` was cancelled before a signal
    /// claimed the waiter.
    pub fn wait<T>(&self, guard: &mut MonitorGuard<'_, T>, ctx: &Context) -> Result<(), SyncError> {
        self.park(guard.monitor, ctx)
    }

    /// Hand the monitor held by `guard` to the oldest waiter.
    ///
    /// Returns `false` and simply unlocks if nobody waits.
    pub fn signal<T>(&self, mut guard: MonitorGuard<'_, T>) -> bool {
        guard.owned = false;
        match self.wake_one() {
            Some(Wakeup::Handoff) => true,
            Some(Wakeup::Reacquire) => {
                guard.monitor.release();
                true
            }
            None => {
                guard.monitor.release();
                false
            }
        }
    }

    /// Wake every waiter and unlock. Woken waiters re-acquire the monitor one by one.
    pub fn signal_all<T>(&self, guard: MonitorGuard<'_, T>) -> bool {
        let woken = self.wake_all();
        drop(guard);
        woken > 0
    }

    fn park<T>(&self, monitor: &Monitor<T>, ctx: &Context) -> Result<(), SyncError> {
        let slot = self.enqueue(monitor, true);
        self.sleep(monitor, &slot, ctx)
    }

    /// Register a slot and unlock. Signals from here on reach the slot.
    fn enqueue<T>(&self, monitor: &Monitor<T>, handoff: bool) -> Arc<Slot> {
        let slot = Slot::new(handoff);
        self.slots.lock().push_back(Arc::clone(&slot));
        monitor.release();
        slot
    }

    fn sleep<T>(&self, monitor: &Monitor<T>, slot: &Arc<Slot>, ctx: &Context) -> Result<(), SyncError> {
        crossbeam_channel::select! {
            recv(slot.rx) -> wakeup => {
                Self::resume(monitor, wakeup.unwrap_or(Wakeup::Reacquire));
                Ok(())
            }
            recv(ctx.done()) -> _ => {
                if self.withdraw(slot) {
                    monitor.acquire();
                    Err(SyncError::Cancelled)
                } else {
                    // A signal claimed the slot first; its wakeup is already queued.
                    let wakeup = slot.rx.recv().unwrap_or(Wakeup::Reacquire);
                    Self::resume(monitor, wakeup);
                    Ok(())
                }
            }
        }
    }

    fn resume<T>(monitor: &Monitor<T>, wakeup: Wakeup) {
        if wakeup == Wakeup::Reacquire {
            monitor.acquire();
        }
    }

    fn withdraw(&self, slot: &Arc<Slot>) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter().position(|s| Arc::ptr_eq(s, slot)) {
            Some(index) => {
                slots.remove(index);
                true
            }
            None => false,
        }
    }

    fn wake_one(&self) -> Option<Wakeup> {
        let slot = self.slots.lock().pop_front()?;
        let wakeup = if slot.handoff {
            Wakeup::Handoff
        } else {
            Wakeup::Reacquire
        };
        // Capacity one and a single send per slot: never blocks.
        let _ = slot.tx.send(wakeup);
        Some(wakeup)
    }

    fn wake_all(&self) -> usize {
        let mut slots = self.slots.lock();
        let count = slots.len();
        for slot in slots.drain(..) {
            let _ = slot.tx.send(Wakeup::Reacquire);
        }
        count
    }
}

struct Guarded<T> {
    locked: bool,
    value: T,
}

/// Lock around a value with a FIFO waiting list supporting hand-off.
pub struct Monitor<T = ()> {
    state: Mutex<Guarded<T>>,
    unlocked: Condvar,
    waiting: Waiting,
    pool: Option<Arc<dyn ResourcePool>>,
}

impl<T> Monitor<T> {
    /// Create a monitor protecting `value`.
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(Guarded {
                locked: false,
                value,
            }),
            unlocked: Condvar::new(),
            waiting: Waiting::new(),
            pool: None,
        }
    }

    /// Create a monitor whose waiters lend their permit to `pool` while sleeping.
    pub fn with_pool(value: T, pool: Arc<dyn ResourcePool>) -> Self {
        Self {
            pool: Some(pool),
            ..Self::new(value)
        }
    }

    /// Create a monitor bound to the pool of `ctx`, if any.
    pub fn for_context(value: T, ctx: &Context) -> Self {
        match ctx.pool() {
            Some(pool) => Self::with_pool(value, Arc::clone(pool)),
            None => Self::new(value),
        }
    }

    /// Acquire the monitor, blocking until it is free.
    pub fn lock(&self) -> MonitorGuard<'_, T> {
        self.acquire();
        MonitorGuard {
            monitor: self,
            owned: true,
        }
    }

    /// Acquire the monitor if it is free.
    pub fn try_lock(&self) -> Option<MonitorGuard<'_, T>> {
        let mut state = self.state.lock();
        if state.locked {
            return None;
        }
        state.locked = true;
        drop(state);
        Some(MonitorGuard {
            monitor: self,
            owned: true,
        })
    }

    /// The resource pool this monitor lends permits to.
    pub fn pool(&self) -> Option<&Arc<dyn ResourcePool>> {
        self.pool.as_ref()
    }

    fn acquire(&self) {
        let mut state = self.state.lock();
        while state.locked {
            self.unlocked.wait(&mut state);
        }
        state.locked = true;
    }

    fn release(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.locked, "monitor released while not locked");
        state.locked = false;
        drop(state);
        self.unlocked.notify_one();
    }
}

impl<T: Default> Default for Monitor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Ownership of a [`Monitor`]. Dropping the guard unlocks the monitor.
pub struct MonitorGuard<'a, T> {
    monitor: &'a Monitor<T>,
    owned: bool,
}

impl<'a, T> MonitorGuard<'a, T> {
    /// Access the protected value.
    pub fn value(&mut self) -> MappedMutexGuard<'_, T> {
        MutexGuard::map(self.monitor.state.lock(), |s| &mut s.value)
    }

    /// Park on the monitor's own waiting list until signalled or cancelled.
    ///
    /// Returns with the monitor owned in both cases.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] on cancellation, or the error of the
    /// bound pool when the permit could not be re-allocated.
    pub fn wait(&mut self, ctx: &Context) -> Result<(), SyncError> {
        let monitor = self.monitor;
        let Some(pool) = monitor.pool.as_deref() else {
            return monitor.waiting.park(monitor, ctx);
        };
        self.wait_lending(ctx, pool)
    }

    /// Park on the monitor's own waiting list, lending the caller's permit to
    /// `pool` while asleep.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] on cancellation, or the allocation error of `pool`.
    pub fn wait_lending(&mut self, ctx: &Context, pool: &dyn ResourcePool) -> Result<(), SyncError> {
        let monitor = self.monitor;
        // Lending may start a worker and deliver job events; never under the
        // monitor, so this waiter takes no hand-off.
        let slot = monitor.waiting.enqueue(monitor, false);
        pool.release(ctx);
        let waited = monitor.waiting.sleep(monitor, &slot, ctx);
        monitor.release();
        let allocated = pool.alloc(ctx);
        monitor.acquire();
        waited.and(allocated)
    }

    /// Hand the monitor to the oldest waiter, or unlock if nobody waits.
    pub fn signal(self) -> bool {
        let monitor = self.monitor;
        monitor.waiting.signal(self)
    }

    /// Wake all waiters and unlock.
    pub fn signal_all(self) -> bool {
        let monitor = self.monitor;
        monitor.waiting.signal_all(self)
    }

    /// Whether somebody waits on the monitor's own list.
    #[must_use]
    pub fn has_waiting(&self) -> bool {
        self.monitor.waiting.has_waiting()
    }

    /// Unlock the monitor.
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T> Drop for MonitorGuard<'_, T> {
    fn drop(&mut self) {
        if self.owned {
            self.owned = false;
            self.monitor.release();
        }
    }
}
