//! Consumption gate with a discard protocol.
//!
//! A [`Limiter`] guards a value `S` with a checker (is an element available?)
//! and a consumer (take the element). [`Limiter::request`] blocks until the
//! checker is satisfied. [`Limiter::discard`] retires exactly one consumer:
//! a request that is currently blocked, or the next request to arrive.
//!
//! A request that is satisfied without blocking never observes a discard that
//! arrives concurrently; discard credit is only examined on entry and after
//! waking.
//!
//! Credit of a parked discarder is owed back to it: the request consuming it
//! releases the discarder. A discarder whose wait is cancelled withdraws its
//! credit only if no request consumed it in the meantime; otherwise the
//! discard counts as done.

use std::fmt;

use tracing::trace;

use crate::context::Context;
use crate::core::error::SyncError;
use crate::monitor::{Monitor, MonitorGuard, Waiting};

/// Outcome of a [`Limiter::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant<E> {
    /// The checker was satisfied and the consumer produced an element.
    Fulfilled(E),
    /// A discard retired this consumer. Not an error: the caller should stop.
    Discarded,
}

impl<E> Grant<E> {
    /// The granted element, if any.
    pub fn into_option(self) -> Option<E> {
        match self {
            Self::Fulfilled(element) => Some(element),
            Self::Discarded => None,
        }
    }
}

/// Value guarded by a limiter, plus its bookkeeping.
pub struct Gate<S> {
    blocked: usize,
    discard: usize,
    parked: usize,
    /// The guarded value.
    pub items: S,
}

type Checker<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;
type Consumer<S, E> = Box<dyn Fn(&mut S) -> E + Send + Sync>;

/// Blocking gate over a checker/consumer pair with discard support.
pub struct Limiter<S, E> {
    monitor: Monitor<Gate<S>>,
    discarders: Waiting,
    checker: Checker<S>,
    consumer: Consumer<S, E>,
}

impl<S, E> Limiter<S, E> {
    /// Create a limiter over `items`.
    pub fn new<C, F>(items: S, checker: C, consumer: F) -> Self
    where
        C: Fn(&S) -> bool + Send + Sync + 'static,
        F: Fn(&mut S) -> E + Send + Sync + 'static,
    {
        Self {
            monitor: Monitor::new(Gate {
                blocked: 0,
                discard: 0,
                parked: 0,
                items,
            }),
            discarders: Waiting::new(),
            checker: Box::new(checker),
            consumer: Box::new(consumer),
        }
    }

    /// Lock the guarded value.
    ///
    /// Dropping the guard unlocks; [`MonitorGuard::signal`] hands the lock to
    /// one blocked request.
    pub fn lock(&self) -> MonitorGuard<'_, Gate<S>> {
        self.monitor.lock()
    }

    /// Obtain an element, blocking until the checker is satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled while blocked.
    pub fn request(&self, ctx: &Context) -> Result<Grant<E>, SyncError> {
        let mut guard = self.monitor.lock();
        if guard.value().discard > 0 {
            trace!("request consumed pending discard");
            return Ok(self.retire(guard));
        }
        while !(self.checker)(&guard.value().items) {
            guard.value().blocked += 1;
            let waited = guard.wait(ctx);
            guard.value().blocked -= 1;
            waited?;
            if guard.value().discard > 0 {
                trace!("blocked request discarded");
                return Ok(self.retire(guard));
            }
        }
        let element = (self.consumer)(&mut guard.value().items);
        Ok(Grant::Fulfilled(element))
    }

    /// Consume one discard credit, releasing its parked discarder if the credit
    /// was owed to one.
    fn retire(&self, mut guard: MonitorGuard<'_, Gate<S>>) -> Grant<E> {
        let owed = {
            let mut gate = guard.value();
            let owed = gate.parked >= gate.discard;
            gate.discard -= 1;
            if owed {
                gate.parked -= 1;
            }
            owed
        };
        if owed {
            self.discarders.signal(guard);
        }
        Grant::Discarded
    }

    /// Retire one consumer.
    ///
    /// Hands the credit to a blocked request if there is one; otherwise waits
    /// until a future request consumes it. A cancelled wait withdraws the
    /// credit again unless a request consumed it before the discarder
    /// re-acquired the lock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled before the credit is taken.
    pub fn discard(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        guard.value().discard += 1;
        if guard.value().blocked > 0 && guard.has_waiting() {
            guard.signal();
            return Ok(());
        }
        guard.value().parked += 1;
        let waited = self.discarders.wait(&mut guard, ctx);
        if waited.is_err() {
            // Owed discarders missing from the list were cancelled; if none is
            // left, a request already took this credit.
            let listed = self.discarders.len();
            let mut gate = guard.value();
            if gate.parked <= listed {
                trace!("cancelled discard already consumed");
                return Ok(());
            }
            gate.parked -= 1;
            gate.discard -= 1;
        }
        waited
    }

    /// Whether discard credit is pending.
    pub fn has_discarded(&self) -> bool {
        self.monitor.lock().value().discard > 0
    }

    /// Whether a request is blocked.
    pub fn has_waiting(&self) -> bool {
        self.monitor.lock().has_waiting()
    }
}

impl<S, E> fmt::Debug for Limiter<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut guard = self.monitor.lock();
        let gate = guard.value();
        f.debug_struct("Limiter")
            .field("blocked", &gate.blocked)
            .field("discard", &gate.discard)
            .field("parked", &gate.parked)
            .finish_non_exhaustive()
    }
}
