//! Blocking priority queue with discard support.

use std::collections::VecDeque;
use std::fmt;

use crate::context::Context;
use crate::core::error::SyncError;
use crate::core::limiter::Limiter;
use crate::util::types::Priority;

/// Elements that carry a priority.
pub trait Prioritized {
    /// The element's priority. Higher values are served first.
    fn priority(&self) -> Priority;
}

/// Queue ordered by descending priority, FIFO among equal priorities.
///
/// [`PriorityQueue::get`] blocks until an element is present. A discard
/// request makes exactly one present or future `get` return `Ok(None)`.
pub struct PriorityQueue<E> {
    limiter: Limiter<VecDeque<E>, Option<E>>,
}

impl<E> PriorityQueue<E>
where
    E: Prioritized + PartialEq + Send + 'static,
{
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            limiter: Limiter::new(
                VecDeque::new(),
                |items: &VecDeque<E>| !items.is_empty(),
                VecDeque::pop_front,
            ),
        }
    }

    /// Insert `element` behind every element of equal or higher priority and
    /// hand the queue to one blocked consumer.
    pub fn add(&self, element: E) {
        let mut guard = self.limiter.lock();
        {
            let mut gate = guard.value();
            let priority = element.priority();
            let index = gate
                .items
                .iter()
                .position(|e| e.priority() < priority)
                .unwrap_or(gate.items.len());
            gate.items.insert(index, element);
        }
        guard.signal();
    }

    /// Remove `element` if it is still queued.
    pub fn remove(&self, element: &E) -> bool {
        let mut guard = self.limiter.lock();
        let mut gate = guard.value();
        match gate.items.iter().position(|e| e == element) {
            Some(index) => {
                gate.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take the first element without blocking.
    pub fn try_get(&self) -> Option<E> {
        self.limiter.lock().value().items.pop_front()
    }

    /// Take the first element, blocking until one is available.
    ///
    /// Returns `Ok(None)` if this consumer was discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled while blocked.
    pub fn get(&self, ctx: &Context) -> Result<Option<E>, SyncError> {
        Ok(self.limiter.request(ctx)?.into_option().flatten())
    }

    /// Retire one present or future consumer.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled before a consumer took the credit.
    pub fn discard(&self, ctx: &Context) -> Result<(), SyncError> {
        self.limiter.discard(ctx)
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.limiter.lock().value().items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a consumer is blocked in [`PriorityQueue::get`].
    pub fn has_waiting(&self) -> bool {
        self.limiter.has_waiting()
    }

    /// Whether discard credit is pending.
    pub fn has_discarded(&self) -> bool {
        self.limiter.has_discarded()
    }
}

impl<E> PriorityQueue<E>
where
    E: Prioritized + PartialEq + Clone + Send + 'static,
{
    /// Copy of the queued elements in service order.
    pub fn snapshot(&self) -> Vec<E> {
        self.limiter.lock().value().items.iter().cloned().collect()
    }
}

impl<E> Default for PriorityQueue<E>
where
    E: Prioritized + PartialEq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for PriorityQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("limiter", &self.limiter)
            .finish()
    }
}
