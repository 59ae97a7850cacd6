//! Cancellation context threaded through every blocking call.
//!
//! A [`Context`] carries three things:
//!
//! - a cancellation token; cancelling a context cancels every context derived
//!   from it with [`Context::child`],
//! - an optional [`ResourcePool`] whose permit is lent out while the holder
//!   blocks on pool-aware primitives,
//! - an optional [`Activity`] reporter notified when the holder gives up or
//!   regains its execution slot.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::core::error::SyncError;
use crate::core::resource_pool::{Activity, ResourcePool};

struct Token {
    cancelled: AtomicBool,
    // Dropped on cancel so that `done` receivers observe disconnection.
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
    children: Mutex<Vec<Weak<Token>>>,
}

impl Token {
    fn new() -> Arc<Self> {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            receiver,
            children: Mutex::new(Vec::new()),
        })
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sender.lock().take();
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn derive(self: &Arc<Self>) -> Arc<Self> {
        let child = Self::new();
        {
            let mut children = self.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // A cancel racing with the registration above has either seen the
        // child or set the flag before we read it here.
        if self.cancelled.load(Ordering::Acquire) {
            child.cancel();
        }
        child
    }
}

/// Cancellation token plus the ambient values bound to it.
#[derive(Clone)]
pub struct Context {
    token: Arc<Token>,
    pool: Option<Arc<dyn ResourcePool>>,
    activity: Option<Arc<dyn Activity>>,
}

impl Context {
    /// A fresh root context that is only cancelled explicitly.
    #[must_use]
    pub fn background() -> Self {
        Self {
            token: Token::new(),
            pool: None,
            activity: None,
        }
    }

    /// Derive a context cancelled together with `self`. Bound values are inherited.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.derive(),
            pool: self.pool.clone(),
            activity: self.activity.clone(),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.cancelled.load(Ordering::Acquire)
    }

    /// Channel that disconnects once the context is cancelled, for use in `select!`.
    #[must_use]
    pub fn done(&self) -> &Receiver<()> {
        &self.token.receiver
    }

    /// Fail with [`SyncError::Cancelled`] if the context is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] after cancellation.
    pub fn check(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Same token, bound to the given resource pool.
    #[must_use]
    pub fn with_pool(&self, pool: Arc<dyn ResourcePool>) -> Self {
        Self {
            pool: Some(pool),
            ..self.clone()
        }
    }

    /// Resource pool bound to this context.
    #[must_use]
    pub fn pool(&self) -> Option<&Arc<dyn ResourcePool>> {
        self.pool.as_ref()
    }

    /// Same token, reporting slot activity to `activity`.
    #[must_use]
    pub fn with_activity(&self, activity: Arc<dyn Activity>) -> Self {
        Self {
            activity: Some(activity),
            ..self.clone()
        }
    }

    /// Activity reporter bound to this context.
    #[must_use]
    pub fn activity(&self) -> Option<&Arc<dyn Activity>> {
        self.activity.as_ref()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("pool", &self.pool.is_some())
            .field("activity", &self.activity.is_some())
            .finish()
    }
}
