//! Dynamically sized pool of worker threads.
//!
//! Each worker runs on a dedicated, named OS thread. Workers are registered
//! with [`WorkerPool::add`] and started with the pool by [`WorkerPool::run`];
//! a worker added to a running pool starts immediately.
//!
//! The pool never kills a worker. Shrinking goes through the discard protocol
//! of the queue the workers consume from: [`WorkerPool::discard`] makes
//! exactly one worker's next dequeue come back empty, and that worker exits
//! between jobs.
//!
//! The pool is also a [`ResourcePool`]. Releasing a permit starts a
//! replacement worker; allocating one retires a worker again. Jobs blocked on
//! pool-aware primitives thereby lend their slot to a fresh worker.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::context::Context;
use crate::core::error::SyncError;
use crate::core::limiter::Limiter;
use crate::core::queue::{Prioritized, PriorityQueue};
use crate::core::resource_pool::ResourcePool;
use crate::util::ids::IdAllocator;

/// Body of a worker thread. Returns when the worker should exit.
pub trait Worker: Send + Sync {
    /// Run until cancelled or discarded.
    fn run(&self, ctx: &Context);
}

impl<F> Worker for F
where
    F: Fn(&Context) + Send + Sync,
{
    fn run(&self, ctx: &Context) {
        self(ctx);
    }
}

/// Source of work that can retire one of its consumers.
pub trait Retire: Send + Sync {
    /// Make exactly one present or future consumer stop.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled first.
    fn discard(&self, ctx: &Context) -> Result<(), SyncError>;
}

impl<S: Send, E> Retire for Limiter<S, E> {
    fn discard(&self, ctx: &Context) -> Result<(), SyncError> {
        Limiter::discard(self, ctx)
    }
}

impl<E> Retire for PriorityQueue<E>
where
    E: Prioritized + PartialEq + Send + 'static,
{
    fn discard(&self, ctx: &Context) -> Result<(), SyncError> {
        PriorityQueue::discard(self, ctx)
    }
}

/// Creates the worker for a given worker id.
pub type WorkerFactory = Box<dyn Fn(usize) -> Arc<dyn Worker> + Send + Sync>;

/// Snapshot of pool activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Registered workers.
    pub workers: usize,
    /// Worker threads currently alive.
    pub running: usize,
    /// Worker threads started so far.
    pub started: u64,
    /// Worker threads that have exited.
    pub exited: u64,
    /// Worker threads that could not be spawned.
    pub spawn_failures: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    started: AtomicU64,
    exited: AtomicU64,
    spawn_failures: AtomicU64,
}

#[derive(Default)]
struct PoolState {
    ids: IdAllocator,
    registered: BTreeMap<usize, Arc<dyn Worker>>,
    running: usize,
    ctx: Option<Context>,
}

struct PoolInner {
    name: String,
    factory: WorkerFactory,
    retire: Arc<dyn Retire>,
    state: Mutex<PoolState>,
    idle: Condvar,
    counters: PoolCounters,
}

impl PoolInner {
    fn exited(&self, worker_id: usize) {
        self.counters.exited.fetch_add(1, Ordering::Relaxed);
        self.unregister(worker_id);
    }

    fn unregister(&self, worker_id: usize) {
        let mut state = self.state.lock();
        state.ids.release(worker_id);
        state.registered.remove(&worker_id);
        state.running -= 1;
        if state.running == 0 {
            self.idle.notify_all();
        }
    }
}

/// Pool of worker threads consuming from a shared source of work.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a stopped pool.
    ///
    /// `retire` is the work source workers consume from; `factory` builds the
    /// worker for each allocated id.
    pub fn new<F>(name: impl Into<String>, retire: Arc<dyn Retire>, factory: F) -> Self
    where
        F: Fn(usize) -> Arc<dyn Worker> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                factory: Box::new(factory),
                retire,
                state: Mutex::new(PoolState::default()),
                idle: Condvar::new(),
                counters: PoolCounters::default(),
            }),
        }
    }

    /// Name of the pool, used for thread names.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Start every registered worker.
    ///
    /// Workers run with a context derived from `ctx` and bound to this pool
    /// as resource pool.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyStarted`] if the pool is already running.
    pub fn run(&self, ctx: &Context) -> Result<(), SyncError> {
        let mut state = self.inner.state.lock();
        if state.ctx.is_some() {
            return Err(SyncError::AlreadyStarted);
        }
        let handle: Arc<dyn ResourcePool> = Arc::new(PoolHandle(Arc::downgrade(&self.inner)));
        let ctx = ctx.child().with_pool(handle);
        state.ctx = Some(ctx.clone());
        let workers: Vec<_> = state
            .registered
            .iter()
            .map(|(id, worker)| (*id, Arc::clone(worker)))
            .collect();
        state.running += workers.len();
        drop(state);

        info!(pool = %self.inner.name, workers = workers.len(), "Worker pool running");
        for (id, worker) in workers {
            self.spawn(id, worker, ctx.clone());
        }
        Ok(())
    }

    /// Whether [`WorkerPool::run`] has been called.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().ctx.is_some()
    }

    /// Context the workers run with, once the pool is running.
    pub fn context(&self) -> Option<Context> {
        self.inner.state.lock().ctx.clone()
    }

    /// Register one more worker and start it if the pool is running.
    ///
    /// Returns the worker id.
    pub fn add(&self) -> usize {
        let mut state = self.inner.state.lock();
        let id = state.ids.allocate();
        let worker = (self.inner.factory)(id);
        state.registered.insert(id, Arc::clone(&worker));
        let ctx = state.ctx.clone();
        if ctx.is_some() {
            state.running += 1;
        }
        drop(state);

        if let Some(ctx) = ctx {
            self.spawn(id, worker, ctx);
        }
        id
    }

    /// Retire one worker once it finishes its current job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled before a worker took the request.
    pub fn discard(&self, ctx: &Context) -> Result<(), SyncError> {
        self.inner.retire.discard(ctx)
    }

    /// Cancel the pool context. Workers exit once their blocking calls observe it.
    pub fn cancel(&self) {
        let ctx = self.inner.state.lock().ctx.clone();
        if let Some(ctx) = ctx {
            info!(pool = %self.inner.name, "Cancelling worker pool");
            ctx.cancel();
        }
    }

    /// Block until no worker thread is alive.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while state.running > 0 {
            self.inner.idle.wait(&mut state);
        }
    }

    /// Number of registered workers.
    pub fn size(&self) -> usize {
        self.inner.state.lock().registered.len()
    }

    /// Snapshot of pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            workers: state.registered.len(),
            running: state.running,
            started: self.inner.counters.started.load(Ordering::Relaxed),
            exited: self.inner.counters.exited.load(Ordering::Relaxed),
            spawn_failures: self.inner.counters.spawn_failures.load(Ordering::Relaxed),
        }
    }

    fn spawn(&self, worker_id: usize, worker: Arc<dyn Worker>, ctx: Context) {
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("{}-worker-{worker_id}", self.inner.name))
            .spawn(move || {
                debug!(worker_id = worker_id, "Worker thread started");
                worker.run(&ctx);
                debug!(worker_id = worker_id, "Worker thread exiting");
                inner.exited(worker_id);
            });
        match spawned {
            Ok(_) => {
                self.inner.counters.started.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(worker_id = worker_id, error = %e, "Failed to spawn worker thread");
                self.inner.counters.spawn_failures.fetch_add(1, Ordering::Relaxed);
                self.inner.unregister(worker_id);
            }
        }
    }
}

impl ResourcePool for WorkerPool {
    fn alloc(&self, ctx: &Context) -> Result<(), SyncError> {
        if let Some(activity) = ctx.activity() {
            activity.ready();
        }
        let retired = self.discard(ctx);
        if let Some(activity) = ctx.activity() {
            activity.running();
        }
        retired
    }

    fn release(&self, ctx: &Context) {
        if let Some(activity) = ctx.activity() {
            activity.blocked();
        }
        self.add();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Resource-pool view of a worker pool that does not keep it alive.
struct PoolHandle(Weak<PoolInner>);

impl ResourcePool for PoolHandle {
    fn alloc(&self, ctx: &Context) -> Result<(), SyncError> {
        match self.0.upgrade() {
            Some(inner) => WorkerPool { inner }.alloc(ctx),
            None => Ok(()),
        }
    }

    fn release(&self, ctx: &Context) {
        if let Some(inner) = self.0.upgrade() {
            WorkerPool { inner }.release(ctx);
        }
    }
}
