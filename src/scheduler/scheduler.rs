use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::context::Context;
use crate::core::error::{SchedulerError, SyncError};
use crate::core::queue::PriorityQueue;
use crate::core::worker_pool::{PoolStats, Retire, Worker, WorkerPool};
use crate::scheduler::condition::StateTrigger;
use crate::scheduler::definition::JobDefinition;
use crate::scheduler::extension::{DefaultExtension, Extension};
use crate::scheduler::job::{Job, JobSetup};
use crate::scheduler::processor::Processor;
use crate::scheduler::state::{JobEvent, State};
use crate::util::types::{Priority, DEFAULT_PRIORITY};

type JobSet = Mutex<BTreeMap<u64, Job>>;

// States whose jobs are tracked in a set. PENDING jobs live in the queue,
// terminal jobs are dropped.
const TRACKED: [State; 6] = [
    State::Initial,
    State::Waiting,
    State::Running,
    State::Ready,
    State::Blocked,
    State::Zombie,
];

pub(crate) struct SchedulerInner {
    name: String,
    trigger_key: String,
    sequence: AtomicU64,
    default_priority: Priority,
    extension: RwLock<Arc<dyn Extension>>,
    pending: Arc<PriorityQueue<Job>>,
    sets: BTreeMap<State, JobSet>,
    pool: WorkerPool,
}

impl SchedulerInner {
    pub(crate) fn pending(&self) -> &PriorityQueue<Job> {
        &self.pending
    }

    pub(crate) fn trigger_key(&self) -> &str {
        &self.trigger_key
    }

    /// Trigger re-evaluating the waiting jobs, for explicit condition leaves.
    pub(crate) fn state_trigger(self: &Arc<Self>) -> StateTrigger {
        let weak = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.raise(None);
            }
        })
    }

    pub(crate) fn leave(&self, job: &Job, state: State) {
        if state == State::Pending {
            self.pending.remove(job);
        } else if let Some(set) = self.sets.get(&state) {
            set.lock().remove(&job.seq());
        }
    }

    pub(crate) fn enter(&self, job: &Job, state: State) {
        if state == State::Pending {
            self.pending.add(job.clone());
        } else if let Some(set) = self.sets.get(&state) {
            set.lock().insert(job.seq(), job.clone());
        }
    }

    fn snapshot(&self, state: State) -> Vec<Job> {
        if state == State::Pending {
            return self.pending.snapshot();
        }
        self.sets
            .get(&state)
            .map(|set| set.lock().values().cloned().collect())
            .unwrap_or_default()
    }

    /// Re-evaluate the waiting jobs: every discard condition first, then the
    /// start conditions.
    pub(crate) fn raise(&self, event: Option<&JobEvent>) {
        let waiting = self.snapshot(State::Waiting);
        if waiting.is_empty() {
            return;
        }
        for job in &waiting {
            if job.discard_due(event) {
                job.transition_from(&[State::Waiting], State::Discarded);
            }
        }
        for job in &waiting {
            if let Some(to) = job.start_decision(event) {
                job.transition_from(&[State::Waiting], to);
            }
        }
    }
}

/// Dependency-aware job scheduler.
///
/// Jobs are applied from [`JobDefinition`]s, scheduled, and executed by a
/// dynamic set of processors in priority order once their start conditions
/// hold. Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a stopped scheduler without processors.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_priority(name, DEFAULT_PRIORITY)
    }

    /// Like [`Scheduler::new`], with the priority of definitions that set none.
    pub fn with_priority(name: impl Into<String>, default_priority: Priority) -> Self {
        let name = name.into();
        let pending = Arc::new(PriorityQueue::new());
        let inner = Arc::new_cyclic(|weak: &Weak<SchedulerInner>| {
            let factory_ref = weak.clone();
            let retire: Arc<dyn Retire> = Arc::clone(&pending) as Arc<dyn Retire>;
            SchedulerInner {
                trigger_key: format!("{name}#{}", uuid::Uuid::new_v4()),
                sequence: AtomicU64::new(0),
                default_priority,
                extension: RwLock::new(Arc::new(DefaultExtension::default())),
                pending: Arc::clone(&pending),
                sets: TRACKED
                    .into_iter()
                    .map(|state| (state, Mutex::new(BTreeMap::new())))
                    .collect(),
                pool: WorkerPool::new(name.clone(), retire, move |id| {
                    Arc::new(Processor::new(id, factory_ref.clone())) as Arc<dyn Worker>
                }),
                name,
            }
        });
        Self { inner }
    }

    pub(crate) const fn from_inner(inner: Arc<SchedulerInner>) -> Self {
        Self { inner }
    }

    /// Name of the scheduler, used for worker thread names.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Priority of jobs whose definition sets none.
    #[must_use]
    pub fn default_priority(&self) -> Priority {
        self.inner.default_priority
    }

    /// Install `extension`, replacing the current one.
    ///
    /// Only jobs applied afterwards use the new extension.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Extension::setup`]; the old extension stays.
    pub fn set_extension(&self, extension: Arc<dyn Extension>) -> Result<(), SchedulerError> {
        extension.setup(self)?;
        *self.inner.extension.write() = extension;
        Ok(())
    }

    /// Add a processor. Returns its id.
    pub fn add_processor(&self) -> usize {
        self.inner.pool.add()
    }

    /// Add `count` processors.
    pub fn add_processors(&self, count: usize) {
        for _ in 0..count {
            self.add_processor();
        }
    }

    /// Retire one processor once it finishes its current job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled before a
    /// processor took the request.
    pub fn remove_processor(&self, ctx: &Context) -> Result<(), SyncError> {
        self.inner.pool.discard(ctx)
    }

    /// Start the processors. Jobs run with contexts derived from `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyStarted`] on a second call.
    pub fn run(&self, ctx: &Context) -> Result<(), SyncError> {
        self.inner.pool.run(ctx)?;
        info!(scheduler = %self.inner.name, processors = self.inner.pool.size(), "Scheduler running");
        Ok(())
    }

    /// Whether [`Scheduler::run`] has been called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.pool.is_running()
    }

    /// Stop the scheduler.
    ///
    /// The scheduler context is cancelled, processors exit once their current
    /// job returns, and every job that never started running is discarded.
    pub fn cancel(&self) {
        self.inner.pool.cancel();
        for state in [State::Initial, State::Waiting] {
            for job in self.inner.snapshot(state) {
                job.cancel();
            }
        }
        while let Some(job) = self.inner.pending.try_get() {
            job.cancel();
        }
    }

    /// Block until every processor exited.
    pub fn wait(&self) {
        self.inner.pool.wait();
    }

    /// Processor statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Jobs currently in `state`. Terminal states are not tracked.
    #[must_use]
    pub fn jobs(&self, state: State) -> Vec<Job> {
        self.inner.snapshot(state)
    }

    /// Instantiate `definition` as a job in `INITIAL` state.
    ///
    /// A job with a parent derives its context from the parent's, and the
    /// parent does not finish before the job.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`Scheduler::run`], or
    /// the extension's error if it rejects the job.
    pub fn apply(&self, definition: &JobDefinition, parent: Option<&Job>) -> Result<Job, SchedulerError> {
        let base = match parent {
            Some(parent) => parent.context().clone(),
            None => self.inner.pool.context().ok_or(SchedulerError::NotStarted)?,
        };
        if !self.inner.pool.is_running() {
            return Err(SchedulerError::NotStarted);
        }
        let seq = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}[{seq}]", definition.name());
        let extension = self.inner.extension.read().clone();
        let job_extension = extension.job_extension(&id, definition, parent)?;
        let job = Job::create(JobSetup {
            id,
            seq,
            definition: definition.clone(),
            priority: definition.priority().unwrap_or(self.inner.default_priority),
            scheduler: Arc::downgrade(&self.inner),
            parent,
            base,
            extension: job_extension,
        });
        self.inner.enter(&job, State::Initial);
        if let Some(parent) = parent {
            parent.add_child(&job);
        }
        debug!(job = %job.id(), parent = ?parent.map(Job::id), "Job applied");
        Ok(job)
    }

    /// Apply and schedule `definition`.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::apply`].
    pub fn schedule_definition(
        &self,
        definition: &JobDefinition,
        parent: Option<&Job>,
    ) -> Result<Job, SchedulerError> {
        let job = self.apply(definition, parent)?;
        job.schedule()?;
        Ok(job)
    }

    /// Apply and schedule top-level jobs for every definition.
    ///
    /// # Errors
    ///
    /// Stops at the first definition that cannot be applied; jobs scheduled
    /// before stay scheduled.
    pub fn schedule_definitions<'a>(
        &self,
        definitions: impl IntoIterator<Item = &'a JobDefinition>,
    ) -> Result<Vec<Job>, SchedulerError> {
        definitions
            .into_iter()
            .map(|definition| self.schedule_definition(definition, None))
            .collect()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.inner.name)
            .field("pending", &self.inner.pending.len())
            .field("pool", &self.inner.pool)
            .finish()
    }
}
