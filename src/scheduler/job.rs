//! Jobs and their state machine.
//!
//! Every state change happens under the job's lock and is queued for
//! delivery. Delivery drains the queue in order: for each event the job's
//! handlers and then the scheduler's condition re-evaluation run on a
//! dedicated thread the deliverer joins. Events of one job are therefore
//! observed in the order the states were entered, even when a nested
//! transition happens while an earlier event is still being delivered.
//!
//! Once a terminal event has been delivered the job extension is closed,
//! waiters are released and the parent is told that a child finished.

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::context::Context;
use crate::core::error::{AppResult, SchedulerError, SyncError};
use crate::core::queue::Prioritized;
use crate::core::resource_pool::Activity;
use crate::scheduler::definition::{EventHandler, HandlerRef, JobDefinition, JobResult};
use crate::scheduler::extension::{find_extension, JobExtension};
use crate::scheduler::output::SharedWriter;
use crate::scheduler::scheduler::SchedulerInner;
use crate::scheduler::state::{JobEvent, State};
use crate::scheduler::Scheduler;
use crate::util::types::Priority;
use crate::waitgroup::WaitGroup;

struct JobCore {
    state: State,
    children: Vec<Job>,
    handlers: Vec<HandlerRef>,
    result: Option<JobResult>,
    error: Option<Arc<anyhow::Error>>,
    outbox: VecDeque<State>,
}

pub(crate) struct JobInner {
    id: String,
    seq: u64,
    definition: JobDefinition,
    priority: Priority,
    scheduler: Weak<SchedulerInner>,
    parent: Option<Weak<JobInner>>,
    ctx: Context,
    extension: Box<dyn JobExtension>,
    writer: SharedWriter,
    core: Mutex<JobCore>,
    delivery: Mutex<()>,
    completion: WaitGroup,
    scheduled: AtomicBool,
}

/// Everything needed to instantiate a job.
pub(crate) struct JobSetup<'a> {
    pub id: String,
    pub seq: u64,
    pub definition: JobDefinition,
    pub priority: Priority,
    pub scheduler: Weak<SchedulerInner>,
    pub parent: Option<&'a Job>,
    pub base: Context,
    pub extension: Box<dyn JobExtension>,
}

// Maps slot lending reported by the worker pool onto job states.
struct JobActivity(Weak<JobInner>);

impl JobActivity {
    fn report(&self, from: &[State], to: State) {
        if let Some(inner) = self.0.upgrade() {
            Job { inner }.transition_from(from, to);
        }
    }
}

impl Activity for JobActivity {
    fn ready(&self) {
        self.report(&[State::Running, State::Blocked], State::Ready);
    }

    fn running(&self) {
        self.report(&[State::Ready, State::Blocked], State::Running);
    }

    fn blocked(&self) {
        self.report(&[State::Running, State::Ready], State::Blocked);
    }
}

/// A job instantiated from a [`JobDefinition`] on a scheduler.
///
/// Cloning yields another handle to the same job.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub(crate) fn create(setup: JobSetup<'_>) -> Self {
        let JobSetup {
            id,
            seq,
            definition,
            priority,
            scheduler,
            parent,
            base,
            extension,
        } = setup;
        let handlers = definition.handlers().to_vec();
        let writer = extension.writer();
        let inner = Arc::new_cyclic(|weak: &Weak<JobInner>| JobInner {
            ctx: base
                .child()
                .with_activity(Arc::new(JobActivity(weak.clone()))),
            id,
            seq,
            definition,
            priority,
            scheduler,
            parent: parent.map(|p| Arc::downgrade(&p.inner)),
            extension,
            writer,
            core: Mutex::new(JobCore {
                state: State::Initial,
                children: Vec::new(),
                handlers,
                result: None,
                error: None,
                outbox: VecDeque::new(),
            }),
            delivery: Mutex::new(()),
            completion: WaitGroup::with_count(1),
            scheduled: AtomicBool::new(false),
        });
        Self { inner }
    }

    /// Unique id, `<definition name>[<n>]`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Name of the definition the job was created from.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.definition.name()
    }

    pub(crate) fn seq(&self) -> u64 {
        self.inner.seq
    }

    /// Effective priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    /// The definition the job was created from.
    #[must_use]
    pub fn definition(&self) -> &JobDefinition {
        &self.inner.definition
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.core.lock().state
    }

    /// Whether the job reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether [`Job::schedule`] was called or the job was cancelled.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.inner.scheduled.load(Ordering::Acquire)
    }

    /// Cancellation context of the job.
    ///
    /// Derived from the parent job's context, or from the scheduler's, and
    /// bound to the worker pool.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.inner.ctx
    }

    /// The parent job, for nested jobs still referenced elsewhere.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Self { inner })
    }

    /// The scheduler the job was applied to, while it is alive.
    #[must_use]
    pub fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler_inner().map(Scheduler::from_inner)
    }

    fn scheduler_inner(&self) -> Option<Arc<SchedulerInner>> {
        self.inner.scheduler.upgrade()
    }

    /// Child jobs that have not finished yet.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        self.inner.core.lock().children.clone()
    }

    /// Writer for job output.
    #[must_use]
    pub fn writer(&self) -> SharedWriter {
        self.inner.writer.clone()
    }

    /// Search the job's extension chain for a `T`.
    #[must_use]
    pub fn extension<T: JobExtension>(&self) -> Option<&T> {
        find_extension::<T>(self.inner.extension.as_ref())
    }

    /// Attach a handler. It sees every event delivered from now on.
    pub fn register_handler(&self, handler: HandlerRef) {
        self.inner.core.lock().handlers.push(handler);
    }

    /// Attach a handler given by value.
    pub fn register(&self, handler: impl EventHandler + 'static) -> HandlerRef {
        let handler: HandlerRef = Arc::new(handler);
        self.register_handler(Arc::clone(&handler));
        handler
    }

    /// Detach a handler previously registered. Returns whether it was found.
    pub fn unregister_handler(&self, handler: &HandlerRef) -> bool {
        let mut core = self.inner.core.lock();
        let before = core.handlers.len();
        core.handlers.retain(|h| !Arc::ptr_eq(h, handler));
        core.handlers.len() != before
    }

    /// Result of a finished runner.
    ///
    /// # Errors
    ///
    /// Returns the runner's error if it failed.
    pub fn result(&self) -> Result<Option<JobResult>, Arc<anyhow::Error>> {
        let core = self.inner.core.lock();
        match &core.error {
            Some(err) => Err(Arc::clone(err)),
            None => Ok(core.result.clone()),
        }
    }

    /// Hand the job to its scheduler.
    ///
    /// A job whose discard condition holds is discarded. A job without start
    /// condition, or whose start condition holds, becomes `PENDING`; otherwise
    /// it waits in `WAITING` for its conditions to change.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyScheduled`] on a second call and
    /// [`SchedulerError::NotStarted`] if the scheduler is gone.
    pub fn schedule(&self) -> Result<(), SchedulerError> {
        let scheduler = self.scheduler_inner().ok_or(SchedulerError::NotStarted)?;
        if self.inner.scheduled.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyScheduled(self.id().to_owned()));
        }
        let definition = &self.inner.definition;
        for condition in [definition.condition(), definition.discard_condition()]
            .into_iter()
            .flatten()
        {
            condition.add_state_trigger(scheduler.trigger_key(), scheduler.state_trigger());
        }
        drop(scheduler);

        if self.discard_due(None) {
            self.transition_from(&[State::Initial], State::Discarded);
            return Ok(());
        }
        match self.start_decision(None) {
            Some(to) => {
                self.transition_from(&[State::Initial], to);
            }
            None => {
                if self.transition_from(&[State::Initial], State::Waiting) {
                    // Conditions may have flipped before the job became visible
                    // in the waiting set.
                    self.promote(None);
                }
            }
        }
        Ok(())
    }

    /// Cancel the job.
    ///
    /// The job's context is cancelled. A job that has not started running yet
    /// is discarded and can no longer be scheduled.
    pub fn cancel(&self) {
        self.inner.scheduled.store(true, Ordering::Release);
        self.inner.ctx.cancel();
        self.transition_from(
            &[State::Initial, State::Waiting, State::Pending],
            State::Discarded,
        );
    }

    /// Block until the job reached a terminal state and its events were
    /// delivered.
    pub fn wait(&self) {
        // A background context is never cancelled.
        let _ = self.inner.completion.wait(&Context::background());
    }

    /// Like [`Job::wait`], giving up when `ctx` is cancelled. A context bound
    /// to the worker pool lends its slot while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `ctx` is cancelled first.
    pub fn wait_context(&self, ctx: &Context) -> Result<(), SyncError> {
        self.inner.completion.wait(ctx)
    }

    pub(crate) fn discard_due(&self, event: Option<&JobEvent>) -> bool {
        self.inner.definition.discard_condition().is_some_and(|c| {
            if let Some(event) = event {
                c.evaluate(event);
            }
            c.is_enabled()
        })
    }

    pub(crate) fn start_decision(&self, event: Option<&JobEvent>) -> Option<State> {
        let Some(condition) = self.inner.definition.condition() else {
            return Some(State::Pending);
        };
        if let Some(event) = event {
            condition.evaluate(event);
        }
        let state = condition.state();
        if !state.valid {
            None
        } else if state.enabled {
            Some(State::Pending)
        } else if state.settled {
            Some(State::Discarded)
        } else {
            None
        }
    }

    /// Re-check a waiting job's conditions.
    pub(crate) fn promote(&self, event: Option<&JobEvent>) {
        if self.discard_due(event) {
            self.transition_from(&[State::Waiting], State::Discarded);
        } else if let Some(to) = self.start_decision(event) {
            self.transition_from(&[State::Waiting], to);
        }
    }

    pub(crate) fn add_child(&self, child: &Self) {
        let mut core = self.inner.core.lock();
        if !core.state.is_terminal() {
            core.children.push(child.clone());
        }
    }

    fn child_finished(&self, child: &Self) {
        let mut core = self.inner.core.lock();
        core.children.retain(|c| c != child);
        if core.state == State::Zombie && core.children.is_empty() {
            let to = Self::outcome_state(&core);
            self.transition(core, to);
        }
    }

    /// Record the runner's outcome and leave the running states.
    pub(crate) fn finish(&self, outcome: AppResult<JobResult>) {
        let mut core = self.inner.core.lock();
        match outcome {
            Ok(value) => core.result = Some(value),
            Err(err) => {
                debug!(job = %self.inner.id, error = %err, "Runner failed");
                core.error = Some(Arc::new(err));
            }
        }
        let to = if core.children.is_empty() {
            Self::outcome_state(&core)
        } else {
            State::Zombie
        };
        self.transition(core, to);
    }

    fn outcome_state(core: &JobCore) -> State {
        if core.error.is_some() {
            State::Failed
        } else {
            State::Done
        }
    }

    /// Move to `to` if the job is currently in one of `from`.
    pub(crate) fn transition_from(&self, from: &[State], to: State) -> bool {
        let core = self.inner.core.lock();
        if !from.contains(&core.state) {
            return false;
        }
        self.transition(core, to)
    }

    fn transition(&self, mut core: MutexGuard<'_, JobCore>, to: State) -> bool {
        let from = core.state;
        if from.is_terminal() || from == to {
            return false;
        }
        let scheduler = self.scheduler_inner();
        if let Some(scheduler) = &scheduler {
            scheduler.leave(self, from);
        }
        core.state = to;
        if let Some(scheduler) = &scheduler {
            scheduler.enter(self, to);
        }
        if to == State::Running && matches!(from, State::Initial | State::Waiting | State::Pending) {
            self.inner.extension.start();
        }
        self.inner.extension.set_state(to);
        core.outbox.push_back(to);
        drop(core);
        drop(scheduler);

        debug!(job = %self.inner.id, from = %from, to = %to, "Job state changed");
        self.deliver();
        true
    }

    // Whoever holds the delivery lock drains the outbox; other transitions
    // only enqueue. The re-check after unlocking picks up events queued
    // between the last drain and the unlock.
    fn deliver(&self) {
        loop {
            let Some(turn) = self.inner.delivery.try_lock() else {
                return;
            };
            loop {
                let next = self.inner.core.lock().outbox.pop_front();
                let Some(state) = next else {
                    break;
                };
                self.fan_out(state);
                if state.is_terminal() {
                    self.finalize();
                }
            }
            drop(turn);
            if self.inner.core.lock().outbox.is_empty() {
                return;
            }
        }
    }

    fn fan_out(&self, state: State) {
        let event = JobEvent::new(self.clone(), state);
        let handlers = self.inner.core.lock().handlers.clone();
        let scheduler = self.scheduler_inner();
        let notify = || {
            for handler in &handlers {
                handler.handle_job_event(&event);
            }
            if let Some(scheduler) = &scheduler {
                scheduler.raise(Some(&event));
            }
        };
        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name(format!("{}-events", self.inner.id))
                .spawn_scoped(scope, || notify());
            match spawned {
                Ok(handle) => {
                    if handle.join().is_err() {
                        warn!(job = %self.inner.id, state = %state, "Job event handler panicked");
                    }
                }
                Err(err) => {
                    warn!(job = %self.inner.id, error = %err, "Event thread spawn failed, delivering inline");
                    notify();
                }
            }
        });
    }

    fn finalize(&self) {
        if let Err(err) = self.inner.extension.close() {
            warn!(job = %self.inner.id, error = %err, "Closing job extension failed");
        }
        self.inner.completion.done();
        if let Some(parent) = self.parent() {
            parent.child_finished(self);
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl Prioritized for Job {
    fn priority(&self) -> Priority {
        self.inner.priority
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("priority", &self.inner.priority)
            .finish()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.id)
    }
}
