use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{and, or, Condition, ConditionRef, ConditionState, StateTrigger};
use crate::scheduler::job::Job;
use crate::scheduler::state::{JobEvent, State};

type StateCheck = Box<dyn Fn(State) -> bool + Send + Sync>;

/// Condition leaf enabled once a job reached a matching state.
///
/// Once reached it stays enabled. If the job terminates without ever matching,
/// the leaf settles as disabled.
pub struct JobStateReached {
    job: Job,
    label: &'static str,
    check: StateCheck,
    reached: AtomicBool,
}

impl JobStateReached {
    fn create(
        job: &Job,
        label: &'static str,
        check: impl Fn(State) -> bool + Send + Sync + 'static,
    ) -> ConditionRef {
        Arc::new(Self {
            job: job.clone(),
            label,
            check: Box::new(check),
            reached: AtomicBool::new(false),
        })
    }

    /// The job this leaf observes.
    #[must_use]
    pub const fn job(&self) -> &Job {
        &self.job
    }
}

impl Condition for JobStateReached {
    fn state(&self) -> ConditionState {
        if self.reached.load(Ordering::Acquire) {
            return ConditionState::new(true, true, true);
        }
        let current = self.job.state();
        if (self.check)(current) {
            self.reached.store(true, Ordering::Release);
            ConditionState::new(true, true, true)
        } else {
            ConditionState::new(false, current.is_terminal(), true)
        }
    }

    fn evaluate(&self, event: &JobEvent) {
        if event.job() == &self.job && (self.check)(event.state()) {
            self.reached.store(true, Ordering::Release);
        }
    }

    fn add_state_trigger(&self, _key: &str, _trigger: StateTrigger) {}
}

impl fmt::Debug for JobStateReached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStateReached")
            .field("job", &self.job.id())
            .field("check", &self.label)
            .field("reached", &self.reached.load(Ordering::Acquire))
            .finish()
    }
}

/// Enabled once `job` entered `state`.
pub fn job_state_reached(job: &Job, state: State) -> ConditionRef {
    JobStateReached::create(job, state.as_str(), move |s| s == state)
}

/// Enabled once `job` is done or discarded. A failed job settles it as disabled.
pub fn job_finished(job: &Job) -> ConditionRef {
    JobStateReached::create(job, "FINISHED", |s| {
        matches!(s, State::Done | State::Discarded)
    })
}

/// Enabled once `job` is done.
pub fn job_done(job: &Job) -> ConditionRef {
    job_state_reached(job, State::Done)
}

/// Enabled once `job` failed.
pub fn job_failed(job: &Job) -> ConditionRef {
    job_state_reached(job, State::Failed)
}

/// Enabled once `job` was discarded.
pub fn job_discarded(job: &Job) -> ConditionRef {
    job_state_reached(job, State::Discarded)
}

/// Enabled once every job in `jobs` is finished.
pub fn depends_on<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> ConditionRef {
    and(jobs.into_iter().map(job_finished))
}

/// Enabled once any job in `jobs` was discarded.
pub fn discard_on<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> ConditionRef {
    or(jobs.into_iter().map(job_discarded))
}
