use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use tracing::{debug, trace, warn};

use crate::context::Context;
use crate::core::worker_pool::Worker;
use crate::scheduler::context::SchedulingContext;
use crate::scheduler::definition::JobResult;
use crate::scheduler::job::Job;
use crate::scheduler::scheduler::SchedulerInner;
use crate::scheduler::state::State;
use crate::scheduler::Scheduler;

/// Worker taking pending jobs from the scheduler queue, one at a time.
pub(crate) struct Processor {
    id: usize,
    scheduler: Weak<SchedulerInner>,
}

impl Processor {
    pub(crate) const fn new(id: usize, scheduler: Weak<SchedulerInner>) -> Self {
        Self { id, scheduler }
    }
}

impl Worker for Processor {
    fn run(&self, ctx: &Context) {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        loop {
            match scheduler.pending().get(ctx) {
                Ok(Some(job)) => execute(&scheduler, &job, self.id),
                Ok(None) => {
                    debug!(processor = self.id, "Processor discarded");
                    return;
                }
                Err(err) => {
                    debug!(processor = self.id, reason = %err, "Processor stopped");
                    return;
                }
            }
        }
    }
}

fn execute(scheduler: &Arc<SchedulerInner>, job: &Job, processor: usize) {
    if job.context().is_cancelled() {
        job.transition_from(&[State::Pending], State::Discarded);
        return;
    }
    if !job.transition_from(&[State::Pending], State::Running) {
        // Cancelled between dequeue and start.
        return;
    }
    trace!(processor, job = %job.id(), "Running job");
    let outcome = match job.definition().runner() {
        None => Ok(JobResult::Null),
        Some(runner) => {
            let mut ctx = SchedulingContext::new(job.clone(), Scheduler::from_inner(Arc::clone(scheduler)));
            panic::catch_unwind(AssertUnwindSafe(|| runner.run(&mut ctx))).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(processor, job = %job.id(), panic = %message, "Runner panicked");
                Err(anyhow!("runner panicked: {message}"))
            })
        }
    };
    job.finish(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
