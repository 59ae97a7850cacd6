use std::fmt;
use std::io::{self, Write};

use crate::context::Context;
use crate::core::error::SyncError;
use crate::scheduler::job::Job;
use crate::scheduler::output::SharedWriter;
use crate::scheduler::Scheduler;

/// Handed to a runner: the executing job, its scheduler and its output.
///
/// Writing to the context writes to the job's writer.
pub struct SchedulingContext {
    ctx: Context,
    job: Job,
    scheduler: Scheduler,
    writer: SharedWriter,
}

impl SchedulingContext {
    pub(crate) fn new(job: Job, scheduler: Scheduler) -> Self {
        Self {
            ctx: job.context().clone(),
            writer: job.writer(),
            job,
            scheduler,
        }
    }

    /// Cancellation context of the job, bound to the worker pool.
    ///
    /// Pass it to blocking calls so the job's slot is lent out while blocked.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    /// The executing job.
    #[must_use]
    pub const fn job(&self) -> &Job {
        &self.job
    }

    /// The scheduler executing the job.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Writer for job output.
    #[must_use]
    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }

    /// Fail with [`SyncError::Cancelled`] once the job was cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] after cancellation.
    pub fn check(&self) -> Result<(), SyncError> {
        self.ctx.check()
    }
}

impl Write for SchedulingContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl fmt::Debug for SchedulingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingContext")
            .field("job", &self.job.id())
            .field("scheduler", &self.scheduler.name())
            .finish_non_exhaustive()
    }
}
