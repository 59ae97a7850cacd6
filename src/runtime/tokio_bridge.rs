//! Tokio bridges for blocking scheduler waits.

use tokio::task::{self, JoinError};

use crate::context::Context;
use crate::core::error::SyncError;
use crate::scheduler::{Job, Scheduler, State};

/// Await the end of `job` and return its final state.
///
/// # Errors
///
/// Returns the join error if the blocking task panicked or was cancelled.
pub async fn wait_job(job: Job) -> Result<State, JoinError> {
    task::spawn_blocking(move || {
        job.wait();
        job.state()
    })
    .await
}

/// Like [`wait_job`], giving up once `ctx` is cancelled.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] on cancellation. A failed blocking task
/// is reported as cancellation too.
pub async fn wait_job_context(job: Job, ctx: Context) -> Result<State, SyncError> {
    task::spawn_blocking(move || job.wait_context(&ctx).map(|()| job.state()))
        .await
        .unwrap_or(Err(SyncError::Cancelled))
}

/// Await the exit of every processor of `scheduler`.
///
/// # Errors
///
/// Returns the join error if the blocking task panicked or was cancelled.
pub async fn wait_scheduler(scheduler: Scheduler) -> Result<(), JoinError> {
    task::spawn_blocking(move || scheduler.wait()).await
}
