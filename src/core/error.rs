//! Error types for synchronization and scheduler operations.

use thiserror::Error;

/// Errors returned by blocking synchronization primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The context passed to a blocking call was cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// A permit was requested from a pool whose limit is zero.
    #[error("pool is empty")]
    PoolEmpty,
    /// The worker pool has already been started.
    #[error("pool already started")]
    AlreadyStarted,
}

/// Problems found while validating a job net.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetProblem {
    /// A job refers to a job name that is not part of the net.
    #[error("job {job} refers to unknown job {reference}")]
    UnknownJob {
        /// Job carrying the reference.
        job: String,
        /// The unresolved job name.
        reference: String,
    },
    /// A job refers to an explicit condition that was never declared.
    #[error("job {job} refers to unknown condition {reference}")]
    UnknownCondition {
        /// Job carrying the reference.
        job: String,
        /// The unresolved condition name.
        reference: String,
    },
    /// The dependency graph contains a cycle.
    #[error("cycle {}", .0.join("->"))]
    Cycle(Vec<String>),
}

/// Errors produced while validating or instantiating a job net.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    /// Validation failed.
    #[error("invalid job net {net}: {}", format_problems(.problems))]
    Invalid {
        /// Name of the net.
        net: String,
        /// Every problem found.
        problems: Vec<NetProblem>,
    },
}

impl NetError {
    /// Problems reported by a failed validation.
    #[must_use]
    pub fn problems(&self) -> &[NetProblem] {
        match self {
            Self::Invalid { problems, .. } => problems,
        }
    }
}

fn format_problems(problems: &[NetProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A job was applied before the scheduler was started.
    #[error("scheduler not started")]
    NotStarted,
    /// The job has already been scheduled.
    #[error("job {0} already scheduled")]
    AlreadyScheduled(String),
    /// A blocking operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// An extension rejected a job or failed to close.
    #[error("extension error: {0}")]
    Extension(String),
    /// Job net validation failed.
    #[error(transparent)]
    Net(#[from] NetError),
    /// Configuration was rejected.
    #[error("config invalid: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for runner bodies.
pub type AppResult<T> = Result<T, anyhow::Error>;
