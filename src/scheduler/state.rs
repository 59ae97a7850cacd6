//! Job lifecycle states and events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scheduler::job::Job;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Created, not yet scheduled.
    Initial,
    /// Scheduled, start condition not yet satisfied.
    Waiting,
    /// Queued for a worker.
    Pending,
    /// Executing on a worker.
    Running,
    /// Running, waiting to regain an execution slot.
    Ready,
    /// Running, execution slot lent to another worker while blocked.
    Blocked,
    /// Runner finished, children still alive.
    Zombie,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
    /// Never ran, or retired without running.
    Discarded,
}

impl State {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 10] = [
        Self::Initial,
        Self::Waiting,
        Self::Pending,
        Self::Running,
        Self::Ready,
        Self::Blocked,
        Self::Zombie,
        Self::Done,
        Self::Failed,
        Self::Discarded,
    ];

    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Discarded)
    }

    /// Whether the job holds (or is about to regain) a worker.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Ready | Self::Blocked)
    }

    /// Upper-case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Waiting => "WAITING",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Ready => "READY",
            Self::Blocked => "BLOCKED",
            Self::Zombie => "ZOMBIE",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Discarded => "DISCARDED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job entered a new state.
#[derive(Debug, Clone)]
pub struct JobEvent {
    job: Job,
    state: State,
}

impl JobEvent {
    pub(crate) const fn new(job: Job, state: State) -> Self {
        Self { job, state }
    }

    /// The job that changed state.
    #[must_use]
    pub const fn job(&self) -> &Job {
        &self.job
    }

    /// The state the job entered.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.job.id(), self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = State::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![State::Done, State::Failed, State::Discarded]);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(State::Zombie.to_string(), "ZOMBIE");
        assert_eq!(serde_json::to_string(&State::Discarded).unwrap(), "\"DISCARDED\"");
    }
}
