//! Start and discard conditions.
//!
//! A condition evaluates to a [`ConditionState`] triple. Leaves are either
//! [`Explicit`] (set from outside) or bound to the state of a job
//! ([`JobStateReached`]); [`and`], [`or`] and [`not`] combine them.
//!
//! Job events are pushed down to every leaf with [`Condition::evaluate`], so
//! job leaves can latch a reached state without polling. Explicit leaves
//! report changes through state triggers registered by the scheduler.

use std::sync::Arc;

mod explicit;
mod job_state;
mod logical;

pub use explicit::Explicit;
pub use job_state::{
    depends_on, discard_on, job_discarded, job_done, job_failed, job_finished, job_state_reached,
    JobStateReached,
};
pub use logical::{and, not, or, Logical};

use crate::scheduler::state::JobEvent;

/// Evaluation result of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionState {
    /// The boolean result.
    pub enabled: bool,
    /// The result is final and never changes again.
    pub settled: bool,
    /// Enough information exists to trust `enabled`.
    pub valid: bool,
}

impl ConditionState {
    /// Build a state triple.
    #[must_use]
    pub const fn new(enabled: bool, settled: bool, valid: bool) -> Self {
        Self {
            enabled,
            settled,
            valid,
        }
    }

    /// Enabled and valid.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.enabled && self.valid
    }
}

/// Callback asking the owner of a condition to re-check it.
pub type StateTrigger = Arc<dyn Fn() + Send + Sync>;

/// Shared handle to a condition.
pub type ConditionRef = Arc<dyn Condition>;

/// A node of a condition expression.
pub trait Condition: Send + Sync {
    /// Current state triple.
    fn state(&self) -> ConditionState;

    /// Whether the condition is enabled and valid.
    fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    /// Feed a job event to every leaf.
    fn evaluate(&self, event: &JobEvent);

    /// Register `trigger` under `key` on every leaf that changes without job
    /// events. Registering the same key again replaces the trigger.
    fn add_state_trigger(&self, key: &str, trigger: StateTrigger);
}
