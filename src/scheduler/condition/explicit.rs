use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Condition, ConditionState, StateTrigger};
use crate::scheduler::state::JobEvent;

#[derive(Default)]
struct ExplicitState {
    value: ConditionState,
    triggers: BTreeMap<String, StateTrigger>,
}

/// Condition leaf set from outside the scheduler.
///
/// Starts as `{enabled: false, settled: false, valid: false}`.
#[derive(Default)]
pub struct Explicit {
    state: Mutex<ExplicitState>,
}

impl Explicit {
    /// Create an unset explicit condition.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the final value. The condition becomes settled and valid.
    ///
    /// # Panics
    ///
    /// Panics if the condition is already settled.
    pub fn enable(&self, enabled: bool) {
        self.update(|value| {
            assert!(!value.settled, "explicit condition is final");
            *value = ConditionState::new(enabled, true, true);
        });
    }

    /// Change the enabled flag without settling the condition.
    ///
    /// # Panics
    ///
    /// Panics if the condition is already settled.
    pub fn set_enabled(&self, enabled: bool) {
        self.update(|value| {
            assert!(!value.settled, "explicit condition is final");
            value.enabled = enabled;
        });
    }

    /// Mark the value as valid.
    pub fn set_valid(&self) {
        self.update(|value| value.valid = true);
    }

    /// Mark the value as final.
    pub fn set_settled(&self) {
        self.update(|value| value.settled = true);
    }

    fn update(&self, change: impl FnOnce(&mut ConditionState)) {
        let triggers: Vec<StateTrigger> = {
            let mut state = self.state.lock();
            change(&mut state.value);
            state.triggers.values().cloned().collect()
        };
        for trigger in triggers {
            trigger();
        }
    }
}

impl Condition for Explicit {
    fn state(&self) -> ConditionState {
        self.state.lock().value
    }

    fn evaluate(&self, _event: &JobEvent) {}

    fn add_state_trigger(&self, key: &str, trigger: StateTrigger) {
        self.state.lock().triggers.insert(key.to_owned(), trigger);
    }
}

impl fmt::Debug for Explicit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explicit")
            .field("state", &self.state())
            .finish()
    }
}
