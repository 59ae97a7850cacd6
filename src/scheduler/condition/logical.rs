use std::fmt;
use std::sync::Arc;

use super::{Condition, ConditionRef, ConditionState, StateTrigger};
use crate::scheduler::state::JobEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
    Not,
}

/// Logical combination of sub-conditions.
///
/// A child that forces the result (a disabled child of an `and`, an enabled
/// child of an `or`) latches its own `settled` and `valid` flags into the
/// result. Otherwise the result is settled (valid) once every child is.
pub struct Logical {
    operator: Operator,
    children: Vec<ConditionRef>,
}

impl Logical {
    fn force(&self, child: ConditionState, result: &mut ConditionState) {
        let forcing = match self.operator {
            Operator::And => !child.enabled,
            Operator::Or => child.enabled,
            Operator::Not => {
                result.enabled = !child.enabled;
                return;
            }
        };
        if forcing {
            result.enabled = self.operator == Operator::Or;
            result.valid |= child.valid;
            result.settled |= child.settled;
        }
    }
}

impl Condition for Logical {
    fn state(&self) -> ConditionState {
        if self.children.is_empty() {
            // Neutral element: an empty `or` can never become true.
            return ConditionState::new(self.operator != Operator::Or, true, true);
        }
        let mut result = ConditionState::new(self.operator != Operator::Or, false, false);
        let mut all_settled = true;
        let mut all_valid = true;
        for child in &self.children {
            let state = child.state();
            self.force(state, &mut result);
            all_settled &= state.settled;
            all_valid &= state.valid;
        }
        result.settled |= all_settled;
        result.valid |= all_valid;
        result
    }

    fn evaluate(&self, event: &JobEvent) {
        for child in &self.children {
            child.evaluate(event);
        }
    }

    fn add_state_trigger(&self, key: &str, trigger: StateTrigger) {
        for child in &self.children {
            child.add_state_trigger(key, Arc::clone(&trigger));
        }
    }
}

impl fmt::Debug for Logical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logical")
            .field("operator", &self.operator)
            .field("children", &self.children.len())
            .field("state", &self.state())
            .finish()
    }
}

/// Enabled once every child is enabled.
pub fn and(children: impl IntoIterator<Item = ConditionRef>) -> ConditionRef {
    Arc::new(Logical {
        operator: Operator::And,
        children: children.into_iter().collect(),
    })
}

/// Enabled once any child is enabled.
pub fn or(children: impl IntoIterator<Item = ConditionRef>) -> ConditionRef {
    Arc::new(Logical {
        operator: Operator::Or,
        children: children.into_iter().collect(),
    })
}

/// Inverts the enabled flag of `child`; `settled` and `valid` pass through.
pub fn not(child: ConditionRef) -> ConditionRef {
    Arc::new(Logical {
        operator: Operator::Not,
        children: vec![child],
    })
}

#[cfg(test)]
mod tests {
    use super::super::Explicit;
    use super::*;

    const F: bool = false;
    const T: bool = true;

    type Row = (bool, bool, bool, bool, (bool, bool, bool));

    fn run_table(combine: fn(Vec<ConditionRef>) -> ConditionRef, settle: (bool, bool), rows: &[Row]) {
        for (index, &(e1, v1, e2, v2, (re, rf, rv))) in rows.iter().enumerate() {
            let c1 = Explicit::new();
            let c2 = Explicit::new();
            let cond = combine(vec![c1.clone() as ConditionRef, c2.clone()]);
            if v1 {
                c1.set_valid();
            }
            c1.set_enabled(e1);
            if v2 {
                c2.set_valid();
            }
            c2.set_enabled(e2);
            if settle.0 {
                c1.set_settled();
            }
            if settle.1 {
                c2.set_settled();
            }
            assert_eq!(
                cond.state(),
                ConditionState::new(re, rf, rv),
                "row {index} with settled children {settle:?}"
            );
        }
    }

    fn and_of(children: Vec<ConditionRef>) -> ConditionRef {
        and(children)
    }

    fn or_of(children: Vec<ConditionRef>) -> ConditionRef {
        or(children)
    }

    #[test]
    fn test_and_non_final() {
        run_table(and_of, (F, F), &[
            (F, F, F, F, (F, F, F)),
            (F, T, F, F, (F, F, T)),
            (T, F, F, F, (F, F, F)),
            (T, T, F, F, (F, F, F)),
            (F, T, F, T, (F, F, T)),
            (F, T, T, F, (F, F, T)),
            (F, T, T, T, (F, F, T)),
            (T, F, T, F, (T, F, F)),
            (T, F, T, T, (T, F, F)),
            (T, T, T, T, (T, F, T)),
        ]);
    }

    #[test]
    fn test_and_first_final() {
        run_table(and_of, (T, F), &[
            (F, F, F, F, (F, T, F)),
            (F, T, F, F, (F, T, T)),
            (T, F, F, F, (F, F, F)),
            (T, T, F, F, (F, F, F)),
            (F, T, F, T, (F, T, T)),
            (F, T, T, F, (F, T, T)),
            (F, T, T, T, (F, T, T)),
            (T, F, T, F, (T, F, F)),
            (T, F, T, T, (T, F, F)),
            (T, T, T, T, (T, F, T)),
        ]);
    }

    #[test]
    fn test_and_second_final() {
        run_table(and_of, (F, T), &[
            (F, F, F, F, (F, T, F)),
            (F, T, F, F, (F, T, T)),
            (T, F, F, F, (F, T, F)),
            (T, T, F, F, (F, T, F)),
            (F, T, F, T, (F, T, T)),
            (F, T, T, F, (F, F, T)),
            (F, T, T, T, (F, F, T)),
            (T, F, T, F, (T, F, F)),
            (T, F, T, T, (T, F, F)),
            (T, T, T, T, (T, F, T)),
        ]);
    }

    #[test]
    fn test_and_both_final() {
        run_table(and_of, (T, T), &[
            (F, F, F, F, (F, T, F)),
            (F, T, F, F, (F, T, T)),
            (T, F, F, F, (F, T, F)),
            (T, T, F, F, (F, T, F)),
            (F, T, F, T, (F, T, T)),
            (F, T, T, F, (F, T, T)),
            (F, T, T, T, (F, T, T)),
            (T, F, T, F, (T, T, F)),
            (T, F, T, T, (T, T, F)),
            (T, T, T, T, (T, T, T)),
        ]);
    }

    #[test]
    fn test_or_non_final() {
        run_table(or_of, (F, F), &[
            (F, F, F, F, (F, F, F)),
            (F, T, F, F, (F, F, F)),
            (T, F, F, F, (T, F, F)),
            (T, T, F, F, (T, F, T)),
            (F, T, F, T, (F, F, T)),
            (F, T, T, F, (T, F, F)),
            (F, T, T, T, (T, F, T)),
            (T, F, T, F, (T, F, F)),
            (T, F, T, T, (T, F, T)),
            (T, T, T, T, (T, F, T)),
        ]);
    }

    #[test]
    fn test_or_first_final() {
        run_table(or_of, (T, F), &[
            (F, F, F, F, (F, F, F)),
            (F, T, F, F, (F, F, F)),
            (T, F, F, F, (T, T, F)),
            (T, T, F, F, (T, T, T)),
            (F, T, F, T, (F, F, T)),
            (F, T, T, F, (T, F, F)),
            (F, T, T, T, (T, F, T)),
            (T, F, T, F, (T, T, F)),
            (T, F, T, T, (T, T, T)),
            (T, T, T, T, (T, T, T)),
        ]);
    }

    #[test]
    fn test_or_second_final() {
        run_table(or_of, (F, T), &[
            (F, F, F, F, (F, F, F)),
            (F, T, F, F, (F, F, F)),
            (T, F, F, F, (T, F, F)),
            (T, T, F, F, (T, F, T)),
            (F, T, F, T, (F, F, T)),
            (F, T, T, F, (T, T, F)),
            (F, T, T, T, (T, T, T)),
            (T, F, T, F, (T, T, F)),
            (T, F, T, T, (T, T, T)),
            (T, T, T, T, (T, T, T)),
        ]);
    }

    #[test]
    fn test_or_both_final() {
        run_table(or_of, (T, T), &[
            (F, F, F, F, (F, T, F)),
            (F, T, F, F, (F, T, F)),
            (T, F, F, F, (T, T, F)),
            (T, T, F, F, (T, T, T)),
            (F, T, F, T, (F, T, T)),
            (F, T, T, F, (T, T, F)),
            (F, T, T, T, (T, T, T)),
            (T, F, T, F, (T, T, F)),
            (T, F, T, T, (T, T, T)),
            (T, T, T, T, (T, T, T)),
        ]);
    }

    #[test]
    fn test_not_table() {
        let rows = [
            (F, F, F, (T, F, F)),
            (F, F, T, (T, T, F)),
            (F, T, F, (T, F, T)),
            (F, T, T, (T, T, T)),
            (T, F, F, (F, F, F)),
            (T, F, T, (F, T, F)),
            (T, T, F, (F, F, T)),
            (T, T, T, (F, T, T)),
        ];
        for (e, v, f, (re, rf, rv)) in rows {
            let child = Explicit::new();
            let cond = not(child.clone());
            if v {
                child.set_valid();
            }
            child.set_enabled(e);
            if f {
                child.set_settled();
            }
            assert_eq!(cond.state(), ConditionState::new(re, rf, rv));
        }
    }

    #[test]
    fn test_empty_combinations() {
        assert!(and(Vec::new()).is_enabled());
        let empty_or = or(Vec::new()).state();
        assert!(!empty_or.enabled);
        assert!(empty_or.settled);
    }
}
