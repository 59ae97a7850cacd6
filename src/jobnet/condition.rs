use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::anyhow;

use super::NetContext;
use crate::core::error::AppResult;
use crate::scheduler::condition::{self, ConditionRef};
use crate::scheduler::State;

/// State check of a job-state leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCheck {
    /// The job entered the given state.
    Reached(State),
    /// The job is done or discarded.
    Finished,
}

/// Condition of a net job, naming jobs and explicit conditions symbolically.
///
/// Names are resolved against the jobs created for one net instance when
/// the instance runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCondition {
    /// Explicit condition declared on the net.
    Explicit(String),
    /// State of another job of the net.
    JobState {
        /// Name of the job.
        job: String,
        /// State check.
        check: JobCheck,
    },
    /// All children enabled.
    And(Vec<NetCondition>),
    /// Any child enabled.
    Or(Vec<NetCondition>),
    /// Child not enabled.
    Not(Box<NetCondition>),
}

impl NetCondition {
    /// Collect the job and explicit condition names referred to.
    pub(crate) fn references(&self, jobs: &mut BTreeSet<String>, conditions: &mut BTreeSet<String>) {
        match self {
            Self::Explicit(name) => {
                conditions.insert(name.clone());
            }
            Self::JobState { job, .. } => {
                jobs.insert(job.clone());
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.references(jobs, conditions);
                }
            }
            Self::Not(child) => child.references(jobs, conditions),
        }
    }

    /// Build the concrete condition for a net instance.
    pub(crate) fn create(&self, ctx: &NetContext) -> AppResult<ConditionRef> {
        Ok(match self {
            Self::Explicit(name) => {
                let explicit = ctx
                    .condition(name)
                    .ok_or_else(|| anyhow!("unknown explicit condition {name}"))?;
                Arc::clone(explicit) as ConditionRef
            }
            Self::JobState { job: name, check } => {
                let job = ctx
                    .job(name)
                    .ok_or_else(|| anyhow!("job {name} not created yet"))?;
                match check {
                    JobCheck::Reached(state) => condition::job_state_reached(job, *state),
                    JobCheck::Finished => condition::job_finished(job),
                }
            }
            Self::And(children) => condition::and(Self::create_all(children, ctx)?),
            Self::Or(children) => condition::or(Self::create_all(children, ctx)?),
            Self::Not(child) => condition::not(child.create(ctx)?),
        })
    }

    fn create_all(children: &[Self], ctx: &NetContext) -> AppResult<Vec<ConditionRef>> {
        children.iter().map(|child| child.create(ctx)).collect()
    }
}

/// Explicit condition declared on the net under `name`.
pub fn explicit(name: impl Into<String>) -> NetCondition {
    NetCondition::Explicit(name.into())
}

/// Enabled once job `name` entered `state`.
pub fn job_state_reached(name: impl Into<String>, state: State) -> NetCondition {
    NetCondition::JobState {
        job: name.into(),
        check: JobCheck::Reached(state),
    }
}

/// Enabled once job `name` is done or discarded.
pub fn job_finished(name: impl Into<String>) -> NetCondition {
    NetCondition::JobState {
        job: name.into(),
        check: JobCheck::Finished,
    }
}

/// Enabled once job `name` is done.
pub fn job_done(name: impl Into<String>) -> NetCondition {
    job_state_reached(name, State::Done)
}

/// Enabled once job `name` failed.
pub fn job_failed(name: impl Into<String>) -> NetCondition {
    job_state_reached(name, State::Failed)
}

/// Enabled once job `name` was discarded.
pub fn job_discarded(name: impl Into<String>) -> NetCondition {
    job_state_reached(name, State::Discarded)
}

/// All of `conditions`.
pub fn and(conditions: impl IntoIterator<Item = NetCondition>) -> NetCondition {
    NetCondition::And(conditions.into_iter().collect())
}

/// Any of `conditions`.
pub fn or(conditions: impl IntoIterator<Item = NetCondition>) -> NetCondition {
    NetCondition::Or(conditions.into_iter().collect())
}

/// Negation of `condition`.
pub fn not(condition: NetCondition) -> NetCondition {
    NetCondition::Not(Box::new(condition))
}

/// Every named job finished.
pub fn depends_on<I, S>(names: I) -> NetCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    and(names.into_iter().map(job_finished))
}

/// Any named job discarded.
pub fn discard_on<I, S>(names: I) -> NetCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    or(names.into_iter().map(job_discarded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_are_collected() {
        let cond = and([
            depends_on(["a", "b"]),
            not(explicit("go")),
            discard_on(["c"]),
        ]);
        let mut jobs = BTreeSet::new();
        let mut conditions = BTreeSet::new();
        cond.references(&mut jobs, &mut conditions);
        assert_eq!(jobs.into_iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(conditions.into_iter().collect::<Vec<_>>(), vec!["go"]);
    }
}
