use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context as _;
use serde_json::Value;
use tracing::debug;

use super::condition::NetCondition;
use super::order::order;
use super::NetContext;
use crate::core::error::{AppResult, NetError, NetProblem};
use crate::scheduler::condition::{ConditionRef, Explicit};
use crate::scheduler::extension::ExtensionDefinition;
use crate::scheduler::{
    EventHandler, HandlerRef, Job, JobDefinition, JobResult, Runner, Scheduler, SchedulingContext,
};
use crate::util::types::Priority;

/// Creates the runner of a net job for one net instance.
pub trait RunnerFactory: Send + Sync {
    /// Build the runner. `ctx` holds the jobs created so far.
    fn create_runner(&self, ctx: &NetContext) -> Arc<dyn Runner>;
}

impl<F> RunnerFactory for F
where
    F: Fn(&NetContext) -> Arc<dyn Runner> + Send + Sync,
{
    fn create_runner(&self, ctx: &NetContext) -> Arc<dyn Runner> {
        self(ctx)
    }
}

/// Template of a job inside a [`Net`].
#[derive(Clone)]
pub struct NetJob {
    name: String,
    runner: Option<Arc<dyn RunnerFactory>>,
    condition: Option<NetCondition>,
    discard_condition: Option<NetCondition>,
    priority: Option<Priority>,
    handlers: Vec<HandlerRef>,
    extension: Option<Arc<dyn ExtensionDefinition>>,
}

/// Define a net job without runner.
pub fn net_job(name: impl Into<String>) -> NetJob {
    NetJob {
        name: name.into(),
        runner: None,
        condition: None,
        discard_condition: None,
        priority: None,
        handlers: Vec::new(),
        extension: None,
    }
}

impl NetJob {
    /// Name, unique within the net.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start condition.
    #[must_use]
    pub const fn condition(&self) -> Option<&NetCondition> {
        self.condition.as_ref()
    }

    /// Discard condition.
    #[must_use]
    pub const fn discard_condition(&self) -> Option<&NetCondition> {
        self.discard_condition.as_ref()
    }

    /// Copy using `factory` to build the runner per instance.
    #[must_use]
    pub fn with_runner_factory(&self, factory: impl RunnerFactory + 'static) -> Self {
        Self {
            runner: Some(Arc::new(factory)),
            ..self.clone()
        }
    }

    /// Copy sharing `runner` between all instances.
    #[must_use]
    pub fn with_runner(&self, runner: Arc<dyn Runner>) -> Self {
        self.with_runner_factory(move |_: &NetContext| Arc::clone(&runner))
    }

    /// Copy with a start condition.
    #[must_use]
    pub fn with_condition(&self, condition: NetCondition) -> Self {
        Self {
            condition: Some(condition),
            ..self.clone()
        }
    }

    /// Copy with a discard condition.
    #[must_use]
    pub fn with_discard_condition(&self, condition: NetCondition) -> Self {
        Self {
            discard_condition: Some(condition),
            ..self.clone()
        }
    }

    /// Copy with a priority.
    #[must_use]
    pub fn with_priority(&self, priority: impl Into<Priority>) -> Self {
        Self {
            priority: Some(priority.into()),
            ..self.clone()
        }
    }

    /// Copy with an additional handler.
    #[must_use]
    pub fn add_handler(&self, handler: impl EventHandler + 'static) -> Self {
        let mut next = self.clone();
        next.handlers.push(Arc::new(handler));
        next
    }

    /// Copy with extension settings.
    #[must_use]
    pub fn with_extension(&self, extension: Arc<dyn ExtensionDefinition>) -> Self {
        Self {
            extension: Some(extension),
            ..self.clone()
        }
    }

    fn definition(&self, ctx: &NetContext) -> AppResult<JobDefinition> {
        let mut definition = JobDefinition::new(self.name.clone());
        if let Some(factory) = &self.runner {
            definition = definition.with_runner(factory.create_runner(ctx));
        }
        definition.set_condition(
            self.condition
                .as_ref()
                .map(|c| c.create(ctx))
                .transpose()
                .with_context(|| format!("condition of {}", self.name))?,
        );
        definition.set_discard_condition(
            self.discard_condition
                .as_ref()
                .map(|c| c.create(ctx))
                .transpose()
                .with_context(|| format!("discard condition of {}", self.name))?,
        );
        definition.set_priority(self.priority);
        definition.set_extension(self.extension.clone());
        definition.set_handlers(self.handlers.clone());
        Ok(definition)
    }
}

impl fmt::Debug for NetJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetJob")
            .field("name", &self.name)
            .field("condition", &self.condition)
            .field("discard_condition", &self.discard_condition)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A named DAG of job templates run as one composite job.
///
/// Jobs refer to each other by name in their conditions. [`Net::for_payload`]
/// validates the net and yields a definition whose runner instantiates every
/// job as a child, in dependency order, schedules them, and waits for all of
/// them.
#[derive(Clone)]
pub struct Net {
    name: String,
    jobs: BTreeMap<String, NetJob>,
    conditions: BTreeMap<String, Arc<Explicit>>,
    condition: Option<ConditionRef>,
    discard_condition: Option<ConditionRef>,
    priority: Option<Priority>,
    extension: Option<Arc<dyn ExtensionDefinition>>,
}

/// Define an empty net.
pub fn define_net(name: impl Into<String>) -> Net {
    Net {
        name: name.into(),
        jobs: BTreeMap::new(),
        conditions: BTreeMap::new(),
        condition: None,
        discard_condition: None,
        priority: None,
        extension: None,
    }
}

impl Net {
    /// Name of the net and of its composite jobs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Templates by name.
    #[must_use]
    pub const fn jobs(&self) -> &BTreeMap<String, NetJob> {
        &self.jobs
    }

    /// Copy with `job` added, replacing a job of the same name.
    #[must_use]
    pub fn add_job(&self, job: NetJob) -> Self {
        let mut next = self.clone();
        next.jobs.insert(job.name.clone(), job);
        next
    }

    /// Copy declaring the explicit condition `name`.
    ///
    /// Every instance of the net shares the condition object.
    #[must_use]
    pub fn add_condition(&self, name: impl Into<String>, condition: Arc<Explicit>) -> Self {
        let mut next = self.clone();
        next.conditions.insert(name.into(), condition);
        next
    }

    /// Copy with a start condition for the composite job.
    #[must_use]
    pub fn with_condition(&self, condition: ConditionRef) -> Self {
        Self {
            condition: Some(condition),
            ..self.clone()
        }
    }

    /// Copy with a discard condition for the composite job.
    #[must_use]
    pub fn with_discard_condition(&self, condition: ConditionRef) -> Self {
        Self {
            discard_condition: Some(condition),
            ..self.clone()
        }
    }

    /// Copy with a priority for the composite job.
    #[must_use]
    pub fn with_priority(&self, priority: impl Into<Priority>) -> Self {
        Self {
            priority: Some(priority.into()),
            ..self.clone()
        }
    }

    /// Copy with extension settings for the composite job.
    #[must_use]
    pub fn with_extension(&self, extension: Arc<dyn ExtensionDefinition>) -> Self {
        Self {
            extension: Some(extension),
            ..self.clone()
        }
    }

    /// Check every reference and reject cycles.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<(), NetError> {
        self.order().map(drop)
    }

    /// Job names in creation order: every job after the jobs its conditions
    /// refer to.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Invalid`] listing every problem found.
    pub fn order(&self) -> Result<Vec<String>, NetError> {
        let mut problems = Vec::new();
        let mut depends = BTreeMap::new();
        for (name, job) in &self.jobs {
            let mut jobs = BTreeSet::new();
            let mut conditions = BTreeSet::new();
            for condition in [&job.condition, &job.discard_condition].into_iter().flatten() {
                condition.references(&mut jobs, &mut conditions);
            }
            for reference in conditions {
                if !self.conditions.contains_key(&reference) {
                    problems.push(NetProblem::UnknownCondition {
                        job: name.clone(),
                        reference,
                    });
                }
            }
            let (known, unknown): (BTreeSet<_>, BTreeSet<_>) =
                jobs.into_iter().partition(|r| self.jobs.contains_key(r));
            problems.extend(unknown.into_iter().map(|reference| NetProblem::UnknownJob {
                job: name.clone(),
                reference,
            }));
            depends.insert(name.clone(), known);
        }
        let (ordered, cycles) = order(&depends);
        problems.extend(cycles.into_iter().map(NetProblem::Cycle));
        if problems.is_empty() {
            Ok(ordered)
        } else {
            let err = NetError::Invalid {
                net: self.name.clone(),
                problems,
            };
            debug!(net = %self.name, error = %err, "Job net rejected");
            Err(err)
        }
    }

    /// Validate the net and build the definition of a composite job running
    /// one instance with `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Invalid`] if validation fails.
    pub fn for_payload(&self, payload: Value) -> Result<JobDefinition, NetError> {
        let ordered = self.order()?;
        let runner = NetRunner {
            net: self.clone(),
            ordered,
            payload,
        };
        let mut definition = JobDefinition::new(self.name.clone()).with_runner(Arc::new(runner));
        definition.set_condition(self.condition.clone());
        definition.set_discard_condition(self.discard_condition.clone());
        definition.set_priority(self.priority);
        definition.set_extension(self.extension.clone());
        Ok(definition)
    }
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("name", &self.name)
            .field("jobs", &self.jobs)
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

struct NetRunner {
    net: Net,
    ordered: Vec<String>,
    payload: Value,
}

impl NetRunner {
    fn instantiate(&self, ctx: &mut SchedulingContext, net_ctx: &mut NetContext) -> AppResult<()> {
        let scheduler: Scheduler = ctx.scheduler().clone();
        let parent: Job = ctx.job().clone();
        for name in &self.ordered {
            writeln!(ctx, "creating job {name}")?;
            let template = self
                .net
                .jobs
                .get(name)
                .with_context(|| format!("job {name} missing from net {}", self.net.name))?;
            let definition = template.definition(net_ctx)?;
            let job = scheduler
                .apply(&definition, Some(&parent))
                .with_context(|| format!("cannot apply job {name}"))?;
            net_ctx.jobs.insert(name.clone(), job);
        }
        Ok(())
    }

    fn execute(ctx: &mut SchedulingContext, net_ctx: &NetContext) -> AppResult<()> {
        for (name, job) in &net_ctx.jobs {
            writeln!(ctx, "scheduling job {name}")?;
            job.schedule()?;
        }
        writeln!(ctx, "waiting for net jobs")?;
        for job in net_ctx.jobs.values() {
            job.wait_context(ctx.context())?;
        }
        Ok(())
    }
}

impl Runner for NetRunner {
    fn run(&self, ctx: &mut SchedulingContext) -> AppResult<JobResult> {
        let mut net_ctx = NetContext {
            payload: self.payload.clone(),
            jobs: BTreeMap::new(),
            conditions: self.net.conditions.clone(),
        };
        if let Err(err) = self
            .instantiate(ctx, &mut net_ctx)
            .and_then(|()| Self::execute(ctx, &net_ctx))
        {
            // Unscheduled or waiting jobs would keep the net job a zombie.
            for job in net_ctx.jobs.values() {
                job.cancel();
            }
            return Err(err);
        }
        let summary = net_ctx
            .jobs
            .iter()
            .map(|(name, job)| (name.clone(), Value::from(job.state().as_str())))
            .collect();
        Ok(Value::Object(summary))
    }
}
