//! Job definitions: the immutable recipe a job is instantiated from.

use std::fmt;
use std::sync::Arc;

use crate::core::error::AppResult;
use crate::scheduler::condition::ConditionRef;
use crate::scheduler::context::SchedulingContext;
use crate::scheduler::extension::ExtensionDefinition;
use crate::scheduler::state::JobEvent;
use crate::util::types::Priority;

/// Value produced by a successful runner.
pub type JobResult = serde_json::Value;

/// The work a job performs.
pub trait Runner: Send + Sync {
    /// Execute the job.
    ///
    /// # Errors
    ///
    /// An error moves the job to `FAILED`.
    fn run(&self, ctx: &mut SchedulingContext) -> AppResult<JobResult>;
}

struct RunnerFn<F>(F);

impl<F> Runner for RunnerFn<F>
where
    F: Fn(&mut SchedulingContext) -> AppResult<JobResult> + Send + Sync,
{
    fn run(&self, ctx: &mut SchedulingContext) -> AppResult<JobResult> {
        (self.0)(ctx)
    }
}

/// Wrap a closure as a [`Runner`].
pub fn runner_fn<F>(f: F) -> Arc<dyn Runner>
where
    F: Fn(&mut SchedulingContext) -> AppResult<JobResult> + Send + Sync + 'static,
{
    Arc::new(RunnerFn(f))
}

/// Observer of job state changes.
pub trait EventHandler: Send + Sync {
    /// Called once per state change, in order, on a dedicated thread.
    fn handle_job_event(&self, event: &JobEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&JobEvent) + Send + Sync,
{
    fn handle_job_event(&self, event: &JobEvent) {
        self(event);
    }
}

/// Shared handle to an event handler.
pub type HandlerRef = Arc<dyn EventHandler>;

/// Recipe for a job.
///
/// Setters return an updated copy; a definition can be applied any number of
/// times.
#[derive(Clone)]
pub struct JobDefinition {
    name: String,
    runner: Option<Arc<dyn Runner>>,
    condition: Option<ConditionRef>,
    discard_condition: Option<ConditionRef>,
    priority: Option<Priority>,
    handlers: Vec<HandlerRef>,
    extension: Option<Arc<dyn ExtensionDefinition>>,
}

/// Define a job running `runner`.
pub fn define_job<F>(name: impl Into<String>, runner: F) -> JobDefinition
where
    F: Fn(&mut SchedulingContext) -> AppResult<JobResult> + Send + Sync + 'static,
{
    JobDefinition::new(name).with_runner(runner_fn(runner))
}

impl JobDefinition {
    /// A definition without runner. Its jobs finish immediately with a null
    /// result once they start.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runner: None,
            condition: None,
            discard_condition: None,
            priority: None,
            handlers: Vec::new(),
            extension: None,
        }
    }

    /// Name, used as id prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The runner, if any.
    #[must_use]
    pub fn runner(&self) -> Option<&Arc<dyn Runner>> {
        self.runner.as_ref()
    }

    /// Start condition. Without one a scheduled job is pending at once.
    #[must_use]
    pub fn condition(&self) -> Option<&ConditionRef> {
        self.condition.as_ref()
    }

    /// Discard condition.
    #[must_use]
    pub fn discard_condition(&self) -> Option<&ConditionRef> {
        self.discard_condition.as_ref()
    }

    /// Explicitly set priority. Unset means the scheduler default.
    #[must_use]
    pub const fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Handlers attached to every job of this definition.
    #[must_use]
    pub fn handlers(&self) -> &[HandlerRef] {
        &self.handlers
    }

    /// Extension settings.
    #[must_use]
    pub fn extension(&self) -> Option<&Arc<dyn ExtensionDefinition>> {
        self.extension.as_ref()
    }

    /// Copy with another name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy with another runner.
    #[must_use]
    pub fn with_runner(&self, runner: Arc<dyn Runner>) -> Self {
        Self {
            runner: Some(runner),
            ..self.clone()
        }
    }

    /// Copy with a start condition.
    #[must_use]
    pub fn with_condition(&self, condition: ConditionRef) -> Self {
        Self {
            condition: Some(condition),
            ..self.clone()
        }
    }

    /// Copy with a discard condition.
    #[must_use]
    pub fn with_discard_condition(&self, condition: ConditionRef) -> Self {
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

    pub(crate) fn set_condition(&mut self, condition: Option<ConditionRef>) {
        self.condition = condition;
    }

    pub(crate) fn set_discard_condition(&mut self, condition: Option<ConditionRef>) {
        self.discard_condition = condition;
    }

    pub(crate) fn set_priority(&mut self, priority: Option<Priority>) {
        self.priority = priority;
    }

    pub(crate) fn set_handlers(&mut self, handlers: Vec<HandlerRef>) {
        self.handlers = handlers;
    }

    pub(crate) fn set_extension(&mut self, extension: Option<Arc<dyn ExtensionDefinition>>) {
        self.extension = extension;
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("runner", &self.runner.is_some())
            .field("condition", &self.condition.is_some())
            .field("discard_condition", &self.discard_condition.is_some())
            .field("priority", &self.priority)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
