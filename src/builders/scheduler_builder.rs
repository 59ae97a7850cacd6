//! Builder to construct a scheduler from configuration.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::error::SchedulerError;
use crate::scheduler::extension::Extension;
use crate::scheduler::Scheduler;
use crate::util::types::Priority;

/// Assembles a [`Scheduler`] with its processors and extension.
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    extension: Option<Arc<dyn Extension>>,
}

impl SchedulerBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `config`.
    #[must_use]
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            extension: None,
        }
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Number of processors added before the scheduler is returned.
    #[must_use]
    pub const fn processors(mut self, processors: usize) -> Self {
        self.config.processors = processors;
        self
    }

    /// Priority of jobs whose definition sets none.
    #[must_use]
    pub const fn default_priority(mut self, priority: Priority) -> Self {
        self.config.default_priority = priority;
        self
    }

    /// Extension installed on the scheduler.
    #[must_use]
    pub fn extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extension = Some(extension);
        self
    }

    /// The configuration collected so far.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate the configuration and build a stopped scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] for invalid configuration and the
    /// extension's error if its setup fails.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config.validate().map_err(SchedulerError::Config)?;
        let name = self
            .config
            .name
            .clone()
            .unwrap_or_else(|| format!("scheduler-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]));
        let scheduler = Scheduler::with_priority(name, self.config.default_priority);
        if let Some(extension) = self.extension {
            scheduler.set_extension(extension)?;
        }
        scheduler.add_processors(self.config.processors);
        Ok(scheduler)
    }
}
