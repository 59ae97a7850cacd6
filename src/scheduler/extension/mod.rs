//! Scheduler extensions.
//!
//! An [`Extension`] is installed on a scheduler and creates one
//! [`JobExtension`] per job. Job extensions observe the lifecycle of their job
//! (`start`, `set_state`, `close`) and provide the writer job output goes to.
//!
//! Extensions form an explicit decorator chain: every hook defaults to
//! delegating to the nested extension, and [`find_extension`] walks the chain
//! looking for a concrete type. Job definitions carry a parallel chain of
//! [`ExtensionDefinition`]s searched with [`find_definition`].

use std::any::Any;
use std::sync::Arc;

mod buffered;
mod writer;

pub use buffered::{BufferedExtension, BufferedJobExtension};
pub use writer::{WriterDefinition, WriterExtension, WriterJobExtension};

use crate::core::error::SchedulerError;
use crate::scheduler::definition::JobDefinition;
use crate::scheduler::job::Job;
use crate::scheduler::output::SharedWriter;
use crate::scheduler::state::State;
use crate::scheduler::Scheduler;

/// Per-definition extension settings.
pub trait ExtensionDefinition: Any + Send + Sync {
    /// The wrapped definition, if this one decorates another.
    fn nested(&self) -> Option<&Arc<dyn ExtensionDefinition>> {
        None
    }

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Search a definition chain for a `T`.
pub fn find_definition<T: ExtensionDefinition>(definition: &dyn ExtensionDefinition) -> Option<&T> {
    let mut current = Some(definition);
    while let Some(def) = current {
        if let Some(found) = def.as_any().downcast_ref::<T>() {
            return Some(found);
        }
        current = def.nested().map(|nested| &**nested);
    }
    None
}

/// Scheduler-wide extension creating the per-job extensions.
pub trait Extension: Send + Sync {
    /// Called once when the extension is installed on `scheduler`.
    ///
    /// # Errors
    ///
    /// An error rejects the installation.
    fn setup(&self, scheduler: &Scheduler) -> Result<(), SchedulerError> {
        let _ = scheduler;
        Ok(())
    }

    /// Create the job extension for a job being applied.
    ///
    /// # Errors
    ///
    /// An error rejects the job.
    fn job_extension(
        &self,
        id: &str,
        definition: &JobDefinition,
        parent: Option<&Job>,
    ) -> Result<Box<dyn JobExtension>, SchedulerError>;
}

/// Per-job lifecycle observer.
///
/// `start` and `set_state` run while the job's state is being changed and
/// must not call back into the job.
pub trait JobExtension: Any + Send + Sync {
    /// The wrapped job extension, if this one decorates another.
    fn nested(&self) -> Option<&dyn JobExtension> {
        None
    }

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Writer the job's output goes to.
    fn writer(&self) -> SharedWriter {
        self.nested().map_or_else(SharedWriter::stdout, |nested| nested.writer())
    }

    /// The job's runner is about to start for the first time.
    fn start(&self) {
        if let Some(nested) = self.nested() {
            nested.start();
        }
    }

    /// The job entered `state`.
    fn set_state(&self, state: State) {
        if let Some(nested) = self.nested() {
            nested.set_state(state);
        }
    }

    /// The job reached a terminal state and every event was delivered.
    ///
    /// # Errors
    ///
    /// Failures are logged by the scheduler and otherwise ignored.
    fn close(&self) -> Result<(), SchedulerError> {
        self.nested().map_or(Ok(()), |nested| nested.close())
    }
}

/// Search a job extension chain for a `T`.
pub fn find_extension<T: JobExtension>(extension: &dyn JobExtension) -> Option<&T> {
    let mut current = Some(extension);
    while let Some(ext) = current {
        if let Some(found) = ext.as_any().downcast_ref::<T>() {
            return Some(found);
        }
        current = ext.nested();
    }
    None
}

/// Extension used when none is installed: all job output goes to one writer.
#[derive(Debug, Clone)]
pub struct DefaultExtension {
    writer: SharedWriter,
}

impl DefaultExtension {
    /// Send all job output to `writer`.
    #[must_use]
    pub const fn new(writer: SharedWriter) -> Self {
        Self { writer }
    }
}

impl Default for DefaultExtension {
    fn default() -> Self {
        Self::new(SharedWriter::stdout())
    }
}

impl Extension for DefaultExtension {
    fn job_extension(
        &self,
        _id: &str,
        _definition: &JobDefinition,
        _parent: Option<&Job>,
    ) -> Result<Box<dyn JobExtension>, SchedulerError> {
        Ok(Box::new(DefaultJobExtension {
            writer: self.writer.clone(),
        }))
    }
}

/// Job extension created by [`DefaultExtension`].
#[derive(Debug)]
pub struct DefaultJobExtension {
    writer: SharedWriter,
}

impl JobExtension for DefaultJobExtension {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }
}
