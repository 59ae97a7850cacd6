use std::any::Any;
use std::sync::Arc;

use super::{find_definition, Extension, ExtensionDefinition, JobExtension};
use crate::core::error::SchedulerError;
use crate::scheduler::definition::JobDefinition;
use crate::scheduler::job::Job;
use crate::scheduler::output::SharedWriter;
use crate::scheduler::Scheduler;

/// Definition setting routing a job's output to a dedicated writer.
pub struct WriterDefinition {
    writer: SharedWriter,
    nested: Option<Arc<dyn ExtensionDefinition>>,
}

impl WriterDefinition {
    /// Route output to `writer`.
    #[must_use]
    pub const fn new(writer: SharedWriter) -> Self {
        Self {
            writer,
            nested: None,
        }
    }

    /// Decorate another definition.
    #[must_use]
    pub fn with_nested(mut self, nested: Arc<dyn ExtensionDefinition>) -> Self {
        self.nested = Some(nested);
        self
    }

    /// The configured writer.
    #[must_use]
    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }
}

impl ExtensionDefinition for WriterDefinition {
    fn nested(&self) -> Option<&Arc<dyn ExtensionDefinition>> {
        self.nested.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Extension honouring [`WriterDefinition`]s.
///
/// Jobs without a writer definition use the writer of the nested extension,
/// or stdout when there is none.
#[derive(Default)]
pub struct WriterExtension {
    nested: Option<Arc<dyn Extension>>,
}

impl WriterExtension {
    /// Create a standalone writer extension.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decorate `nested`.
    #[must_use]
    pub fn wrapping(nested: Arc<dyn Extension>) -> Self {
        Self {
            nested: Some(nested),
        }
    }
}

impl Extension for WriterExtension {
    fn setup(&self, scheduler: &Scheduler) -> Result<(), SchedulerError> {
        self.nested
            .as_ref()
            .map_or(Ok(()), |nested| nested.setup(scheduler))
    }

    fn job_extension(
        &self,
        id: &str,
        definition: &JobDefinition,
        parent: Option<&Job>,
    ) -> Result<Box<dyn JobExtension>, SchedulerError> {
        let nested = self
            .nested
            .as_ref()
            .map(|nested| nested.job_extension(id, definition, parent))
            .transpose()?;
        let writer = definition
            .extension()
            .and_then(|def| find_definition::<WriterDefinition>(def.as_ref()))
            .map(WriterDefinition::writer)
            .or_else(|| nested.as_ref().map(|nested| nested.writer()))
            .unwrap_or_else(SharedWriter::stdout);
        Ok(Box::new(WriterJobExtension { writer, nested }))
    }
}

/// Job extension created by [`WriterExtension`].
pub struct WriterJobExtension {
    writer: SharedWriter,
    nested: Option<Box<dyn JobExtension>>,
}

impl JobExtension for WriterJobExtension {
    fn nested(&self) -> Option<&dyn JobExtension> {
        self.nested.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }
}
