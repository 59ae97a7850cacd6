use std::any::Any;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::{Extension, JobExtension};
use crate::core::error::SchedulerError;
use crate::scheduler::definition::JobDefinition;
use crate::scheduler::job::Job;
use crate::scheduler::output::{OutputBuffer, SharedWriter};
use crate::scheduler::state::State;
use crate::scheduler::Scheduler;

struct Block {
    id: String,
    gap: String,
    buffer: OutputBuffer,
    state: Mutex<State>,
    done: AtomicBool,
}

impl Block {
    fn render(&self) -> String {
        let mut text = format!("{}- JOB {} {}\n", self.gap, self.id, *self.state.lock());
        let body = self.buffer.contents();
        let body = body.strip_suffix('\n').unwrap_or(&body);
        if !body.is_empty() {
            let indent = format!("{}  ", self.gap);
            text.push_str(&indent);
            text.push_str(&body.replace('\n', &format!("\n{indent}")));
            text.push('\n');
        }
        text
    }
}

struct Blocks {
    target: SharedWriter,
    pending: Mutex<VecDeque<Arc<Block>>>,
}

impl Blocks {
    // Emit the finished blocks at the head; a running job holds back every
    // block created after it.
    fn flush(&self) {
        let mut pending = self.pending.lock();
        let mut target = self.target.clone();
        while pending.front().is_some_and(|b| b.done.load(Ordering::Acquire)) {
            let Some(block) = pending.pop_front() else {
                break;
            };
            if let Err(err) = target.write_all(block.render().as_bytes()) {
                warn!(job = %block.id, error = %err, "Writing buffered job output failed");
            }
        }
    }
}

/// Extension buffering every job's output.
///
/// Output is emitted in job-creation order once a job reaches a terminal
/// state, headed by `- JOB <id> <state>` and indented by nesting depth.
pub struct BufferedExtension {
    blocks: Arc<Blocks>,
    nested: Option<Arc<dyn Extension>>,
}

impl BufferedExtension {
    /// Emit buffered output to `target`.
    #[must_use]
    pub fn new(target: SharedWriter) -> Self {
        Self {
            blocks: Arc::new(Blocks {
                target,
                pending: Mutex::new(VecDeque::new()),
            }),
            nested: None,
        }
    }

    /// Decorate `nested`.
    #[must_use]
    pub fn wrapping(mut self, nested: Arc<dyn Extension>) -> Self {
        self.nested = Some(nested);
        self
    }

    /// Number of blocks not emitted yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.blocks.pending.lock().len()
    }
}

impl Extension for BufferedExtension {
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
        let gap = parent
            .and_then(|p| p.extension::<BufferedJobExtension>())
            .map(|p| format!("{}  ", p.block.gap))
            .unwrap_or_default();
        let block = Arc::new(Block {
            id: id.to_owned(),
            gap,
            buffer: OutputBuffer::new(),
            state: Mutex::new(State::Initial),
            done: AtomicBool::new(false),
        });
        self.blocks.pending.lock().push_back(Arc::clone(&block));
        Ok(Box::new(BufferedJobExtension {
            block,
            blocks: Arc::clone(&self.blocks),
            nested,
        }))
    }
}

/// Job extension created by [`BufferedExtension`].
pub struct BufferedJobExtension {
    block: Arc<Block>,
    blocks: Arc<Blocks>,
    nested: Option<Box<dyn JobExtension>>,
}

impl BufferedJobExtension {
    /// Indentation of this job's block.
    #[must_use]
    pub fn gap(&self) -> &str {
        &self.block.gap
    }

    /// Output buffered so far.
    #[must_use]
    pub fn buffered(&self) -> String {
        self.block.buffer.contents()
    }
}

impl JobExtension for BufferedJobExtension {
    fn nested(&self) -> Option<&dyn JobExtension> {
        self.nested.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn writer(&self) -> SharedWriter {
        self.block.buffer.writer()
    }

    fn set_state(&self, state: State) {
        *self.block.state.lock() = state;
        if let Some(nested) = &self.nested {
            nested.set_state(state);
        }
        if state.is_terminal() {
            self.block.done.store(true, Ordering::Release);
            self.blocks.flush();
        }
    }
}
