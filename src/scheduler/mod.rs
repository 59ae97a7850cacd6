//! Dependency-aware job scheduler.
//!
//! A [`Scheduler`] turns [`JobDefinition`]s into [`Job`]s and runs them on a
//! dynamic pool of processors:
//!
//! ```text
//! INITIAL -> WAITING -> PENDING -> RUNNING <-> READY/BLOCKED -> ZOMBIE -> DONE|FAILED
//!    \          \          \                                            DISCARDED
//! ```
//!
//! Start and discard [`condition`]s decide when a waiting job becomes
//! pending. Pending jobs are served by priority. A running job blocked on a
//! pool-aware primitive lends its processor slot, so nested jobs it waits for
//! can run even on a single processor.

pub mod audit;
pub mod condition;
mod context;
mod definition;
pub mod extension;
mod job;
pub mod output;
mod processor;
#[allow(clippy::module_inception)]
mod scheduler;
mod state;

pub use audit::{AuditEvent, AuditHandler, AuditSink, InMemoryAuditSink};
pub use context::SchedulingContext;
pub use definition::{define_job, runner_fn, EventHandler, HandlerRef, JobDefinition, JobResult, Runner};
pub use job::Job;
pub use output::{OutputBuffer, SharedWriter};
pub use scheduler::Scheduler;
pub use state::{JobEvent, State};
