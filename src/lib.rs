//! # Prometheus Scheduler
//!
//! A dependency-aware, in-process job scheduler built on cancellable,
//! pool-aware synchronization primitives.
//!
//! ## Synchronization layer
//!
//! - [`Monitor`]: a lock around a value with FIFO waiting lists and direct
//!   lock hand-off from signaller to waiter.
//! - [`Mutex`], [`RwMutex`] and [`WaitGroup`] built on monitors.
//! - [`core::Limiter`]: serves requesters while a predicate holds and can
//!   retire exactly one requester per discard.
//! - [`core::PriorityQueue`]: blocking queue served by descending priority.
//! - [`core::ResourcePool`]: permits lent out while a holder blocks.
//!   [`core::WorkerPool`] implements it by starting a replacement worker.
//!
//! Every blocking call takes a [`Context`] and fails with
//! [`core::SyncError::Cancelled`] once it is cancelled.
//!
//! ## Scheduling layer
//!
//! A [`scheduler::Scheduler`] instantiates [`scheduler::JobDefinition`]s as
//! jobs, holds them back until their start conditions hold, and runs them by
//! priority on a dynamic set of processors. A job blocked on a pool-aware
//! primitive lends its processor slot, so nested jobs it waits for can run
//! even with a single processor. [`jobnet`] describes named DAGs of jobs run
//! as one composite job.
//!
//! ```rust,no_run
//! use prometheus_scheduler::scheduler::condition::depends_on;
//! use prometheus_scheduler::scheduler::{define_job, Scheduler};
//! use prometheus_scheduler::Context;
//!
//! # fn main() -> anyhow::Result<()> {
//! let scheduler = Scheduler::new("example");
//! scheduler.add_processors(2);
//! scheduler.run(&Context::background())?;
//!
//! let fetch = scheduler.apply(&define_job("fetch", |_| Ok(serde_json::json!(42))), None)?;
//! let report = scheduler.apply(
//!     &define_job("report", |_| Ok(serde_json::Value::Null))
//!         .with_condition(depends_on([&fetch])),
//!     None,
//! )?;
//! report.schedule()?;
//! fetch.schedule()?;
//! report.wait();
//! scheduler.cancel();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Cancellation context threaded through blocking calls.
pub mod context;
/// Monitor with FIFO waiting lists and lock hand-off.
pub mod monitor;
/// Monitor-based mutual exclusion lock.
pub mod mutex;
/// Monitor-based reader/writer lock.
pub mod rwlock;
/// Cancellable, pool-aware wait group.
pub mod waitgroup;
/// Pool-aware sleeping and channel operations.
pub mod select;
/// Core building blocks: errors, resource pools, limiter, queue and worker pool.
pub mod core;
/// Dependency-aware job scheduler.
pub mod scheduler;
/// Named DAGs of jobs run as one composite job.
pub mod jobnet;
/// Configuration models for schedulers.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Async runtime bridges.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use context::Context;
pub use monitor::{Monitor, MonitorGuard, Waiting};
pub use mutex::Mutex;
pub use rwlock::RwMutex;
pub use select::{receive, send, sleep};
pub use waitgroup::WaitGroup;
