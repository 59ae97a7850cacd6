//! Core building blocks: errors, resource pools, limiter, queue and worker pool.

pub mod error;
pub mod limiter;
pub mod queue;
pub mod resource_pool;
pub mod worker_pool;

pub use error::{AppResult, NetError, NetProblem, SchedulerError, SyncError};
pub use limiter::{Gate, Grant, Limiter};
pub use queue::{Prioritized, PriorityQueue};
pub use resource_pool::{Activity, DefaultPool, LimitPool, ResourcePool};
pub use worker_pool::{PoolStats, Retire, Worker, WorkerFactory, WorkerPool};
