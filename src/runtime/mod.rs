//! Async runtime bridges.
//!
//! Scheduler waits block OS threads. The bridges here move them onto the
//! blocking pool of an async runtime so async callers can await them.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_bridge;

#[cfg(feature = "tokio-runtime")]
pub use tokio_bridge::{wait_job, wait_job_context, wait_scheduler};
