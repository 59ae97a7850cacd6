//! Structured logging setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "prometheus_scheduler=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, unless a global
/// subscriber is already set. Worker and fan-out threads are named, so
/// thread names are included in every line.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_LOG_FILTER);
}

/// Like [`init_tracing`], falling back to `directives` when `RUST_LOG` is unset.
///
/// Returns whether this call installed the subscriber.
pub fn init_tracing_with(directives: &str) -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
