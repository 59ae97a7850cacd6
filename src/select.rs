//! Pool-aware blocking helpers for sleeping and channel operations.
//!
//! Each helper gives the permit of the context's resource pool back while
//! blocked and allocates it again before returning.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::context::Context;
use crate::core::error::SyncError;

fn lend<R>(ctx: &Context, block: impl FnOnce() -> Result<R, SyncError>) -> Result<R, SyncError> {
    let Some(pool) = ctx.pool() else {
        return block();
    };
    pool.release(ctx);
    let outcome = block();
    let allocated = pool.alloc(ctx);
    let value = outcome?;
    allocated.map(|()| value)
}

/// Sleep for `duration` unless `ctx` is cancelled first.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] on cancellation.
pub fn sleep(ctx: &Context, duration: Duration) -> Result<(), SyncError> {
    lend(ctx, || {
        crossbeam_channel::select! {
            recv(ctx.done()) -> _ => Err(SyncError::Cancelled),
            default(duration) => Ok(()),
        }
    })
}

/// Receive a value from `rx`.
///
/// Returns `Ok(None)` once the channel is disconnected.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] on cancellation.
pub fn receive<T>(ctx: &Context, rx: &Receiver<T>) -> Result<Option<T>, SyncError> {
    lend(ctx, || {
        crossbeam_channel::select! {
            recv(rx) -> msg => Ok(msg.ok()),
            recv(ctx.done()) -> _ => Err(SyncError::Cancelled),
        }
    })
}

/// Send `value` on `tx`.
///
/// Returns the value back if the channel is disconnected.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] on cancellation.
pub fn send<T>(ctx: &Context, tx: &Sender<T>, value: T) -> Result<Option<T>, SyncError> {
    lend(ctx, || {
        crossbeam_channel::select! {
            send(tx, value) -> sent => Ok(sent.err().map(|e| e.into_inner())),
            recv(ctx.done()) -> _ => Err(SyncError::Cancelled),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource_pool::{LimitPool, ResourcePool};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sleep_elapses() {
        let start = std::time::Instant::now();
        sleep(&Context::background(), Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_cancelled() {
        let ctx = Context::background();
        ctx.cancel();
        assert_eq!(
            sleep(&ctx, Duration::from_secs(10)),
            Err(SyncError::Cancelled)
        );
    }

    #[test]
    fn test_receive_lends_permit() {
        let pool = Arc::new(LimitPool::new(1));
        let ctx = Context::background().with_pool(pool.clone());
        pool.alloc(&ctx).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(0);
        let p = Arc::clone(&pool);
        let sender = thread::spawn(move || {
            // The receiver's permit is free while it blocks.
            while p.available() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            tx.send(7).unwrap();
        });
        assert_eq!(receive(&ctx, &rx).unwrap(), Some(7));
        sender.join().unwrap();
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_send_to_closed_channel_returns_value() {
        let (tx, rx) = crossbeam_channel::bounded::<u8>(1);
        drop(rx);
        assert_eq!(send(&Context::background(), &tx, 3).unwrap(), Some(3));
    }
}
