//! Fixed-interval retry bounded by an [`OpContext`].
//!
//! Used wherever the guest waits on kernel state it cannot subscribe to:
//! sysfs enumeration of a freshly attached disk, and creation of its
//! `/dev` node.

use std::time::Duration;

use tracing::trace;
use uvm_guest_shared::errors::{GuestError, GuestResult};

use crate::context::OpContext;

/// Retries an operation on a fixed interval until it succeeds, fails with a
/// non-retryable error, or the context ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `op` until it returns `Ok`, or an error `is_retryable` rejects.
    ///
    /// Before every sleep the context is checked; once it has ended its own
    /// error is returned as-is. There is no attempt limit.
    pub async fn run<T, E, Op, Pred>(
        &self,
        ctx: &OpContext,
        mut op: Op,
        is_retryable: Pred,
    ) -> GuestResult<T>
    where
        Op: FnMut() -> Result<T, E>,
        Pred: Fn(&E) -> bool,
        E: Into<GuestError>,
    {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => {
                    if let Some(err) = ctx.err() {
                        return Err(err);
                    }
                    trace!(attempt, interval = ?self.interval, "retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(self.interval) => {}
                        err = ctx.done() => return Err(err),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            uvm_guest_shared::constants::scsi::DEFAULT_POLL_INTERVAL_MS,
        ))
    }
}
