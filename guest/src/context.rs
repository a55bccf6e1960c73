//! Operation context.
//!
//! Every SCSI operation takes an [`OpContext`]: a cancellation token plus an
//! optional deadline. Retry loops check it before each sleep and hand its
//! error back to the caller unchanged.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uvm_guest_shared::errors::GuestError;

/// Cancellation and deadline bound for a single operation.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context that never ends on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout(timeout)
    }

    /// Context driven by an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Tighten the deadline to `timeout` from now. An earlier deadline wins.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Child context: cancelled with the parent, may carry its own deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The context's error if it has ended, `None` while still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<GuestError> {
        if self.token.is_cancelled() {
            return Some(GuestError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(GuestError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context ends and return its error.
    pub async fn done(&self) -> GuestError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => GuestError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => {
                        self.err().unwrap_or(GuestError::DeadlineExceeded)
                    }
                }
            }
            None => {
                self.token.cancelled().await;
                GuestError::Canceled
            }
        }
    }
}
