//! Command deadlines
//!
//! Every registered command runs under an [`ExecutionTimeout`]; on expiry the
//! future is dropped, which kills the child process.

use std::time::Duration;
use tokio::time;

/// Raised when a future outlives its [`ExecutionTimeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Command execution timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Deadline for one command run
///
/// The whitelist bounds what may run, not how long it runs; every registered
/// command is wrapped in one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl ExecutionTimeout {
    /// Deadline of `duration`
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use kick::commands::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Drive `future` to completion or until the deadline
    ///
    /// # Returns
    ///
    /// The output of the future if it completes in time, [`TimedOut`] otherwise.
    /// The future is dropped on expiry.
    pub async fn run<F, T>(&self, future: F) -> Result<T, TimedOut>
    where
        F: std::future::Future<Output = T>,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| TimedOut(self.duration))
    }
}
