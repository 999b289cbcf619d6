//! Wait selection between runs.

use std::time::Duration;

use tracing::debug;

/// How far below the run interval a backed-off retry is capped, so a retry
/// wait is never mistaken for a normal one.
const RETRY_CAP_MARGIN: Duration = Duration::from_nanos(1);

/// Decides how long the loop waits before the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    run_interval: Duration,
    retry_interval: Duration,
    backoff: bool,
}

impl RetryPolicy {
    /// Create a policy. A retry interval larger than the run interval
    /// disables retry.
    pub fn new(run_interval: Duration, retry_interval: Duration, backoff: bool) -> Self {
        let retry_interval = if retry_interval > run_interval {
            debug!(
                run_ms = run_interval.as_millis() as u64,
                retry_ms = retry_interval.as_millis() as u64,
                "retry interval exceeds run interval, retry disabled"
            );
            Duration::ZERO
        } else {
            retry_interval
        };

        Self {
            run_interval,
            retry_interval,
            backoff,
        }
    }

    pub fn run_interval(&self) -> Duration {
        self.run_interval
    }

    /// Effective base retry interval (zero when retry is disabled).
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn backoff(&self) -> bool {
        self.backoff
    }

    /// Wait to use after a run, given the wait that preceded it.
    pub fn next(&self, previous: Duration, failed: bool) -> Duration {
        if !failed || self.retry_interval.is_zero() {
            return self.run_interval;
        }

        let previous_was_retry = !previous.is_zero() && previous < self.run_interval;
        if self.backoff && previous_was_retry {
            previous
                .saturating_mul(2)
                .min(self.run_interval - RETRY_CAP_MARGIN)
        } else {
            self.retry_interval
        }
    }
}
