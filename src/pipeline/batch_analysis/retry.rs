//! Per-batch retry policy, kept free of I/O so it can be tested on its own.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::{AnalysisError, RetryClass};

/// Calls allowed per batch attempt series.
pub const MAX_ATTEMPTS: u32 = 3;

/// Rate-limit waits for attempts 1, 2, 3 (and beyond).
const BACKOFF_SCHEDULE_SECS: [u64; 3] = [2, 5, 10];

/// Wait before retrying after `attempt` (1-based) was rate limited.
pub fn backoff_delay(attempt: u32) -> Duration {
    let idx = (attempt.max(1) as usize - 1).min(BACKOFF_SCHEDULE_SECS.len() - 1);
    Duration::from_secs(BACKOFF_SCHEDULE_SECS[idx])
}

/// What to do after a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Call again, after `delay` if one is set.
    Retry { delay: Option<Duration> },
    /// Record the error on the batch.
    GiveUp,
    /// Record cancellation and stop the run.
    Abort,
}

/// Decide the next step after `attempt` (1-based) failed with `error`.
pub fn decide(error: &AnalysisError, attempt: u32) -> RetryDecision {
    let class = error.retry_class();
    if class == RetryClass::Cancelled {
        return RetryDecision::Abort;
    }
    if attempt >= MAX_ATTEMPTS {
        return RetryDecision::GiveUp;
    }
    match class {
        RetryClass::Backoff => RetryDecision::Retry {
            delay: Some(backoff_delay(attempt)),
        },
        RetryClass::Immediate => RetryDecision::Retry { delay: None },
        RetryClass::Fatal | RetryClass::Cancelled => RetryDecision::GiveUp,
    }
}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), AnalysisError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
