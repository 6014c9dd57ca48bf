use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AnalysisError, ErrorInfo};
use crate::pipeline::content::ContentItem;
use crate::pipeline::structuring::RiskRecord;

// ═══════════════════════════════════════════
// Batch
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A contiguous slice of the prepared content, analyzed by one streaming call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// 1-based position in the run.
    pub index: usize,
    pub items: Vec<ContentItem>,
    pub state: BatchState,
    pub result: Option<RiskRecord>,
    pub error: Option<ErrorInfo>,
    /// Backoff waits taken before rate-limited retries, in order.
    pub backoff_delays: Vec<Duration>,
    /// Calls made during the current attempt series.
    pub attempts: u32,
}

impl Batch {
    pub fn new(index: usize, items: Vec<ContentItem>) -> Self {
        Self {
            index,
            items,
            state: BatchState::Pending,
            result: None,
            error: None,
            backoff_delays: Vec::new(),
            attempts: 0,
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Pending → Analyzing, or Failed → Analyzing for an explicit retry.
    ///
    /// Retrying clears the previous error and attempt history.
    pub(crate) fn begin(&mut self) {
        if self.state == BatchState::Failed {
            self.error = None;
            self.backoff_delays.clear();
            self.attempts = 0;
        }
        self.state = BatchState::Analyzing;
    }

    pub(crate) fn complete(&mut self, record: RiskRecord) {
        self.state = BatchState::Completed;
        self.result = Some(record);
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: &AnalysisError) {
        self.state = BatchState::Failed;
        self.result = None;
        self.error = Some(ErrorInfo::from(error));
    }
}

// ═══════════════════════════════════════════
// Run observation
// ═══════════════════════════════════════════

/// The single in-flight call of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCall {
    pub batch_index: usize,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

/// Read-only copy of a run's state for observers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub batches: Vec<BatchSummary>,
    pub active_call: Option<ActiveCall>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub index: usize,
    pub item_count: usize,
    pub state: BatchState,
    pub attempts: u32,
    pub error: Option<ErrorInfo>,
}

impl From<&Batch> for BatchSummary {
    fn from(b: &Batch) -> Self {
        Self {
            index: b.index,
            item_count: b.item_count(),
            state: b.state,
            attempts: b.attempts,
            error: b.error.clone(),
        }
    }
}

/// How `BatchOrchestrator::run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every batch reached a terminal state.
    Finished,
    /// Cancellation stopped the run; later batches stay `Pending`.
    Cancelled,
}

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent<'a> {
    RunStarted {
        total_batches: usize,
        total_items: usize,
    },
    BatchStarted {
        index: usize,
        total: usize,
        attempt: u32,
    },
    /// Accumulated model text so far for the active batch.
    Streaming {
        index: usize,
        accumulated: &'a str,
    },
    BackoffScheduled {
        index: usize,
        attempt: u32,
        delay: Duration,
    },
    BatchCompleted {
        index: usize,
        risk_score: u8,
    },
    BatchFailed {
        index: usize,
        error: &'a ErrorInfo,
    },
    RunCancelled {
        completed: usize,
    },
    RunFinished {
        successful: usize,
        failed: usize,
    },
}

/// Progress observer. May borrow caller state for `'a`.
pub type ProgressFn<'a> = dyn Fn(AnalysisEvent<'_>) + Send + Sync + 'a;

// ═══════════════════════════════════════════
// Combined report
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// At least one batch succeeded; the record combines their results.
    Combined,
    /// No batch succeeded and at least one failed; the record only
    /// describes the failures.
    AllFailed,
    /// No batch has reached a terminal state yet (cancelled before start,
    /// or reported mid-run before the first batch finished).
    NotAnalyzed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub index: usize,
    pub item_count: usize,
    pub reason: String,
}

/// Aggregate view over all batches, rebuilt on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedReport {
    pub status: ReportStatus,
    pub record: RiskRecord,
    pub total_batches: usize,
    pub successful_batches: usize,
    pub failed_batches: usize,
    pub pending_batches: usize,
    /// Items in failed batches; not part of `record.metadata.totalAnalyzed`.
    pub failed_items: usize,
    pub failures: Vec<BatchFailure>,
}
