//! Batch orchestrator: drives one streaming call per batch, strictly in order.
//!
//! State lives in an explicit `PipelineRun` owned by the caller; the
//! orchestrator only holds the transport and performs every state transition.
//!
//! ```text
//! for each pending batch:
//!   cancelled? → stop
//!   Analyzing → open stream → decode → extract → normalize → Completed
//!                 └─ error → retry policy → (backoff) retry | Failed | stop
//! ```

use std::path::PathBuf;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::aggregate::build_combined_report;
use super::api_types::CompletionRequest;
use super::error::AnalysisError;
use super::prompt::build_messages;
use super::retry::{decide, sleep_or_cancel, RetryDecision};
use super::traits::CompletionTransport;
use super::types::*;
use crate::config::{AnalysisConfig, BATCH_SIZE};
use crate::pipeline::content::ContentItem;
use crate::pipeline::diagnostic;
use crate::pipeline::stream_decoder::drain_stream;
use crate::pipeline::structuring::{parse_risk_response, RiskRecord};

/// Split `items` into contiguous batches of at most `size`, numbered from 1.
pub fn split_into_batches(items: Vec<ContentItem>, size: usize) -> Vec<Batch> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        let chunk: Vec<ContentItem> = iter.by_ref().take(size).collect();
        batches.push(Batch::new(batches.len() + 1, chunk));
    }
    batches
}

// ═══════════════════════════════════════════
// Run context
// ═══════════════════════════════════════════

/// One analysis run: its configuration, batches, cancellation signal and
/// the record of the in-flight call.
#[derive(Debug)]
pub struct PipelineRun {
    pub id: Uuid,
    config: AnalysisConfig,
    batches: Vec<Batch>,
    cancel: CancellationToken,
    active_call: Option<ActiveCall>,
}

impl PipelineRun {
    /// Validate the configuration and split `items` into batches of `BATCH_SIZE`.
    pub fn new(config: AnalysisConfig, items: Vec<ContentItem>) -> Result<Self, AnalysisError> {
        config.validate()?;
        if items.is_empty() {
            return Err(AnalysisError::Validation("no content to analyze".into()));
        }

        let batches = split_into_batches(items, BATCH_SIZE);
        let id = Uuid::new_v4();
        tracing::info!(
            run_id = %id,
            batches = batches.len(),
            items = batches.iter().map(Batch::item_count).sum::<usize>(),
            "Analysis run created"
        );

        Ok(Self {
            id,
            config,
            batches,
            cancel: CancellationToken::new(),
            active_call: None,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, index: usize) -> Option<&Batch> {
        self.batches.iter().find(|b| b.index == index)
    }

    pub fn active_call(&self) -> Option<ActiveCall> {
        self.active_call
    }

    /// Request cooperative cancellation. Takes effect at the next check point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clone of the run's token, for cancelling from another task (Ctrl-C handler).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drop all batches and arm a fresh cancellation token.
    pub fn reset(&mut self) {
        self.cancel = CancellationToken::new();
        self.batches.clear();
        self.active_call = None;
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.id,
            batches: self.batches.iter().map(BatchSummary::from).collect(),
            active_call: self.active_call,
            cancelled: self.is_cancelled(),
        }
    }

    /// Combined report over the current batch states.
    pub fn report(&self) -> CombinedReport {
        build_combined_report(&self.batches)
    }

    /// Settle state left behind by a call whose future was dropped mid-flight:
    /// `Analyzing` batches become `Failed` (cancelled) and the active call is cleared.
    fn recover_interrupted(&mut self) {
        let stale = self.active_call.take();
        for batch in self
            .batches
            .iter_mut()
            .filter(|b| b.state == BatchState::Analyzing)
        {
            tracing::warn!(
                run_id = %self.id,
                batch = batch.index,
                attempt = stale.map(|c| c.attempt),
                "Batch call was interrupted, marking it failed"
            );
            batch.fail(&AnalysisError::Cancelled);
        }
    }

    fn position(&self, index: usize) -> Option<usize> {
        self.batches.iter().position(|b| b.index == index)
    }
}

// ═══════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Identifies one call for logging and diagnostics.
#[derive(Clone, Copy)]
struct CallContext {
    run_id: Uuid,
    batch: usize,
    attempt: u32,
    item_count: usize,
}

pub struct BatchOrchestrator<T: CompletionTransport> {
    transport: T,
    dump_dir: Option<PathBuf>,
}

fn emit(progress: Option<&ProgressFn<'_>>, event: AnalysisEvent<'_>) {
    if let Some(progress) = progress {
        progress(event);
    }
}

impl<T: CompletionTransport> BatchOrchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            dump_dir: None,
        }
    }

    /// Dump raw output of batches whose extraction fails under `base`.
    pub fn with_diagnostics(mut self, base: Option<PathBuf>) -> Self {
        self.dump_dir = base;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Analyze every pending batch in order.
    ///
    /// Per-batch failures are recorded on the batch and never abort the run.
    /// Returns `Cancelled` as soon as cancellation is observed; later batches
    /// stay `Pending`.
    pub async fn run(
        &self,
        run: &mut PipelineRun,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<RunOutcome, AnalysisError> {
        run.config.validate()?;
        run.recover_interrupted();

        let total_items = run.batches.iter().map(Batch::item_count).sum();
        emit(
            progress,
            AnalysisEvent::RunStarted {
                total_batches: run.batches.len(),
                total_items,
            },
        );

        for pos in 0..run.batches.len() {
            if run.is_cancelled() {
                return Ok(self.cancelled(run, progress));
            }
            if run.batches[pos].state != BatchState::Pending {
                continue;
            }
            if self.analyze_batch(run, pos, progress).await == BatchOutcome::Cancelled {
                return Ok(self.cancelled(run, progress));
            }
        }

        let (successful, failed) = count_terminal(&run.batches);
        tracing::info!(run_id = %run.id, successful, failed, "Analysis run finished");
        emit(progress, AnalysisEvent::RunFinished { successful, failed });
        Ok(RunOutcome::Finished)
    }

    /// Re-analyze one `Failed` batch with its stored items and the run's config.
    ///
    /// Other batches are untouched; rebuild the report afterwards.
    pub async fn retry_batch(
        &self,
        run: &mut PipelineRun,
        index: usize,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<BatchState, AnalysisError> {
        if run.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        run.recover_interrupted();
        let pos = run
            .position(index)
            .ok_or(AnalysisError::BatchNotFound(index))?;
        if run.batches[pos].state != BatchState::Failed {
            return Err(AnalysisError::BatchNotRetryable(index));
        }
        run.config.validate()?;

        tracing::info!(run_id = %run.id, batch = index, "Retrying failed batch");
        self.analyze_batch(run, pos, progress).await;
        Ok(run.batches[pos].state)
    }

    fn cancelled(&self, run: &PipelineRun, progress: Option<&ProgressFn<'_>>) -> RunOutcome {
        let (completed, _) = count_terminal(&run.batches);
        tracing::info!(run_id = %run.id, completed, "Analysis run cancelled");
        emit(progress, AnalysisEvent::RunCancelled { completed });
        RunOutcome::Cancelled
    }

    /// Run the per-batch call policy to a terminal state.
    async fn analyze_batch(
        &self,
        run: &mut PipelineRun,
        pos: usize,
        progress: Option<&ProgressFn<'_>>,
    ) -> BatchOutcome {
        let total = run.batches.len();
        run.batches[pos].begin();

        let index = run.batches[pos].index;
        let item_count = run.batches[pos].item_count();
        let request = CompletionRequest::analysis(
            &run.config.model_name,
            build_messages(&run.batches[pos].items, index, total),
        );
        let cancel = run.cancel.clone();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            run.batches[pos].attempts = attempt;
            run.active_call = Some(ActiveCall {
                batch_index: index,
                attempt,
                started_at: Utc::now(),
            });
            emit(progress, AnalysisEvent::BatchStarted { index, total, attempt });
            tracing::info!(run_id = %run.id, batch = index, attempt, items = item_count, "Analyzing batch");

            let ctx = CallContext {
                run_id: run.id,
                batch: index,
                attempt,
                item_count,
            };
            let result = self
                .call_once(&run.config, &request, &cancel, ctx, progress)
                .await;
            run.active_call = None;

            let error = match result {
                Ok(record) => {
                    let risk_score = record.risk_score;
                    run.batches[pos].complete(record);
                    tracing::info!(run_id = %run.id, batch = index, attempt, risk_score, "Batch completed");
                    emit(progress, AnalysisEvent::BatchCompleted { index, risk_score });
                    return BatchOutcome::Completed;
                }
                Err(e) => e,
            };

            match decide(&error, attempt) {
                RetryDecision::Retry { delay: Some(delay) } => {
                    tracing::warn!(batch = index, attempt, delay_ms = delay.as_millis() as u64, error = %error, "Rate limited, backing off");
                    run.batches[pos].backoff_delays.push(delay);
                    emit(progress, AnalysisEvent::BackoffScheduled { index, attempt, delay });
                    if let Err(cancelled) = sleep_or_cancel(delay, &cancel).await {
                        return self.finish_failed(run, pos, &cancelled, progress);
                    }
                }
                RetryDecision::Retry { delay: None } => {
                    tracing::warn!(batch = index, attempt, error = %error, "Batch attempt failed, retrying");
                }
                RetryDecision::GiveUp | RetryDecision::Abort => {
                    return self.finish_failed(run, pos, &error, progress);
                }
            }
        }
    }

    fn finish_failed(
        &self,
        run: &mut PipelineRun,
        pos: usize,
        error: &AnalysisError,
        progress: Option<&ProgressFn<'_>>,
    ) -> BatchOutcome {
        let batch = &mut run.batches[pos];
        batch.fail(error);

        let outcome = if matches!(error, AnalysisError::Cancelled) {
            tracing::info!(batch = batch.index, "Batch stopped by cancellation");
            BatchOutcome::Cancelled
        } else {
            tracing::warn!(batch = batch.index, attempts = batch.attempts, error = %error, "Batch failed");
            BatchOutcome::Failed
        };

        if let Some(info) = &batch.error {
            emit(
                progress,
                AnalysisEvent::BatchFailed {
                    index: batch.index,
                    error: info,
                },
            );
        }
        outcome
    }

    /// One call: open the stream, decode it, extract and normalize the record.
    async fn call_once(
        &self,
        config: &AnalysisConfig,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        ctx: CallContext,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<RiskRecord, AnalysisError> {
        let timeout = config.timeout();

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            opened = tokio::time::timeout(timeout, self.transport.open_stream(config, request)) => opened,
        };
        let stream = match opened {
            Err(_) => {
                return Err(AnalysisError::Timeout {
                    secs: config.timeout_secs,
                })
            }
            Ok(stream) => stream?,
        };

        let decoded = drain_stream(stream, cancel, timeout, |accumulated| {
            emit(
                progress,
                AnalysisEvent::Streaming {
                    index: ctx.batch,
                    accumulated,
                },
            );
        })
        .await?;

        tracing::debug!(batch = ctx.batch, deltas = decoded.deltas, chars = decoded.text.len(), "Stream decoded");

        parse_risk_response(&decoded.text, ctx.item_count).map_err(|e| {
            if let Some(base) = &self.dump_dir {
                diagnostic::dump_failed_extraction(
                    base,
                    &ctx.run_id,
                    ctx.batch,
                    ctx.attempt,
                    &decoded.text,
                    &e.to_string(),
                );
            }
            AnalysisError::from(e)
        })
    }
}

fn count_terminal(batches: &[Batch]) -> (usize, usize) {
    batches.iter().fold((0, 0), |(ok, failed), b| match b.state {
        BatchState::Completed => (ok + 1, failed),
        BatchState::Failed => (ok, failed + 1),
        _ => (ok, failed),
    })
}
