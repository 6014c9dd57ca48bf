//! `analyze` and `check` commands.

use std::path::Path;

use super::ConfigOverrides;
use crate::pipeline::batch_analysis::{
    AnalysisEvent, BatchOrchestrator, CombinedReport, HttpCompletionClient, PipelineRun,
    RunOutcome,
};
use crate::pipeline::content::{prepare_content, ContentItem};
use crate::pipeline::diagnostic;

/// Read a JSON array of content items from `path`.
pub async fn load_items(path: &Path) -> Result<Vec<ContentItem>, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid content file {}: {e}", path.display()))
}

/// Analyze the items in `path` and return the combined report.
///
/// Content is filtered and deduplicated first unless `skip_normalization` is
/// set. Ctrl-C cancels the run; the report then covers the batches that
/// finished.
pub async fn analyze_file(
    path: &Path,
    overrides: &ConfigOverrides,
    skip_normalization: bool,
) -> Result<CombinedReport, String> {
    let items = load_items(path).await?;
    let loaded = items.len();
    let items = if skip_normalization {
        items
    } else {
        prepare_content(items)
    };
    tracing::info!(loaded, kept = items.len(), "Content loaded");

    let mut run = PipelineRun::new(overrides.resolve(), items).map_err(|e| e.to_string())?;
    let client = HttpCompletionClient::new().map_err(|e| e.to_string())?;
    let orchestrator = BatchOrchestrator::new(client).with_diagnostics(diagnostic::resolve_base_dir());

    let token = run.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling analysis");
            token.cancel();
        }
    });

    let outcome = orchestrator.run(&mut run, Some(&log_progress)).await;
    ctrl_c.abort();

    match outcome.map_err(|e| e.to_string())? {
        RunOutcome::Finished => {}
        RunOutcome::Cancelled => tracing::warn!("Analysis cancelled; report covers finished batches only"),
    }

    Ok(run.report())
}

/// Verify endpoint, key and model with a minimal request.
pub async fn check_connection(overrides: &ConfigOverrides) -> Result<String, String> {
    let config = overrides.resolve();
    let client = HttpCompletionClient::new().map_err(|e| e.to_string())?;
    client
        .check_connection(&config)
        .await
        .map_err(|e| e.to_string())?;
    Ok(format!("Connection OK ({})", config.model_name))
}

fn log_progress(event: AnalysisEvent<'_>) {
    match event {
        AnalysisEvent::RunStarted {
            total_batches,
            total_items,
        } => tracing::info!(total_batches, total_items, "Analysis started"),
        AnalysisEvent::BatchStarted {
            index,
            total,
            attempt,
        } => tracing::info!(batch = index, total, attempt, "Batch started"),
        AnalysisEvent::Streaming { index, accumulated } => {
            tracing::trace!(batch = index, chars = accumulated.len(), "Streaming")
        }
        AnalysisEvent::BackoffScheduled {
            index,
            attempt,
            delay,
        } => tracing::info!(batch = index, attempt, delay_secs = delay.as_secs(), "Backing off"),
        AnalysisEvent::BatchCompleted { index, risk_score } => {
            tracing::info!(batch = index, risk_score, "Batch completed")
        }
        AnalysisEvent::BatchFailed { index, error } => {
            tracing::warn!(batch = index, error = %error.message, "Batch failed")
        }
        AnalysisEvent::RunCancelled { completed } => {
            tracing::warn!(completed, "Analysis cancelled")
        }
        AnalysisEvent::RunFinished { successful, failed } => {
            tracing::info!(successful, failed, "Analysis finished")
        }
    }
}
