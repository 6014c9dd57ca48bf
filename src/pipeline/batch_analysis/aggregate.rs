//! Combines per-batch outcomes into one report.
//!
//! Pure and rebuilt on demand from the batch list; the batches stay the
//! source of truth.

use std::cmp::Reverse;

use chrono::Utc;

use super::types::{Batch, BatchFailure, BatchState, CombinedReport, ReportStatus};
use crate::pipeline::structuring::{RecordMetadata, RiskFinding, RiskLevel, RiskRecord};

/// Prepended to the recommendations when any batch failed.
pub const RETRY_RECOMMENDATION: &str =
    "Retry the failed analysis batches to get a more complete risk assessment.";

const ALL_FAILED_RECOMMENDATIONS: [&str; 4] = [
    "Check that the endpoint URL, API key and model name are correct.",
    "Make sure the network connection is stable.",
    "Retry the failed batches.",
    "If the problem persists, inspect the logs for the failing requests.",
];

const NOT_ANALYZED_RECOMMENDATION: &str =
    "Start a new analysis run to cover the pending batches.";

/// Finding types named in the combined summary.
const SUMMARY_TOP_TYPES: usize = 3;

pub fn build_combined_report(batches: &[Batch]) -> CombinedReport {
    let successful: Vec<(&Batch, &RiskRecord)> = batches
        .iter()
        .filter(|b| b.state == BatchState::Completed)
        .filter_map(|b| b.result.as_ref().map(|r| (b, r)))
        .collect();

    let failures: Vec<BatchFailure> = batches
        .iter()
        .filter(|b| b.state == BatchState::Failed)
        .map(|b| BatchFailure {
            index: b.index,
            item_count: b.item_count(),
            reason: b
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
        .collect();

    let failed_items: usize = failures.iter().map(|f| f.item_count).sum();
    let pending: Vec<&Batch> = batches.iter().filter(|b| !b.state.is_terminal()).collect();
    let pending_batches = pending.len();

    let (status, record) = if !successful.is_empty() {
        (
            ReportStatus::Combined,
            combined_record(&successful, &failures, failed_items, pending_batches),
        )
    } else if !failures.is_empty() {
        (
            ReportStatus::AllFailed,
            all_failed_record(&failures, failed_items, pending_batches),
        )
    } else {
        (ReportStatus::NotAnalyzed, not_analyzed_record(&pending))
    };

    CombinedReport {
        status,
        record,
        total_batches: batches.len(),
        successful_batches: successful.len(),
        failed_batches: failures.len(),
        pending_batches,
        failed_items,
        failures,
    }
}

fn combined_record(
    successful: &[(&Batch, &RiskRecord)],
    failures: &[BatchFailure],
    failed_items: usize,
    pending: usize,
) -> RiskRecord {
    let mut findings: Vec<RiskFinding> = successful
        .iter()
        .flat_map(|(batch, record)| {
            record.detected_risks.iter().cloned().map(|mut f| {
                f.batch_source = Some(batch.index);
                f
            })
        })
        .collect();
    // stable: equal severities keep batch order
    findings.sort_by_key(|f| Reverse(f.severity.priority()));

    let mut recommendations: Vec<String> = Vec::new();
    if !failures.is_empty() {
        recommendations.push(RETRY_RECOMMENDATION.to_string());
    }
    for rec in successful.iter().flat_map(|(_, r)| r.recommendations.iter()) {
        if !recommendations.contains(rec) {
            recommendations.push(rec.clone());
        }
    }

    let score_sum: u32 = successful.iter().map(|(_, r)| u32::from(r.risk_score)).sum();
    let avg_score = (f64::from(score_sum) / successful.len() as f64).round() as u8;

    let all_high = successful.iter().all(|(_, r)| r.risk_level == RiskLevel::High);
    let risk_level = if all_high && successful.len() > 1 {
        RiskLevel::High
    } else {
        RiskLevel::from_score(avg_score)
    };

    let total_analyzed: usize = successful.iter().map(|(b, _)| b.item_count()).sum();

    let summary = combined_summary(
        successful.len(),
        total_analyzed,
        failures.len(),
        failed_items,
        pending,
        avg_score,
        &findings,
    );

    RiskRecord {
        risk_level,
        risk_score: avg_score,
        summary,
        detected_risks: findings,
        recommendations,
        metadata: RecordMetadata {
            total_analyzed,
            timestamp: Utc::now(),
            confidence: if failures.is_empty() {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            },
        },
    }
}

fn combined_summary(
    successful: usize,
    total_analyzed: usize,
    failed: usize,
    failed_items: usize,
    pending: usize,
    avg_score: u8,
    findings: &[RiskFinding],
) -> String {
    let mut summary = if successful == 1 {
        format!("Analyzed {total_analyzed} items.")
    } else {
        format!("Analyzed {total_analyzed} items across {successful} successful batches.")
    };

    if failed > 0 {
        summary.push_str(&format!(
            " {failed} batch(es) failed, covering {failed_items} items."
        ));
    }
    summary.push_str(&pending_note(pending));

    summary.push_str(&format!(
        " Found {} risk item(s); combined risk score {avg_score} (mean of {successful} batch(es)).",
        findings.len()
    ));

    let mut top_types: Vec<&str> = Vec::new();
    for f in findings {
        if !top_types.contains(&f.kind.as_str()) {
            top_types.push(&f.kind);
        }
        if top_types.len() == SUMMARY_TOP_TYPES {
            break;
        }
    }

    if top_types.is_empty() {
        summary.push_str(" No significant privacy leak risk was found.");
    } else {
        summary.push_str(&format!(" Main risk areas: {}.", top_types.join(", ")));
    }
    summary
}

fn pending_note(pending: usize) -> String {
    if pending == 0 {
        String::new()
    } else {
        format!(" {pending} batch(es) were not analyzed.")
    }
}

fn all_failed_record(failures: &[BatchFailure], failed_items: usize, pending: usize) -> RiskRecord {
    let reasons = failures
        .iter()
        .map(|f| format!("Batch {}: {}", f.index, f.reason))
        .collect::<Vec<_>>()
        .join("; ");

    RiskRecord {
        risk_level: RiskLevel::Medium,
        risk_score: 50,
        summary: format!(
            "All {} analyzed batch(es) failed, covering {failed_items} items.{} Check the configuration and retry.",
            failures.len(),
            pending_note(pending)
        ),
        detected_risks: vec![RiskFinding {
            kind: "analysis_failed".into(),
            content: "No batch could be analyzed".into(),
            severity: RiskLevel::High,
            description: format!("Failure reasons: {reasons}"),
            recommendation: Some("Check the endpoint configuration and network, then retry.".into()),
            batch_source: None,
        }],
        recommendations: ALL_FAILED_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
        metadata: RecordMetadata {
            total_analyzed: 0,
            timestamp: Utc::now(),
            confidence: RiskLevel::Low,
        },
    }
}

/// Placeholder record while no batch has finished. Carries no findings.
fn not_analyzed_record(pending: &[&Batch]) -> RiskRecord {
    let items: usize = pending.iter().map(|b| b.item_count()).sum();
    RiskRecord {
        risk_level: RiskLevel::Medium,
        risk_score: 50,
        summary: format!(
            "No batch has been analyzed yet; {} batch(es) covering {items} items are pending.",
            pending.len()
        ),
        detected_risks: Vec::new(),
        recommendations: vec![NOT_ANALYZED_RECOMMENDATION.to_string()],
        metadata: RecordMetadata {
            total_analyzed: 0,
            timestamp: Utc::now(),
            confidence: RiskLevel::Low,
        },
    }
}
