// Defaulting and clamping for model-produced risk objects.
// Applied after extraction; never fails. Every field the model omits or
// mistypes gets a safe default so downstream aggregation sees a complete record.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::types::{RecordMetadata, RiskFinding, RiskLevel, RiskRecord};

const DEFAULT_SCORE: u8 = 50;
const DEFAULT_SUMMARY: &str = "Analysis completed, but the model returned no summary.";
const DEFAULT_FINDING_TYPE: &str = "unspecified";

/// Used when the model returns no usable recommendation list.
pub const DEFAULT_RECOMMENDATIONS: [&str; 2] = [
    "Review what personal details your public posts reveal.",
    "Strengthen general privacy awareness before posting.",
];

/// Normalize a parsed object into a `RiskRecord`.
///
/// Non-object input is treated as `{}`. `item_count` backs
/// `metadata.totalAnalyzed` when the model omits it or reports zero.
pub fn normalize_record(value: &Value, item_count: usize) -> RiskRecord {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    RiskRecord {
        risk_level: obj
            .get("riskLevel")
            .and_then(Value::as_str)
            .and_then(RiskLevel::from_str_lenient)
            .unwrap_or(RiskLevel::Medium),
        risk_score: obj.get("riskScore").map_or(DEFAULT_SCORE, normalize_score),
        summary: non_blank_str(obj.get("summary"))
            .unwrap_or(DEFAULT_SUMMARY)
            .to_string(),
        detected_risks: obj
            .get("detectedRisks")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(normalize_finding).collect())
            .unwrap_or_default(),
        recommendations: normalize_recommendations(obj.get("recommendations")),
        metadata: normalize_metadata(obj, item_count),
    }
}

/// Numbers are rounded and clamped to 0..=100; anything else scores 50.
fn normalize_score(value: &Value) -> u8 {
    match value.as_f64() {
        Some(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => DEFAULT_SCORE,
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn normalize_finding(value: &Value) -> Option<RiskFinding> {
    let obj = value.as_object()?;
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Some(RiskFinding {
        kind: non_blank_str(obj.get("type"))
            .unwrap_or(DEFAULT_FINDING_TYPE)
            .to_string(),
        content: text("content"),
        severity: obj
            .get("severity")
            .and_then(Value::as_str)
            .and_then(RiskLevel::from_str_lenient)
            .unwrap_or(RiskLevel::Medium),
        description: text("description"),
        recommendation: non_blank_str(obj.get("recommendation")).map(str::to_string),
        batch_source: None,
    })
}

fn normalize_recommendations(value: Option<&Value>) -> Vec<String> {
    match value.and_then(Value::as_array) {
        Some(arr) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => DEFAULT_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
    }
}

fn normalize_metadata(obj: &Map<String, Value>, item_count: usize) -> RecordMetadata {
    let empty = Map::new();
    let meta = obj
        .get("metadata")
        .or_else(|| obj.get("analysisMetadata"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let first = |keys: &[&str]| keys.iter().find_map(|k| meta.get(*k));

    let total_analyzed = first(&["totalAnalyzed", "totalContentAnalyzed"])
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .map_or(item_count, |n| n as usize);

    let timestamp = first(&["timestamp", "analysisTimestamp"])
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

    let confidence = first(&["confidence", "confidenceLevel"])
        .and_then(Value::as_str)
        .and_then(RiskLevel::from_str_lenient)
        .unwrap_or(RiskLevel::Medium);

    RecordMetadata {
        total_analyzed,
        timestamp,
        confidence,
    }
}
