use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-step scale shared by overall risk, finding severity and model confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Case-insensitive parse. Unknown strings yield `None`.
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Level implied by a 0-100 score: >= 70 high, >= 40 medium, else low.
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            Self::High
        } else if score >= 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Sort weight, higher is more severe.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized risk assessment for one batch (or the combined run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRecord {
    pub risk_level: RiskLevel,
    /// 0..=100
    pub risk_score: u8,
    pub summary: String,
    pub detected_risks: Vec<RiskFinding>,
    pub recommendations: Vec<String>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub severity: RiskLevel,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Originating batch, set when findings are merged into a combined report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_source: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub total_analyzed: usize,
    pub timestamp: DateTime<Utc>,
    pub confidence: RiskLevel,
}
