//! Error taxonomy for batch risk analysis.
//!
//! Every failure a batch attempt can hit maps to one variant; the retry
//! policy keys off [`AnalysisError::retry_class`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::structuring::StructuringError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Rate limited by the completion endpoint (HTTP 429)")]
    RateLimited,

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Could not parse model output: {0}")]
    UnrepairableJson(#[from] StructuringError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Batch {0} not found")]
    BatchNotFound(usize),

    #[error("Batch {0} is not in a failed state")]
    BatchNotRetryable(usize),
}

/// How the per-batch call policy treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Wait for the backoff delay, then retry.
    Backoff,
    /// Retry straight away.
    Immediate,
    /// Fail the batch now.
    Fatal,
    /// Stop the batch and the run.
    Cancelled,
}

impl AnalysisError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited => RetryClass::Backoff,
            Self::Timeout { .. }
            | Self::Transport(_)
            | Self::EmptyResponse
            | Self::UnrepairableJson(_) => RetryClass::Immediate,
            Self::Http { status, .. } if *status >= 500 => RetryClass::Immediate,
            Self::Cancelled => RetryClass::Cancelled,
            Self::Http { .. }
            | Self::Validation(_)
            | Self::BatchNotFound(_)
            | Self::BatchNotRetryable(_) => RetryClass::Fatal,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::UnrepairableJson(_) => ErrorKind::UnrepairableJson,
            Self::Transport(_) | Self::Http { .. } => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::BatchNotFound(_) | Self::BatchNotRetryable(_) => ErrorKind::Validation,
        }
    }
}

/// Plain-data error kind exposed to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RateLimited,
    Timeout,
    EmptyResponse,
    UnrepairableJson,
    Transport,
    Cancelled,
}

/// Failure recorded on a batch. The message is the error's display text, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnalysisError> for ErrorInfo {
    fn from(e: &AnalysisError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
