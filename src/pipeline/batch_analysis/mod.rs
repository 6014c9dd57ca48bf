//! Batch risk analysis.
//!
//! Prepared content is split into fixed-size batches; each batch is one
//! streaming chat-completion call whose output is extracted, repaired and
//! normalized into a `RiskRecord`. Batches run strictly one after another.
//!
//! ```text
//! PipelineRun (batches, cancel token)
//!      │
//!      ▼
//! BatchOrchestrator ── CompletionTransport ──▶ endpoint (SSE)
//!      │                      │
//!      │               stream_decoder ─▶ structuring
//!      ▼
//! aggregate ─▶ CombinedReport
//! ```

pub mod aggregate;
pub mod api_types;
pub mod client;
pub mod error;
pub mod prompt;
pub mod retry;
pub mod runner;
pub mod traits;
pub mod types;

pub use aggregate::build_combined_report;
pub use client::HttpCompletionClient;
pub use error::{AnalysisError, ErrorInfo, ErrorKind};
pub use runner::{split_into_batches, BatchOrchestrator, PipelineRun};
pub use traits::{ByteStream, CompletionTransport};
pub use types::*;
