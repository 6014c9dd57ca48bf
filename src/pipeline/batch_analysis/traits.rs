//! Transport seam between the orchestrator and the completion endpoint.
//!
//! Production uses `HttpCompletionClient`; tests script responses with a mock.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use super::api_types::CompletionRequest;
use super::error::AnalysisError;
use crate::config::AnalysisConfig;

/// Raw response body chunks of one streaming call.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, AnalysisError>> + Send>>;

pub trait CompletionTransport: Send + Sync {
    /// Send `request` and return the response body as a byte stream.
    ///
    /// Non-success statuses are errors here (429 → `RateLimited`,
    /// others → `Http`); the body is only streamed for 2xx responses.
    fn open_stream(
        &self,
        config: &AnalysisConfig,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<ByteStream, AnalysisError>> + Send;
}
