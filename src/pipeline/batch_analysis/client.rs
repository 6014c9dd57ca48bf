use futures_util::StreamExt;

use super::api_types::{CompletionRequest, CompletionResponse};
use super::error::AnalysisError;
use super::traits::{ByteStream, CompletionTransport};
use crate::config::{AnalysisConfig, APP_NAME, APP_VERSION};
use crate::pipeline::structuring::{excerpt, EXCERPT_CHARS};

/// HTTP client for OpenAI-compatible chat-completion endpoints.
///
/// No overall request timeout is set on the client: analysis responses stream
/// for as long as the model generates. Per-attempt limits are enforced by the
/// orchestrator (open) and the stream decoder (idle gaps).
pub struct HttpCompletionClient {
    client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new() -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
            .build()
            .map_err(|e| AnalysisError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Send a tiny non-streaming request and require a non-empty `choices` array.
    pub async fn check_connection(&self, config: &AnalysisConfig) -> Result<(), AnalysisError> {
        config.validate()?;

        let request = CompletionRequest::connection_check(&config.model_name);
        let response = self
            .client
            .post(&config.endpoint_url)
            .bearer_auth(&config.api_key)
            .timeout(config.timeout())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, config.timeout_secs))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Transport(format!("invalid check response: {e}")))?;

        if parsed.choices.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        tracing::info!(model = %config.model_name, "Connection check passed");
        Ok(())
    }
}

impl CompletionTransport for HttpCompletionClient {
    async fn open_stream(
        &self,
        config: &AnalysisConfig,
        request: &CompletionRequest,
    ) -> Result<ByteStream, AnalysisError> {
        let response = self
            .client
            .post(&config.endpoint_url)
            .bearer_auth(&config.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| map_send_error(e, config.timeout_secs))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| AnalysisError::Transport(format!("stream interrupted: {e}")))
        });
        Ok(Box::pin(stream))
    }
}

fn map_send_error(e: reqwest::Error, timeout_secs: u64) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout { secs: timeout_secs }
    } else if e.is_connect() {
        AnalysisError::Transport(format!("cannot connect to endpoint: {e}"))
    } else {
        AnalysisError::Transport(e.to_string())
    }
}

/// Map a non-success HTTP status to an error. 429 is the rate-limit path.
fn status_error(status: u16, body: &str) -> AnalysisError {
    if status == 429 {
        return AnalysisError::RateLimited;
    }
    AnalysisError::Http {
        status,
        body: excerpt(body.trim(), EXCERPT_CHARS),
    }
}
