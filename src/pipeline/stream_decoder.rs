//! Incremental decoder for OpenAI-compatible server-sent event streams.
//!
//! `SseDecoder` is the pure line state machine: bytes in, text deltas out.
//! `drain_stream` drives it over an async byte stream with cancellation and
//! an idle timeout, accumulating the full generated text.
//!
//! Wire format consumed:
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::pipeline::batch_analysis::AnalysisError;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Line decoder
// ═══════════════════════════════════════════════════════════

/// Splits a byte stream into SSE lines and extracts `choices[0].delta.content`.
///
/// Bytes are buffered until a newline arrives, so deltas (and multi-byte
/// characters) split across chunk boundaries are reassembled.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    done: bool,
    skipped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk. Returns the deltas completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.pending.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(delta) = self.decode_line(&line) {
                deltas.push(delta);
            }
            if self.done {
                self.pending.clear();
                break;
            }
        }
        deltas
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Vec<String> {
        if self.done || self.pending.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.pending);
        self.decode_line(&line).into_iter().collect()
    }

    /// True once `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Data lines that were dropped as malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();

        // blank lines, `:` comments, `event:`/`id:`/`retry:` fields
        let payload = line.strip_prefix(DATA_PREFIX)?.trim_start();
        if payload.is_empty() {
            return None;
        }
        if payload == DONE_SENTINEL {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content)
                .filter(|s| !s.is_empty()),
            Err(e) => {
                self.skipped += 1;
                tracing::debug!(error = %e, len = payload.len(), "Skipping malformed stream fragment");
                None
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Async driver
// ═══════════════════════════════════════════════════════════

/// Result of draining a stream to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    pub text: String,
    pub deltas: usize,
}

/// Consume `stream` until it ends or sends `[DONE]`, accumulating delta text.
///
/// `on_delta` receives the accumulated text after every delta. Cancellation is
/// raced against every chunk read and checked after every delta. Waiting longer
/// than `idle_timeout` for a chunk fails with `Timeout`. The stream is dropped
/// on every return path, which closes the underlying connection.
pub async fn drain_stream<S, F>(
    mut stream: S,
    cancel: &CancellationToken,
    idle_timeout: Duration,
    mut on_delta: F,
) -> Result<DecodedStream, AnalysisError>
where
    S: Stream<Item = Result<Vec<u8>, AnalysisError>> + Unpin,
    F: FnMut(&str),
{
    let mut decoder = SseDecoder::new();
    let mut text = String::new();
    let mut deltas = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            next = tokio::time::timeout(idle_timeout, stream.next()) => next,
        };

        let chunk = match next {
            Err(_) => {
                return Err(AnalysisError::Timeout {
                    secs: idle_timeout.as_secs(),
                })
            }
            Ok(None) => break,
            Ok(Some(chunk)) => chunk?,
        };

        for delta in decoder.push(&chunk) {
            text.push_str(&delta);
            deltas += 1;
            on_delta(&text);
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
        }

        if decoder.is_done() {
            break;
        }
    }

    for delta in decoder.finish() {
        text.push_str(&delta);
        deltas += 1;
        on_delta(&text);
    }

    if decoder.skipped() > 0 {
        tracing::debug!(skipped = decoder.skipped(), "Stream had malformed fragments");
    }

    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    Ok(DecodedStream { text, deltas })
}
