//! Chat-completion API contract (OpenAI-compatible).

use serde::{Deserialize, Serialize};

/// Sampling temperature for analysis calls.
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// Generation cap for analysis calls.
pub const ANALYSIS_MAX_TOKENS: u32 = 50_000;

/// Generation cap for the connection check.
pub const CHECK_MAX_TOKENS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Request body for `POST {endpoint}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl CompletionRequest {
    /// Streaming analysis request.
    pub fn analysis(model: &str, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            temperature: ANALYSIS_TEMPERATURE,
            max_tokens: ANALYSIS_MAX_TOKENS,
            stream: true,
        }
    }

    /// Minimal non-streaming request used to verify credentials and model.
    pub fn connection_check(model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::user("Hi")],
            temperature: ANALYSIS_TEMPERATURE,
            max_tokens: CHECK_MAX_TOKENS,
            stream: false,
        }
    }
}

/// Non-streaming response body. Only `choices` matters for the connection check.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_request_serializes_expected_body() {
        let req = CompletionRequest::analysis(
            "gpt-4o-mini",
            vec![ChatMessage::system("sys"), ChatMessage::user("usr")],
        );
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "gpt-4o-mini");
        assert_eq!(v["stream"], true);
        assert_eq!(v["max_tokens"], 50_000);
        assert!((v["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "usr");
    }

    #[test]
    fn connection_check_is_tiny_and_unstreamed() {
        let req = CompletionRequest::connection_check("m");
        assert!(!req.stream);
        assert_eq!(req.max_tokens, 10);
        assert_eq!(req.messages, vec![ChatMessage::user("Hi")]);
    }

    #[test]
    fn response_without_choices_defaults_empty() {
        let r: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(r.choices.is_empty());
    }
}
