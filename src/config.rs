use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::pipeline::batch_analysis::AnalysisError;

/// Application-level constants
pub const APP_NAME: &str = "RiskLens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Content items per analysis batch (fixed, one streaming call each).
pub const BATCH_SIZE: usize = 500;

/// Per-attempt timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variables read by `AnalysisConfig::from_env()`.
pub const ENV_ENDPOINT_URL: &str = "RISKLENS_ENDPOINT_URL";
pub const ENV_API_KEY: &str = "RISKLENS_API_KEY";
pub const ENV_MODEL: &str = "RISKLENS_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "RISKLENS_TIMEOUT_SECS";

/// True for debug builds. Enables the diagnostic dump by default.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "risklens_lib=debug,risklens=debug,info"
    } else {
        "risklens_lib=info,risklens=info,warn"
    }
}

/// Get the application data directory (`~/RiskLens`).
///
/// Falls back to the current directory when no home directory is known
/// (containers, service accounts).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

// ═══════════════════════════════════════════════════════════
// Analysis configuration
// ═══════════════════════════════════════════════════════════

/// Connection settings for the chat-completion endpoint.
///
/// Every field is required before any call is made; see [`AnalysisConfig::validate`].
/// The API key is wiped from memory when the config is dropped.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[zeroize(skip)]
    pub endpoint_url: String,
    pub api_key: String,
    #[zeroize(skip)]
    pub model_name: String,
    #[zeroize(skip)]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl AnalysisConfig {
    pub fn new(endpoint_url: &str, api_key: &str, model_name: &str) -> Self {
        Self {
            endpoint_url: endpoint_url.trim().to_string(),
            api_key: api_key.trim().to_string(),
            model_name: model_name.trim().to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build a config from `RISKLENS_*` environment variables.
    ///
    /// Missing variables become empty strings so that `validate()` reports
    /// exactly which field is absent. An unparsable timeout falls back to the default.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).unwrap_or_default();
        let timeout_secs = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(&read(ENV_ENDPOINT_URL), &read(ENV_API_KEY), &read(ENV_MODEL))
            .with_timeout_secs(timeout_secs)
    }

    /// Fail fast on incomplete configuration. No network call may proceed without this.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.model_name.trim().is_empty() {
            return Err(AnalysisError::Validation("model name is required".into()));
        }
        if self.endpoint_url.trim().is_empty() {
            return Err(AnalysisError::Validation("endpoint URL is required".into()));
        }
        validate_endpoint_url(&self.endpoint_url)?;
        if self.api_key.trim().is_empty() {
            return Err(AnalysisError::Validation("API key is required".into()));
        }
        if self.timeout_secs == 0 {
            return Err(AnalysisError::Validation(
                "timeout must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"[redacted]")
            .field("model_name", &self.model_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Check that an endpoint URL has an http(s) scheme and a non-empty host.
pub fn validate_endpoint_url(url: &str) -> Result<(), AnalysisError> {
    let after_scheme = url
        .trim()
        .strip_prefix("http://")
        .or_else(|| url.trim().strip_prefix("https://"))
        .ok_or_else(|| {
            AnalysisError::Validation(format!("endpoint URL must start with http:// or https://: {url}"))
        })?;

    let host = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(AnalysisError::Validation(format!(
            "endpoint URL has no valid host: {url}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AnalysisConfig {
        AnalysisConfig::new(
            "https://api.example.com/v1/chat/completions",
            "sk-test-key",
            "gpt-4o-mini",
        )
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("RiskLens"));
    }

    #[test]
    fn batch_size_is_500() {
        assert_eq!(BATCH_SIZE, 500);
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
        assert_eq!(valid().timeout_secs, 30);
    }

    #[test]
    fn empty_fields_fail_validation() {
        let mut c = valid();
        c.api_key.clear();
        assert!(matches!(c.validate(), Err(AnalysisError::Validation(_))));

        let mut c = valid();
        c.model_name = "   ".into();
        assert!(matches!(c.validate(), Err(AnalysisError::Validation(_))));

        let mut c = valid();
        c.endpoint_url.clear();
        assert!(matches!(c.validate(), Err(AnalysisError::Validation(_))));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let c = valid().with_timeout_secs(0);
        assert!(matches!(c.validate(), Err(AnalysisError::Validation(_))));
    }

    #[test]
    fn endpoint_requires_scheme_and_host() {
        assert!(validate_endpoint_url("http://localhost:8080/v1").is_ok());
        assert!(validate_endpoint_url("https://api.example.com").is_ok());
        assert!(validate_endpoint_url("api.example.com/v1").is_err());
        assert!(validate_endpoint_url("https://").is_err());
        assert!(validate_endpoint_url("ftp://example.com").is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("sk-test-key"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn deserializes_with_default_timeout() {
        let c: AnalysisConfig = serde_json::from_str(
            r#"{"endpointUrl":"https://x.test/v1","apiKey":"k","modelName":"m"}"#,
        )
        .unwrap();
        assert_eq!(c.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(c.timeout(), Duration::from_secs(30));
    }
}
