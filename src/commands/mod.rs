//! Command surface: each command returns `Result<T, String>` with a
//! display-ready error, leaving rendering to the caller.

pub mod analyze;

pub use analyze::{analyze_file, check_connection, load_items};

use crate::config::AnalysisConfig;

/// Command-line overrides layered over the environment configuration.
///
/// The API key is deliberately absent: it is read from the environment only.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint_url: Option<String>,
    pub model_name: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(url) = &self.endpoint_url {
            config.endpoint_url = url.trim().to_string();
        }
        if let Some(model) = &self.model_name {
            config.model_name = model.trim().to_string();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config
    }

    /// Environment config with these overrides applied.
    pub fn resolve(&self) -> AnalysisConfig {
        self.apply(AnalysisConfig::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = AnalysisConfig::new("https://a.test/v1", "key", "model-a");
        let overrides = ConfigOverrides {
            model_name: Some(" model-b ".into()),
            timeout_secs: Some(90),
            ..Default::default()
        };
        let cfg = overrides.apply(base);
        assert_eq!(cfg.endpoint_url, "https://a.test/v1");
        assert_eq!(cfg.model_name, "model-b");
        assert_eq!(cfg.timeout_secs, 90);
        assert_eq!(cfg.api_key, "key");
    }
}
