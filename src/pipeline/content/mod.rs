//! Content normalization ahead of batching.
//!
//! Drops low-value fragments (acknowledgements, emoji-only replies) and
//! near-duplicates, preserving the original order of what remains.

pub mod dedup;
pub mod filter;

pub use dedup::{deduplicate, jaccard_similarity, normalize_text};
pub use filter::filter_useless;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user-authored fragment to analyze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub text: String,
    #[serde(default, alias = "timestamp")]
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Opaque reference back to the origin (post id, URL).
    #[serde(default)]
    pub source_ref: String,
}

impl ContentItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_timestamp: None,
            source_ref: String::new(),
        }
    }
}

/// Filter, then deduplicate.
pub fn prepare_content(raw: Vec<ContentItem>) -> Vec<ContentItem> {
    let total = raw.len();
    let kept: Vec<ContentItem> = raw
        .into_iter()
        .filter(|item| !filter_useless(&item.text))
        .collect();
    let after_filter = kept.len();
    let unique = deduplicate(kept);

    tracing::debug!(
        total,
        filtered = total - after_filter,
        duplicates = after_filter - unique.len(),
        kept = unique.len(),
        "Content prepared"
    );
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_filters_then_dedups() {
        let raw = vec![
            ContentItem::new("thanks!"),
            ContentItem::new("I moved to Berlin last spring for a new job"),
            ContentItem::new("😂😂😂😂"),
            ContentItem::new("I moved to  Berlin last spring for a new job"),
            ContentItem::new("My cat is called Pixel and she is twelve"),
        ];
        let out = prepare_content(raw);
        let texts: Vec<&str> = out.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "I moved to Berlin last spring for a new job",
                "My cat is called Pixel and she is twelve",
            ]
        );
    }

    #[test]
    fn content_item_accepts_timestamp_alias() {
        let item: ContentItem = serde_json::from_str(
            r#"{"text": "hello world", "timestamp": "2024-05-01T08:00:00Z", "sourceRef": "post/1"}"#,
        )
        .unwrap();
        assert!(item.source_timestamp.is_some());
        assert_eq!(item.source_ref, "post/1");
    }
}
