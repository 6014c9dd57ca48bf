//! Prompt construction for one analysis batch.
//!
//! The model is asked for a single holistic JSON object per batch, not one
//! verdict per item; the schema below mirrors what `structuring::validation`
//! normalizes.

use chrono::Utc;

use super::api_types::ChatMessage;
use crate::pipeline::content::ContentItem;

/// Separator placed between item texts in the user message.
pub const ITEM_SEPARATOR: &str = "\n---\n";

pub const SYSTEM_PROMPT: &str = "You are a personal privacy security analyst. \
Identify personal-information leak risks in social media content: contact details, \
identity information, addresses, financial information and similar. Be accurate and \
objective; recommendations must be practical and specific. Output strictly one JSON \
object in the required format with no explanatory text. Non-JSON output is a violation.";

const DETECTION_TARGETS: &str = "\
## Detection targets (by priority)

### High risk (always check)
- Email addresses, phone numbers, messaging account handles
- Real names, national ID numbers, document details
- Home address, workplace address, precise locations
- Bank accounts, payment details, financial situation

### Medium risk
- Employer, job title, colleague names
- School, major, class details
- Family member names, relationships
- Health conditions, illnesses, medical visits

### Low risk
- Detailed hobbies, spending habits
- Behavioral patterns, daily schedule
- Software, hardware and device models";

const SCORING_BANDS: &str = "\
## Scoring
- **High (70-100)**: contains core information usable directly for impersonation or fraud
- **Medium (40-69)**: contains significant personal information that could leak privacy when combined
- **Low (0-39)**: information is relatively safe, leak risk is low";

/// Build the system and user messages for batch `batch_number` of `total_batches`.
pub fn build_messages(items: &[ContentItem], batch_number: usize, total_batches: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_user_prompt(items, batch_number, total_batches)),
    ]
}

pub fn build_user_prompt(items: &[ContentItem], batch_number: usize, total_batches: usize) -> String {
    let count = items.len();
    let contents = items
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join(ITEM_SEPARATOR);

    let batch_info = if total_batches > 1 {
        format!("\n\n**Batch**: {batch_number} of {total_batches}, {count} items in this batch")
    } else {
        String::new()
    };

    format!(
        r#"# Privacy risk analysis{batch_info}

Analyze the following {count} social media posts for privacy risk as a whole.

**Analyze holistically. Do not assess each post separately; identify leak patterns and risk points across all of them.**

## Content
{contents}

## Method
1. **Scan**: read all content and spot key risk information
2. **Patterns**: look for leaks that span several posts
3. **Aggregate**: merge similar risks, do not repeat them
4. **Focus**: report only privacy risks that matter

{DETECTION_TARGETS}

{SCORING_BANDS}

## Output
**Respond with exactly this JSON structure and nothing else, no prose and no markdown:**

{{
  "riskLevel": "low|medium|high",
  "riskScore": <number 0-100>,
  "summary": "overall risk summary (under 100 words, main risk types and severity)",
  "detectedRisks": [
    {{
      "type": "risk type",
      "content": "summary of the sensitive information found (redacted)",
      "severity": "low|medium|high",
      "description": "impact of this risk",
      "recommendation": "targeted protection advice"
    }}
  ],
  "recommendations": [
    "specific protection advice based on the risks found"
  ],
  "metadata": {{
    "totalAnalyzed": {count},
    "timestamp": "{timestamp}",
    "confidence": "high|medium|low"
  }}
}}

**Requirements:**
1. Valid JSON only
2. Holistic analysis, not per post
3. Report only risks actually found; none found means low risk
4. Concrete, actionable recommendations
5. Redact sensitive values in `content`"#,
        timestamp = Utc::now().to_rfc3339(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<ContentItem> {
        (0..n).map(|i| ContentItem::new(format!("post number {i}"))).collect()
    }

    #[test]
    fn joins_items_with_separator() {
        let prompt = build_user_prompt(&items(3), 1, 1);
        assert!(prompt.contains("post number 0\n---\npost number 1\n---\npost number 2"));
        assert!(prompt.contains("following 3 social media posts"));
    }

    #[test]
    fn batch_info_only_for_multi_batch_runs() {
        assert!(!build_user_prompt(&items(2), 1, 1).contains("**Batch**"));
        assert!(build_user_prompt(&items(2), 2, 3).contains("**Batch**: 2 of 3, 2 items"));
    }

    #[test]
    fn schema_is_embedded() {
        let prompt = build_user_prompt(&items(1), 1, 1);
        assert!(prompt.contains("\"riskLevel\": \"low|medium|high\""));
        assert!(prompt.contains("\"totalAnalyzed\": 1"));
        assert!(prompt.contains("70-100"));
    }

    #[test]
    fn messages_are_system_then_user() {
        let msgs = build_messages(&items(1), 1, 1);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
    }
}
