use serde_json::Value;

use super::repair::repair_json;
use super::types::RiskRecord;
use super::validation::normalize_record;
use super::{excerpt, StructuringError, EXCERPT_CHARS};

/// Parse accumulated model output into a normalized `RiskRecord`.
///
/// `item_count` is the number of items in the batch the output answers; it
/// backs `metadata.totalAnalyzed` when the model omits it.
pub fn parse_risk_response(raw: &str, item_count: usize) -> Result<RiskRecord, StructuringError> {
    let json = extract_json_object(raw)?;
    let value = parse_object(&json)?;
    Ok(normalize_record(&value, item_count))
}

/// Locate the first JSON object in noisy model output and return text that parses.
///
/// 1. strip a leading code fence (```` ``` ```` or ```` ```json ````) and a trailing one
/// 2. start at the first `{`
/// 3. string-aware brace scan; the first balanced object wins
/// 4. unbalanced at end of text: append the missing closing braces
/// 5. strict parse, then cumulative syntax repairs
pub fn extract_json_object(raw: &str) -> Result<String, StructuringError> {
    let cleaned = strip_code_fences(raw);
    let start = cleaned.find('{').ok_or(StructuringError::NotFound)?;
    let candidate = &cleaned[start..];

    let text = match scan_first_object(candidate) {
        BraceScan::Balanced { end } => candidate[..end].to_string(),
        BraceScan::Unbalanced { depth } => {
            tracing::debug!(missing = depth, "JSON object truncated, completing closing braces");
            format!("{candidate}{}", "}".repeat(depth))
        }
    };

    if parse_object(&text).is_ok() {
        return Ok(text);
    }

    repair_json(&text)
}

/// Strict parse that only accepts a JSON object.
pub(crate) fn parse_object(text: &str) -> Result<Value, StructuringError> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(StructuringError::UnrepairableJson {
            excerpt: excerpt(text, EXCERPT_CHARS),
            line: 1,
            column: 1,
            message: "top-level value is not an object".into(),
        }),
        Err(e) => Err(StructuringError::UnrepairableJson {
            excerpt: excerpt(text, EXCERPT_CHARS),
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }),
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }

    s.trim()
}

// ═══════════════════════════════════════════════════════════
// Brace scanner
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceScan {
    /// Byte offset one past the closing brace.
    Balanced { end: usize },
    /// Text ended with this many objects still open.
    Unbalanced { depth: usize },
}

#[derive(Debug, Default)]
struct BraceScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl BraceScanner {
    /// Feed one character. Returns true when the outermost object just closed.
    fn step(&mut self, c: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match c {
            '\\' if self.in_string => self.escaped = true,
            '"' => self.in_string = !self.in_string,
            '{' if !self.in_string => self.depth += 1,
            '}' if !self.in_string && self.depth > 0 => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

/// `text` must start with `{`.
fn scan_first_object(text: &str) -> BraceScan {
    let mut scanner = BraceScanner::default();
    for (i, c) in text.char_indices() {
        if scanner.step(c) {
            return BraceScan::Balanced { end: i + c.len_utf8() };
        }
    }
    BraceScan::Unbalanced {
        depth: scanner.depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::RiskLevel;

    #[test]
    fn extracts_object_from_prose() {
        let raw = r#"Sure! Here is the analysis: {"riskLevel": "low"} Hope that helps."#;
        assert_eq!(extract_json_object(raw).unwrap(), r#"{"riskLevel": "low"}"#);
    }

    #[test]
    fn extracts_object_from_code_fence() {
        let raw = "```json\n{\"riskScore\": 12}\n```";
        assert_eq!(extract_json_object(raw).unwrap(), "{\"riskScore\": 12}");

        let raw = "```JSON\n{\"riskScore\": 12}\n```";
        assert_eq!(extract_json_object(raw).unwrap(), "{\"riskScore\": 12}");
    }

    #[test]
    fn braces_inside_strings_do_not_end_object() {
        let object = r#"{"summary": "uses } and { freely", "nested": {"q": "\"}\""}}"#;
        let raw = format!("Analysis follows.\n{object} trailing }} noise");
        assert_eq!(extract_json_object(&raw).unwrap(), object);
    }

    #[test]
    fn embedded_object_is_returned_exactly() {
        let object = r#"{"a": {"b": "}{"}, "c": [1, 2, {"d": "x"}]}"#;
        for wrapper in [
            format!("{object}"),
            format!("Result:\n{object}\nDone."),
            format!("```json\n{object}\n```"),
            format!("```\n{object}\n``` and then {{\"second\": 1}}"),
        ] {
            assert_eq!(extract_json_object(&wrapper).unwrap(), object, "wrapper: {wrapper}");
        }
    }

    #[test]
    fn first_balanced_object_wins() {
        let raw = r#"{"first": 1} {"second": 2}"#;
        assert_eq!(extract_json_object(raw).unwrap(), r#"{"first": 1}"#);
    }

    #[test]
    fn truncated_object_gets_closing_braces() {
        let full = r#"{"a": {"b": {"c": {"d": 1}}}}"#;
        for k in 1..=4 {
            let truncated = &full[..full.len() - k];
            let fixed = extract_json_object(truncated).unwrap();
            let value: Value = serde_json::from_str(&fixed).unwrap();
            assert_eq!(value["a"]["b"]["c"]["d"], 1, "k = {k}");
        }
    }

    #[test]
    fn missing_brace_yields_not_found() {
        assert_eq!(
            extract_json_object("no json here at all"),
            Err(StructuringError::NotFound)
        );
        assert_eq!(extract_json_object(""), Err(StructuringError::NotFound));
    }

    #[test]
    fn garbage_object_is_unrepairable_with_location() {
        let err = extract_json_object("{ ::: [[[ ").unwrap_err();
        match err {
            StructuringError::UnrepairableJson { excerpt, line, .. } => {
                assert!(excerpt.starts_with('{'));
                assert!(line >= 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn scanner_handles_escaped_quotes() {
        assert_eq!(
            scan_first_object(r#"{"k": "a\"}"} tail"#),
            BraceScan::Balanced { end: 13 }
        );
        assert_eq!(scan_first_object(r#"{"k": {"#), BraceScan::Unbalanced { depth: 2 });
    }

    #[test]
    fn parse_risk_response_normalizes() {
        let raw = "```json\n{\"riskLevel\": \"HIGH\", \"riskScore\": 88.6, \"summary\": \"Phone number posted\"}\n```";
        let record = parse_risk_response(raw, 3).unwrap();
        assert_eq!(record.risk_level, RiskLevel::High);
        assert_eq!(record.risk_score, 89);
        assert_eq!(record.metadata.total_analyzed, 3);
    }

    #[test]
    fn top_level_array_is_not_accepted() {
        assert!(parse_object("[1, 2]").is_err());
    }
}
