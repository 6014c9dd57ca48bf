//! Syntax-only repairs for near-valid JSON objects.
//!
//! Each repair rewrites code outside string literals and leaves literal
//! contents untouched. Repairs are applied cumulatively in a fixed order and
//! the text is re-parsed after each one; the first parse that succeeds wins.

use super::parser::parse_object;
use super::StructuringError;

type Repair = fn(&str) -> String;

const REPAIRS: [(&str, Repair); 4] = [
    ("truncate_after_last_brace", truncate_after_last_brace),
    ("quote_bare_keys", quote_bare_keys),
    ("drop_trailing_commas", drop_trailing_commas),
    ("quote_bare_values", quote_bare_values),
];

/// Run the repair chain over `candidate`.
///
/// Returns the first repaired text that parses as an object, or the parse
/// failure of the fully repaired text.
pub fn repair_json(candidate: &str) -> Result<String, StructuringError> {
    let mut text = candidate.to_string();
    let mut last_error = match parse_object(&text) {
        Ok(_) => return Ok(text),
        Err(e) => e,
    };

    for (name, repair) in REPAIRS {
        text = repair(&text);
        match parse_object(&text) {
            Ok(_) => {
                tracing::debug!(repair = name, "JSON repaired");
                return Ok(text);
            }
            Err(e) => last_error = e,
        }
    }

    tracing::debug!(error = %last_error, "JSON repair exhausted");
    Err(last_error)
}

// ═══════════════════════════════════════════════════════════
// String-literal segmentation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    /// Structural text between string literals.
    Code(&'a str),
    /// A string literal including its quotes (the closing quote may be missing at end of text).
    Literal(&'a str),
}

impl Segment<'_> {
    fn as_str(&self) -> &str {
        match self {
            Segment::Code(s) | Segment::Literal(s) => s,
        }
    }
}

fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                out.push(Segment::Literal(&text[start..=i]));
                start = i + 1;
                in_string = false;
            }
        } else if c == '"' {
            if start < i {
                out.push(Segment::Code(&text[start..i]));
            }
            start = i;
            in_string = true;
        }
    }

    if start < text.len() {
        let rest = &text[start..];
        out.push(if in_string {
            Segment::Literal(rest)
        } else {
            Segment::Code(rest)
        });
    }
    out
}

/// Rebuild `text`, passing every code segment through `f`.
fn map_code(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for seg in segments(text) {
        match seg {
            Segment::Code(code) => out.push_str(&f(code)),
            Segment::Literal(lit) => out.push_str(lit),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Repairs
// ═══════════════════════════════════════════════════════════

/// Drop everything after the last structural `}`.
fn truncate_after_last_brace(text: &str) -> String {
    let mut offset = 0;
    let mut cut = None;
    for seg in segments(text) {
        if let Segment::Code(code) = seg {
            if let Some(i) = code.rfind('}') {
                cut = Some(offset + i + 1);
            }
        }
        offset += seg.as_str().len();
    }
    match cut {
        Some(end) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// `{ key: 1, other_key : 2 }` → `{ "key": 1, "other_key": 2 }`
fn quote_bare_keys(text: &str) -> String {
    map_code(text, |code| {
        let bytes = code.as_bytes();
        let mut out = String::with_capacity(code.len() + 8);
        let mut copied = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'{' || bytes[i] == b',' {
                let key_start = skip_ws(bytes, i + 1);
                if key_start < bytes.len() && is_ident_start(bytes[key_start]) {
                    let mut key_end = key_start + 1;
                    while key_end < bytes.len() && is_ident_continue(bytes[key_end]) {
                        key_end += 1;
                    }
                    let colon = skip_ws(bytes, key_end);
                    if colon < bytes.len() && bytes[colon] == b':' {
                        out.push_str(&code[copied..key_start]);
                        out.push('"');
                        out.push_str(&code[key_start..key_end]);
                        out.push_str("\":");
                        copied = colon + 1;
                        i = colon + 1;
                        continue;
                    }
                }
            }
            i += 1;
        }

        out.push_str(&code[copied..]);
        out
    })
}

/// `[1, 2, ]` → `[1, 2 ]`
fn drop_trailing_commas(text: &str) -> String {
    map_code(text, |code| {
        let bytes = code.as_bytes();
        let mut out = String::with_capacity(code.len());
        let mut copied = 0;

        for (i, &b) in bytes.iter().enumerate() {
            if b != b',' {
                continue;
            }
            let next = skip_ws(bytes, i + 1);
            if next < bytes.len() && (bytes[next] == b'}' || bytes[next] == b']') {
                out.push_str(&code[copied..i]);
                copied = i + 1;
            }
        }

        out.push_str(&code[copied..]);
        out
    })
}

fn is_bare_literal(value: &str) -> bool {
    matches!(value, "true" | "false" | "null") || serde_json::from_str::<serde_json::Number>(value).is_ok()
}

/// `{"level": high, "score": 80}` → `{"level":"high", "score":80}`
///
/// A bare value runs from the `:` up to the next `,` or `}`; values that reach
/// a bracket or another literal first are left alone.
fn quote_bare_values(text: &str) -> String {
    map_code(text, |code| {
        let bytes = code.as_bytes();
        let mut out = String::with_capacity(code.len() + 8);
        let mut copied = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b':' {
                i += 1;
                continue;
            }

            let value_start = i + 1;
            let mut end = value_start;
            while end < bytes.len() && !matches!(bytes[end], b'"' | b',' | b'{' | b'}' | b'[' | b']') {
                end += 1;
            }

            let terminated = end < bytes.len() && matches!(bytes[end], b',' | b'}');
            let value = code[value_start..end].trim();
            if terminated && !value.is_empty() {
                // keep whitespace that preceded the terminator
                let trailing_ws = &code[value_start..end][code[value_start..end].trim_end().len()..];
                out.push_str(&code[copied..=i]);
                if is_bare_literal(value) {
                    out.push_str(value);
                } else {
                    out.push('"');
                    out.push_str(&value.replace('\\', "\\\\"));
                    out.push('"');
                }
                out.push_str(trailing_ws);
                copied = end;
            }
            i = end.max(i + 1);
        }

        out.push_str(&code[copied..]);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn segments_split_literals_from_code() {
        let segs = segments(r#"{"a": "x\"y", b: 1}"#);
        assert_eq!(
            segs,
            vec![
                Segment::Code("{"),
                Segment::Literal(r#""a""#),
                Segment::Code(": "),
                Segment::Literal(r#""x\"y""#),
                Segment::Code(", b: 1}"),
            ]
        );
    }

    #[test]
    fn unterminated_literal_is_kept_as_literal() {
        let segs = segments(r#"{"a": "open"#);
        assert_eq!(segs.last(), Some(&Segment::Literal(r#""open"#)));
    }

    #[test]
    fn truncates_trailing_garbage() {
        assert_eq!(truncate_after_last_brace(r#"{"a": 1} trailing"#), r#"{"a": 1}"#);
        // a brace inside a literal is not a cut point
        assert_eq!(
            truncate_after_last_brace(r#"{"a": 1} "}" x"#),
            r#"{"a": 1}"#
        );
    }

    #[test]
    fn quotes_bare_keys() {
        let fixed = quote_bare_keys(r#"{riskLevel: "low", risk_score : 10}"#);
        let v = parse(&fixed);
        assert_eq!(v["riskLevel"], "low");
        assert_eq!(v["risk_score"], 10);
    }

    #[test]
    fn drops_trailing_commas() {
        let fixed = drop_trailing_commas(r#"{"a": [1, 2, ], "b": 3, }"#);
        let v = parse(&fixed);
        assert_eq!(v["a"], serde_json::json!([1, 2]));
        assert_eq!(v["b"], 3);
    }

    #[test]
    fn quotes_bare_values_but_not_literals() {
        let fixed = quote_bare_values(r#"{"level": high, "score": 80, "ok": true, "n": null}"#);
        let v = parse(&fixed);
        assert_eq!(v["level"], "high");
        assert_eq!(v["score"], 80);
        assert_eq!(v["ok"], true);
        assert!(v["n"].is_null());
    }

    #[test]
    fn repairs_never_touch_string_contents() {
        let literal = r#""keep {a: b}, , ] as-is""#;
        let text = format!(r#"{{summary: {literal}, level: high,}}"#);
        let repaired = repair_json(&text).unwrap();
        let v = parse(&repaired);
        assert_eq!(v["summary"], "keep {a: b}, , ] as-is");
        assert_eq!(v["level"], "high");
    }

    #[test]
    fn combined_repairs_apply_cumulatively() {
        let text = r#"{riskLevel: medium, riskScore: 55, recommendations: ["a", "b",],} -- end"#;
        let repaired = repair_json(text).unwrap();
        let v = parse(&repaired);
        assert_eq!(v["riskLevel"], "medium");
        assert_eq!(v["riskScore"], 55);
        assert_eq!(v["recommendations"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn valid_input_is_returned_unchanged() {
        let text = r#"{"a": 1}"#;
        assert_eq!(repair_json(text).unwrap(), text);
    }

    #[test]
    fn hopeless_input_reports_parse_location() {
        let err = repair_json("{ [[[ }").unwrap_err();
        assert!(matches!(err, StructuringError::UnrepairableJson { .. }));
    }
}
