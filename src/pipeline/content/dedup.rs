//! Near-duplicate removal over content fragments.
//!
//! Greedy and order-preserving: each fragment is compared against every
//! fragment already accepted, so the first occurrence of a cluster wins.

use std::collections::HashSet;

use super::ContentItem;

/// Normalized fragments shorter than this are dropped.
const MIN_NORMALIZED_CHARS: usize = 5;

/// Word-set Jaccard similarity above which a fragment counts as a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Collapse whitespace runs to one space, trim, lowercase.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Jaccard similarity of the whitespace-token sets of `a` and `b`.
///
/// Identical strings score 1.0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 1.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Drop short and near-duplicate fragments, keeping input order.
pub fn deduplicate(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut accepted: Vec<String> = Vec::new();
    let mut unique = Vec::with_capacity(items.len());

    for item in items {
        let normalized = normalize_text(&item.text);
        if normalized.chars().count() < MIN_NORMALIZED_CHARS {
            continue;
        }

        let is_duplicate = accepted
            .iter()
            .any(|seen| jaccard_similarity(&normalized, seen) > SIMILARITY_THRESHOLD);

        if !is_duplicate {
            accepted.push(normalized);
            unique.push(item);
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(texts: &[&str]) -> Vec<ContentItem> {
        texts.iter().map(|t| ContentItem::new(*t)).collect()
    }

    fn texts(items: &[ContentItem]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Hello \n\t WORLD  "), "hello world");
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(jaccard_similarity("a b c", "a b c"), 1.0);
        assert_eq!(jaccard_similarity("", ""), 1.0);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert_eq!(jaccard_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn partial_overlap_ratio() {
        // {a,b,c} vs {b,c,d}: 2 / 4
        assert!((jaccard_similarity("a b c", "b c d") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_and_case_duplicates_removed() {
        let out = deduplicate(items(&[
            "I live in Lyon near the river",
            "i live in LYON near   the river",
            "Something else entirely here",
        ]));
        assert_eq!(
            texts(&out),
            vec!["I live in Lyon near the river", "Something else entirely here"]
        );
    }

    #[test]
    fn short_fragments_dropped() {
        let out = deduplicate(items(&["abcd", "  a  b ", "abcde"]));
        assert_eq!(texts(&out), vec!["abcde"]);
    }

    #[test]
    fn order_preserved_first_wins() {
        let out = deduplicate(items(&[
            "third post about my commute",
            "first post about my garden",
            "third post about my commute",
        ]));
        assert_eq!(
            texts(&out),
            vec!["third post about my commute", "first post about my garden"]
        );
    }

    #[test]
    fn output_satisfies_length_and_similarity_bounds() {
        let corpus = [
            "my email is someone@example.com",
            "My email is someone@example.com",
            "my email is someone@example.com today",
            "ok",
            "the weather is nice in Porto today",
            "the weather is nice in Porto today!",
            "I work at the hospital on night shifts",
            "I work at the hospital on day shifts",
            "    ",
            "hi you",
        ];
        let out = deduplicate(items(&corpus));

        let normalized: Vec<String> = out.iter().map(|i| normalize_text(&i.text)).collect();
        for n in &normalized {
            assert!(n.chars().count() >= MIN_NORMALIZED_CHARS, "{n}");
        }
        for (i, a) in normalized.iter().enumerate() {
            for b in &normalized[i + 1..] {
                assert!(jaccard_similarity(a, b) <= SIMILARITY_THRESHOLD, "{a} ~ {b}");
            }
        }
    }
}
