use std::sync::LazyLock;

use regex::Regex;

/// Fragments shorter than this (in characters, after trimming) carry no signal.
const MIN_CHARS: usize = 4;

/// Whole-text acknowledgement replies, compared case-insensitively.
const ACKNOWLEDGEMENTS: &[&str] = &[
    // Chinese forum replies
    "谢谢大佬", "谢谢谢谢", "谢谢大大", "谢谢老哥", "感谢分享", "感谢大佬",
    "好的谢谢", "了解了", "明白了", "收到了", "好的好的", "是的是的",
    "对的对的", "哈哈哈哈", "呵呵呵呵", "顶顶顶顶", "支持支持", "不错不错",
    "学习了", "涨知识", "厉害厉害", "牛逼牛逼", "好厉害", "太棒了", "很棒很棒",
    // English equivalents
    "thanks", "thanks!", "thank you", "thank you!", "thx!", "many thanks",
    "thanks a lot", "got it", "noted", "agreed", "same here", "me too",
    "+1", "+1!", "nice!", "cool!", "great!", "awesome", "awesome!",
    "lol!", "haha", "hahaha", "hahahaha", "bump", "this!", "so true",
];

/// Emoji, pictographs, dingbats, flags, ASCII punctuation and whitespace only.
static EMOJI_OR_PUNCT_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F900}-\x{1F9FF}\x{1F1E0}-\x{1F1FF}\x{2600}-\x{26FF}\x{2700}-\x{27BF}\x{FE0F}\x{200D}!@#$%^&*()_+\-=\[\]{};':"\\|,.<>/?~`\s]+$"#,
    )
    .unwrap()
});

/// Four or more emoji from the smiley/pictograph/transport blocks.
static REPEATED_EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\x{1F600}-\x{1F64F}]{4,}|[\x{1F300}-\x{1F5FF}]{4,}|[\x{1F680}-\x{1F6FF}]{4,})$").unwrap()
});

/// True when a fragment is worthless for risk analysis and should be dropped.
pub fn filter_useless(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.chars().count() < MIN_CHARS {
        return true;
    }

    let lowered = trimmed.to_lowercase();
    if ACKNOWLEDGEMENTS.iter().any(|ack| *ack == lowered) {
        return true;
    }

    REPEATED_EMOJI.is_match(trimmed) || EMOJI_OR_PUNCT_ONLY.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_useless() {
        assert!(filter_useless(""));
        assert!(filter_useless("   ok  "));
        assert!(filter_useless("好的"));
    }

    #[test]
    fn acknowledgements_are_useless() {
        assert!(filter_useless("谢谢大佬"));
        assert!(filter_useless("  Thank you!  "));
        assert!(filter_useless("GOT IT"));
    }

    #[test]
    fn emoji_and_punctuation_only_is_useless() {
        assert!(filter_useless("👍👍👍👍"));
        assert!(filter_useless("😄😄😄😄😄"));
        assert!(filter_useless("!!!???"));
        assert!(filter_useless("... --- ..."));
        assert!(filter_useless("🚀 🚀 !!"));
    }

    #[test]
    fn real_content_is_kept() {
        assert!(!filter_useless("My phone number is 555-0100"));
        assert!(!filter_useless("我住在北京朝阳区"));
        assert!(!filter_useless("Thanks, I live near the station too"));
        assert!(!filter_useless("👍 great idea, see you at 5pm"));
    }
}
