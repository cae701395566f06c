//! Yes/no classification of short replies.
//!
//! Replies are lower-cased and stripped of punctuation ("Don't!" becomes
//! "dont"), then matched against fixed word lists. Multi-word entries such as
//! "go ahead" match as whole-word phrases.

/// Words that acknowledge active reminders from any state.
pub const REMINDER_ACK_WORDS: &[&str] = &[
    "done",
    "confirmed",
    "okay",
    "ok",
    "stop",
    "silence",
    "got it",
];

/// Affirmative replies to "Should I remember ...?".
pub const FACT_AFFIRMATIVE: &[&str] = &[
    "yes",
    "y",
    "sure",
    "ok",
    "okay",
    "yeah",
    "correct",
    "right",
    "please",
    "absolutely",
    "definitely",
];

/// Negative replies to "Should I remember ...?".
pub const FACT_NEGATIVE: &[&str] = &["no", "n", "nope", "dont", "do not", "cancel", "stop"];

/// Affirmative replies to a staged tool call.
pub const TOOL_AFFIRMATIVE: &[&str] = &[
    "yes",
    "y",
    "sure",
    "proceed",
    "go ahead",
    "okay",
    "ok",
    "please",
    "absolutely",
    "definitely",
];

/// How a reply answers a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyIntent {
    Affirmative,
    Negative,
    Unclear,
}

/// Lower-case, drop punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `text` contains any of `words` as whole words.
pub fn contains_any(text: &str, words: &[&str]) -> bool {
    let padded = format!(" {} ", normalize(text));
    words.iter().any(|w| padded.contains(&format!(" {w} ")))
}

/// Classify `text`; affirmative wins when both lists match.
pub fn classify(text: &str, affirmative: &[&str], negative: &[&str]) -> ReplyIntent {
    if contains_any(text, affirmative) {
        ReplyIntent::Affirmative
    } else if contains_any(text, negative) {
        ReplyIntent::Negative
    } else {
        ReplyIntent::Unclear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("  Don't,   do it! "), "dont do it");
    }

    #[test]
    fn matches_whole_words_only() {
        assert!(contains_any("Yes, please.", FACT_AFFIRMATIVE));
        assert!(!contains_any("yesterday", FACT_AFFIRMATIVE));
        assert!(!contains_any("nothing", FACT_NEGATIVE));
    }

    #[test]
    fn multi_word_entries_match_as_phrases() {
        assert!(contains_any("ok go ahead", TOOL_AFFIRMATIVE));
        assert!(contains_any("Go ahead.", TOOL_AFFIRMATIVE));
        assert!(contains_any("I got it", REMINDER_ACK_WORDS));
        assert!(contains_any("please do not", FACT_NEGATIVE));
    }

    #[test]
    fn classify_fact_replies() {
        assert_eq!(
            classify("yeah", FACT_AFFIRMATIVE, FACT_NEGATIVE),
            ReplyIntent::Affirmative
        );
        assert_eq!(
            classify("Nope.", FACT_AFFIRMATIVE, FACT_NEGATIVE),
            ReplyIntent::Negative
        );
        assert_eq!(
            classify("maybe later", FACT_AFFIRMATIVE, FACT_NEGATIVE),
            ReplyIntent::Unclear
        );
    }

    #[test]
    fn maybe_is_not_a_tool_confirmation() {
        assert!(!contains_any("maybe", TOOL_AFFIRMATIVE));
    }
}
