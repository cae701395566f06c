//! Text shaping before synthesis.
//!
//! Replies are written for the console; read aloud they need code, paths and
//! hashtags replaced with something speakable.

use std::sync::LazyLock;

use regex::Regex;

/// Longest text spoken in short mode before it is cut.
const SHORT_MAX_CHARS: usize = 300;

/// Sentences spoken in short mode.
const SHORT_MAX_SENTENCES: usize = 2;

struct Patterns {
    code_block: Option<Regex>,
    inline_code: Option<Regex>,
    path: Option<Regex>,
    hashtag: Option<Regex>,
    whitespace: Option<Regex>,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    code_block: Regex::new(r"```[\s\S]*?```").ok(),
    inline_code: Regex::new(r"`[^`]+`").ok(),
    path: Regex::new(r"[a-zA-Z]:\\[\w\\]+|/[\w/]+").ok(),
    hashtag: Regex::new(r"#\w+").ok(),
    whitespace: Regex::new(r"\s+").ok(),
});

fn replace(re: &Option<Regex>, text: &str, with: &str) -> String {
    match re {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_owned(),
    }
}

/// Whether `text` is a raw tool call, which is never spoken.
pub fn is_tool_payload(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.contains("\"tool\"")
}

/// Replace code, paths and hashtags and collapse whitespace.
pub fn clean_for_speech(text: &str) -> String {
    let p = &*PATTERNS;
    let text = replace(&p.code_block, text, " Code block. ");
    let text = replace(&p.inline_code, &text, " Code snippet. ");
    let text = replace(&p.path, &text, " file path ");
    let text = replace(&p.hashtag, &text, "");
    replace(&p.whitespace, &text, " ").trim().to_owned()
}

/// First two sentences, cut at 300 characters.
pub fn short_form(text: &str) -> String {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            sentences.push(text[start..=i].trim());
            start = i + 1;
            if sentences.len() == SHORT_MAX_SENTENCES {
                break;
            }
        }
    }
    if sentences.len() < SHORT_MAX_SENTENCES && start < text.len() {
        sentences.push(text[start..].trim());
    }

    let short = sentences
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if short.chars().count() > SHORT_MAX_CHARS {
        let cut: String = short.chars().take(SHORT_MAX_CHARS).collect();
        return format!("{cut}...");
    }
    short
}

/// What should actually be spoken for `text`, or `None` for nothing.
pub fn prepare(text: &str, short_only: bool) -> Option<String> {
    if text.trim().is_empty() || is_tool_payload(text) {
        return None;
    }
    let cleaned = clean_for_speech(text);
    let spoken = if short_only {
        short_form(&cleaned)
    } else {
        cleaned
    };
    (!spoken.is_empty()).then_some(spoken)
}
