//! Heuristic extraction of personal facts from user input.
//!
//! "My name is Mohan" becomes `name = Mohan`. The orchestrator asks before
//! storing anything an extractor returns.

use std::sync::LazyLock;

use regex::Regex;

/// A fact proposed for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFact {
    /// Lower-cased key.
    pub key: String,
    pub value: String,
    pub category: Option<String>,
}

/// Pluggable fact extraction.
pub trait FactExtractor: Send + Sync {
    /// Whether the input looks like something worth remembering.
    fn is_trigger(&self, text: &str) -> bool;

    /// Pull a key/value pair out of the input.
    fn extract(&self, text: &str) -> Option<ExtractedFact>;
}

/// Where a pattern's key comes from.
enum KeySource {
    Fixed(&'static str),
    /// First capture group is the key, second the value.
    Captured,
}

struct ExtractionRule {
    re: Regex,
    key: KeySource,
    category: Option<&'static str>,
}

const TRIGGERS: &[&str] = &[
    r"\bmy name is\b",
    r"\bremember that\b",
    r"\bi prefer\b",
    r"\bmy project\b",
    r"\bmy favorite\b",
    r"\bi like\b",
    r"\bi am\b",
    r"\bcall me\b",
];

static TRIGGER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TRIGGERS
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
});

static RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    let rules: [(&str, KeySource, Option<&'static str>); 8] = [
        (r"\bmy name is (\w+)", KeySource::Fixed("name"), None),
        (r"\bcall me (\w+)", KeySource::Fixed("name"), None),
        (r"\bi prefer (.+)", KeySource::Fixed("preference"), Some("preference")),
        (r"\bmy favorite (.+?) is (.+)", KeySource::Captured, None),
        (r"\bmy (.+?) is (.+)", KeySource::Captured, None),
        (r"\bremember that (.+)", KeySource::Fixed("note"), Some("note")),
        (r"\bi am (?:a |an )?(.+)", KeySource::Fixed("identity"), Some("personal")),
        (r"\bi like (.+)", KeySource::Fixed("likes"), Some("preference")),
    ];
    rules
        .into_iter()
        .filter_map(|(pattern, key, category)| {
            Some(ExtractionRule {
                re: Regex::new(&format!("(?i){pattern}")).ok()?,
                key,
                category,
            })
        })
        .collect()
});

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_owned()
}

/// Regex-based extractor covering the common "my X is Y" phrasings.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternFactExtractor;

impl FactExtractor for PatternFactExtractor {
    fn is_trigger(&self, text: &str) -> bool {
        TRIGGER_PATTERNS.iter().any(|re| re.is_match(text))
    }

    fn extract(&self, text: &str) -> Option<ExtractedFact> {
        RULES.iter().find_map(|rule| {
            let caps = rule.re.captures(text)?;
            let (key, value) = match rule.key {
                KeySource::Fixed(key) => (key.to_owned(), clean_value(caps.get(1)?.as_str())),
                KeySource::Captured => (
                    caps.get(1)?.as_str().trim().to_lowercase(),
                    clean_value(caps.get(2)?.as_str()),
                ),
            };
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some(ExtractedFact {
                key,
                value,
                category: rule.category.map(str::to_owned),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn extract(text: &str) -> ExtractedFact {
        PatternFactExtractor.extract(text).expect("fact")
    }

    #[test]
    fn name_keeps_original_case() {
        let fact = extract("My name is Mohan.");
        assert_eq!(fact.key, "name");
        assert_eq!(fact.value, "Mohan");
        assert_eq!(fact.category, None);
    }

    #[test]
    fn favorite_takes_key_from_input() {
        let fact = extract("my favorite color is deep blue!");
        assert_eq!(fact.key, "color");
        assert_eq!(fact.value, "deep blue");
    }

    #[test]
    fn generic_my_x_is_y() {
        let fact = extract("My Project is a rust assistant");
        assert_eq!(fact.key, "project");
        assert_eq!(fact.value, "a rust assistant");
    }

    #[test]
    fn categorised_patterns() {
        let fact = extract("I prefer dark mode");
        assert_eq!(
            (fact.key.as_str(), fact.value.as_str()),
            ("preference", "dark mode")
        );
        assert_eq!(fact.category.as_deref(), Some("preference"));

        let fact = extract("I am a software engineer");
        assert_eq!(fact.key, "identity");
        assert_eq!(fact.value, "software engineer");
        assert_eq!(fact.category.as_deref(), Some("personal"));
    }

    #[test]
    fn triggers_need_whole_words() {
        assert!(PatternFactExtractor.is_trigger("Call me Ishmael"));
        assert!(!PatternFactExtractor.is_trigger("what is the time"));
        assert!(!PatternFactExtractor.is_trigger("diam sentence"));
    }

    #[test]
    fn trigger_without_extractable_fact() {
        assert!(PatternFactExtractor.is_trigger("I like"));
        assert_eq!(PatternFactExtractor.extract("I like"), None);
    }
}
