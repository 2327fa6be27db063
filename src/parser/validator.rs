//! Heuristic classifier separating genuine user content from technical noise
//!
//! Structural extraction (embedded scripts, JSON key patterns) regularly
//! captures strings that are syntactically text but semantically noise:
//! user agents, hashes, CSS, asset paths. Every strategy runs its candidates
//! through the same [`ContentValidator`] so they all agree on what a post is.

use regex::Regex;
use std::sync::LazyLock;

static USER_AGENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)mozilla/\d|applewebkit/|\(khtml, like gecko\)|\bsafari/\d|\bchrome/\d")
        .unwrap()
});

static HEX_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{24,}\b").unwrap());

static CSS_FILTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)progid:|alpha\(opacity|\b(?:filter|drop-shadow|blur|brightness|contrast|grayscale|saturate|hue-rotate)\s*[:(]\s*[\d.(]",
    )
    .unwrap()
});

static BARE_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?://|www\.)\S+$").unwrap());

static BARE_NUMERAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s.,:;/+\-]+$").unwrap());

static ENGINE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:webkit|gecko|chromium|trident|presto|edgehtml)\b").unwrap()
});

static FILE_EXTENSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:js|mjs|css|png|jpe?g|gif|svg|webp|json|php|html?|woff2?|ttf|mp4|ico|map)$")
        .unwrap()
});

static SNAKE_CASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)+$").unwrap());

static SCREAMING_CASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+$").unwrap());

/// Content validator with tunable thresholds
#[derive(Debug, Clone)]
pub struct ContentValidator {
    /// Minimum length in characters
    pub min_chars: usize,

    /// Minimum number of whitespace-delimited tokens
    pub min_tokens: usize,

    /// Minimum share of alphabetic characters
    pub min_letter_ratio: f64,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self {
            min_chars: 20,
            min_tokens: 3,
            min_letter_ratio: 0.3,
        }
    }
}

impl ContentValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `text` looks like genuine user content
    pub fn is_valid(&self, text: &str) -> bool {
        self.rejection_reason(text).is_none()
    }

    /// The first rule that rejects `text`, if any
    pub fn rejection_reason(&self, text: &str) -> Option<&'static str> {
        let trimmed = text.trim();
        let char_count = trimmed.chars().count();

        if char_count < self.min_chars {
            return Some("too short");
        }

        if BARE_URL_REGEX.is_match(trimmed) {
            return Some("bare url");
        }

        if BARE_NUMERAL_REGEX.is_match(trimmed) {
            return Some("bare numeral");
        }

        if USER_AGENT_REGEX.is_match(trimmed) {
            return Some("user agent");
        }

        if ENGINE_NAME_REGEX.is_match(trimmed) {
            return Some("browser engine");
        }

        if HEX_ID_REGEX.is_match(trimmed) {
            return Some("hex identifier");
        }

        if CSS_FILTER_REGEX.is_match(trimmed) {
            return Some("css filter");
        }

        if FILE_EXTENSION_REGEX.is_match(trimmed) {
            return Some("file path");
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() < self.min_tokens {
            return Some("too few words");
        }

        let technical = tokens
            .iter()
            .filter(|t| SNAKE_CASE_REGEX.is_match(t) || SCREAMING_CASE_REGEX.is_match(t))
            .count();
        if technical * 2 >= tokens.len() {
            return Some("technical tokens");
        }

        let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
        if (letters as f64) < self.min_letter_ratio * char_count as f64 {
            return Some("low letter ratio");
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v() -> ContentValidator {
        ContentValidator::new()
    }

    #[test]
    fn test_accepts_real_posts() {
        assert!(v().is_valid("Great coffee, friendly staff, highly recommend!"));
        assert!(v().is_valid("Join us this Saturday for live music and fresh pastries 🎶"));
        assert!(v().is_valid("Wir haben ab Montag wieder regulär geöffnet. Bis bald!"));
    }

    #[test]
    fn test_rejects_short_and_sparse() {
        assert_eq!(v().rejection_reason("Open today"), Some("too short"));
        assert_eq!(
            v().rejection_reason("Supercalifragilistic expialidocious"),
            Some("too few words")
        );
    }

    #[test]
    fn test_rejects_technical_noise() {
        let noise = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            "hash 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08 ok",
            "filter: blur(4px) drop-shadow(0 0 2px black) and more",
            "https://www.facebook.com/example-cafe/posts/12345",
            "1,234,567 890 123 456 789",
            "rendered by the chromium compositor thread here",
            "static assets live at /rsrc.php/v3/y4/r/bundle.js",
            "SOME_CONSTANT_NAME another_snake_case value_here",
        ];
        for text in noise {
            assert!(!v().is_valid(text), "should reject: {text}");
        }
    }

    #[test]
    fn test_rejects_low_letter_ratio() {
        assert_eq!(
            v().rejection_reason("a1 22 333 4444 55555 666666 ###"),
            Some("low letter ratio")
        );
    }

    proptest! {
        #[test]
        fn prop_short_strings_are_rejected(s in "\\PC{0,19}") {
            prop_assert!(!v().is_valid(&s));
        }

        #[test]
        fn prop_validation_is_idempotent(s in "[a-zA-Z ,.!]{0,80}") {
            let validator = v();
            let first = validator.is_valid(&s);
            if first {
                prop_assert!(validator.is_valid(&s));
            }
            prop_assert_eq!(first, validator.is_valid(&s));
        }
    }
}
