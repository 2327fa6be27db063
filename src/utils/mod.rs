//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use std::time::Duration;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// SHA-256 hex digest of whitespace-normalized, lowercased text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_whitespace(text).to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Random delay within `[min_ms, max_ms]`
pub fn jittered_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    let ms = rand::thread_rng().gen_range(min_ms..=max_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  hello   world  "), "hello world");
        assert_eq!(normalize_whitespace("hello\n\nworld"), "hello world");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
        assert_eq!(truncate_text("caf\u{e9} au lait, bien s\u{fb}r", 8), "caf\u{e9} ...");
    }

    #[test]
    fn test_content_hash_ignores_spacing_and_case() {
        assert_eq!(
            content_hash("Great coffee,  friendly staff"),
            content_hash("great coffee, friendly staff\n")
        );
        assert_ne!(content_hash("a b c"), content_hash("a b d"));
    }

    #[test]
    fn test_jittered_delay_bounds() {
        for _ in 0..100 {
            let d = jittered_delay(400, 1500);
            assert!(d >= Duration::from_millis(400));
            assert!(d <= Duration::from_millis(1500));
        }
        assert_eq!(jittered_delay(5, 5), Duration::from_millis(5));
        assert_eq!(jittered_delay(0, 0), Duration::ZERO);
    }
}
