//! Text sanitization for extracted post and profile text
//!
//! Text scraped from markup carries invisible characters, entities and the
//! platform's own UI labels ("See more", "See translation"). These helpers
//! strip that before the text reaches the content validator.

use regex::Regex;
use std::sync::LazyLock;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static UI_CHROME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:…|\.\.\.)?\s*\b(?:see more|see translation|see original|rate this translation|show more|… more)\s*$")
        .unwrap()
});

/// Sanitize extracted text content
///
/// 1. Remove zero-width characters
/// 2. Remove control characters (except newline/tab)
/// 3. Decode HTML entities
/// 4. Drop trailing UI labels
/// 5. Collapse whitespace
///
/// # Examples
///
/// ```
/// use feedsift::parser::sanitize::sanitize_text;
///
/// let clean = sanitize_text("Fresh bread\u{200B} &amp; coffee  today… See more");
/// assert_eq!(clean, "Fresh bread & coffee today");
/// ```
pub fn sanitize_text(text: &str) -> String {
    let mut result = remove_zero_width(text);
    result = remove_control_chars(&result);
    result = decode_html_entities(&result);
    result = crate::utils::normalize_whitespace(&result);
    result = remove_ui_chrome(&result);
    result.trim().to_string()
}

/// Remove zero-width spaces, direction marks and the byte order mark
///
/// # Examples
///
/// ```
/// use feedsift::parser::sanitize::remove_zero_width;
///
/// assert_eq!(remove_zero_width("a\u{200B}b\u{FEFF}c"), "abc");
/// ```
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Decode HTML entities (named and numeric) to plain text
pub fn decode_html_entities(text: &str) -> String {
    html_escape::decode_html_entities(text)
        .replace('\u{a0}', " ")
}

/// Extract plain text from markup, removing all tags
///
/// # Examples
///
/// ```
/// use feedsift::parser::sanitize::strip_html_tags;
///
/// assert_eq!(strip_html_tags("<p>Hello <strong>World</strong></p>"), "Hello World");
/// ```
pub fn strip_html_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").to_string()
}

/// Drop a trailing "See more" style label
pub fn remove_ui_chrome(text: &str) -> String {
    UI_CHROME_REGEX.replace(text, "").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text_full() {
        let dirty = "Hello\u{200B}World  \n\n\n\nTest\x07";
        let clean = sanitize_text(dirty);
        assert_eq!(clean, "HelloWorld Test");
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(
            decode_html_entities("Caf&eacute; &amp; bar&nbsp;&#x27;open&#39;"),
            "Caf\u{e9} & bar 'open'"
        );
    }

    #[test]
    fn test_remove_ui_chrome() {
        assert_eq!(remove_ui_chrome("Brunch is back… See more"), "Brunch is back");
        assert_eq!(remove_ui_chrome("Hola amigos See translation"), "Hola amigos");
        assert_eq!(remove_ui_chrome("We see more guests"), "We see more guests");
    }

    #[test]
    fn test_remove_control_chars_keeps_newlines() {
        let clean = remove_control_chars("a\x00b\nc\td");
        assert_eq!(clean, "ab\nc\td");
    }
}
