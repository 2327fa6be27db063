//! Locating structured payloads embedded in larger documents
//!
//! Pages embed their data as JSON fragments inside script tags and inline
//! JavaScript. The surrounding document is not valid JSON as a whole, and
//! regex captures of such fragments are routinely truncated. The functions
//! here find a start point (an anchor token or an opening delimiter) and run
//! one forward scan that tracks nesting, string literals and escapes to find
//! the exact end of a syntactically complete object or array.
//!
//! Every failure (no anchor, unterminated structure, unparseable slice)
//! returns `None`; callers move on to the next anchor or strategy.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::Value;

lazy_static! {
    static ref JSON_SCRIPT: Selector =
        Selector::parse(r#"script[type="application/json"], script[type="application/ld+json"]"#)
            .expect("Invalid CSS selector: json script");
    static ref ANY_SCRIPT: Selector = Selector::parse("script").expect("Invalid CSS selector: script");
}

/// Upper bound on nesting depth tracked by the scanner
const MAX_NESTING: usize = 512;

/// Key of payloads shipped as a JSON string inside inline scripts
const CONTEXT_JSON_ANCHOR: &str = r#""contextJSON""#;

/// Find the end (exclusive byte offset) of the object or array opening at `start`
///
/// `text[start]` must be `{` or `[`. Closers must match their openers.
pub fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let first = *bytes.get(start)?;
    if first != b'{' && first != b'[' {
        return None;
    }

    let mut stack: Vec<u8> = Vec::with_capacity(16);
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if b == b'\\' {
                escape_next = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }

        if stack.len() > MAX_NESTING {
            return None;
        }
    }

    None
}

/// Slice of the first complete structure following `anchor`
///
/// Only whitespace, `:` and `=` may separate the anchor from the opening
/// delimiter, so an anchor never latches onto an unrelated later object.
pub fn extract_after_anchor<'a>(text: &'a str, anchor: &str) -> Option<&'a str> {
    let anchor_pos = text.find(anchor)?;
    slice_after(text, anchor_pos + anchor.len())
}

fn slice_after(text: &str, from: usize) -> Option<&str> {
    let rest = text.get(from..)?;
    let gap = rest
        .char_indices()
        .find(|(_, c)| !(c.is_whitespace() || *c == ':' || *c == '='))
        .map(|(i, _)| i)?;
    let start = from + gap;
    let end = balanced_end(text, start)?;
    Some(&text[start..end])
}

/// Parsed value of the first complete structure following `anchor`
pub fn extract_value(text: &str, anchor: &str) -> Option<Value> {
    let slice = extract_after_anchor(text, anchor)?;
    serde_json::from_str(slice).ok()
}

/// Parsed values following every occurrence of `anchor`
pub fn extract_all(text: &str, anchor: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text.get(cursor..).and_then(|rest| rest.find(anchor)) {
        let after = cursor + found + anchor.len();
        match slice_after(text, after) {
            Some(slice) => {
                if let Ok(value) = serde_json::from_str::<Value>(slice) {
                    values.push(value);
                }
                cursor = after + slice.len();
            }
            None => cursor = after,
        }
    }

    values
}

/// Every parseable top-level object found by scanning `text` left to right
///
/// Blocks that balance but do not parse (JavaScript function bodies) are
/// stepped into, so JSON nested inside code is still found.
pub fn extract_objects(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut cursor = 0;

    while let Some(start) = text.get(cursor..).and_then(|rest| rest.find('{')).map(|o| cursor + o) {
        match balanced_end(text, start) {
            Some(end) => match serde_json::from_str::<Value>(&text[start..end]) {
                Ok(value) => {
                    values.push(value);
                    cursor = end;
                }
                Err(_) => cursor = start + 1,
            },
            None => cursor = start + 1,
        }
    }

    values
}

/// Decode a JSON string literal following `anchor` and parse its contents
///
/// Handles double-encoded payloads such as `"contextJSON":"{\"a\":1}"`.
pub fn extract_encoded_value(text: &str, anchor: &str) -> Option<Value> {
    let anchor_pos = text.find(anchor)?;
    let rest = &text[anchor_pos + anchor.len()..];
    let quote = rest.find('"')?;
    if !rest[..quote].chars().all(|c| c.is_whitespace() || c == ':') {
        return None;
    }

    let bytes = rest.as_bytes();
    let mut i = quote + 1;
    let mut escape = false;
    while i < bytes.len() {
        match (escape, bytes[i]) {
            (true, _) => escape = false,
            (false, b'\\') => escape = true,
            (false, b'"') => break,
            _ => {}
        }
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    let literal = &rest[quote..=i];
    let inner: String = serde_json::from_str(literal).ok()?;
    serde_json::from_str(&inner).ok()
}

/// Structured payloads carried by script tags of an HTML document
///
/// JSON-typed scripts are parsed whole. Other scripts are scanned for
/// objects when `marker` occurs in them, and any `contextJSON` string is
/// decoded as a payload of its own.
pub fn extract_script_payloads(html: &str, marker: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let mut payloads = Vec::new();

    for script in document.select(&JSON_SCRIPT) {
        let body: String = script.text().collect();
        match serde_json::from_str::<Value>(body.trim()) {
            Ok(value) => payloads.push(value),
            Err(_) => payloads.extend(extract_objects(&body)),
        }
    }

    for script in document.select(&ANY_SCRIPT) {
        if matches!(
            script.value().attr("type"),
            Some("application/json") | Some("application/ld+json")
        ) {
            continue;
        }
        let body: String = script.text().collect();
        if body.contains(marker) {
            payloads.extend(extract_objects(&body));
        }
        if body.contains(CONTEXT_JSON_ANCHOR) {
            payloads.extend(extract_encoded_value(&body, CONTEXT_JSON_ANCHOR));
        }
    }

    payloads
}
