//! Page identifier resolution
//!
//! Maps a page handle to the platform's numeric surrogate id by scanning
//! the fetched page for one of many known embeddings. Patterns are ordered
//! from most to least specific and evaluated with [`first_some`]; a capture
//! only counts when it has at least [`MIN_ID_DIGITS`] digits, which rules
//! out counters, versions and short internal ids.
//!
//! Not finding an id is a normal outcome; callers record a warning and go on
//! with the handle.

use chrono::{Datelike, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::fields::first_some;

pub use crate::crawler::url::normalize_identifier;

/// Minimum number of digits for a capture to count as a page id
pub const MIN_ID_DIGITS: usize = 10;

/// Years before the current one whose epoch values are treated as
/// timestamps by the broad numeral scan
pub const TIMESTAMP_YEAR_WINDOW: i32 = 1;

macro_rules! id_pattern {
    ($name:ident, $re:expr) => {
        fn $name(html: &str) -> Option<String> {
            static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).unwrap());
            first_long_capture(&RE, html)
        }
    };
}

fn first_long_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|digits| digits.len() >= MIN_ID_DIGITS)
        .map(str::to_string)
}

id_pattern!(android_app_link, r#"fb://page/\??(?:id=)?(\d+)"#);
id_pattern!(ios_app_link, r#"fb://profile/(\d+)"#);
id_pattern!(page_id_camel, r#""pageID"\s*:\s*"?(\d+)"#);
id_pattern!(page_id_snake, r#""page_id"\s*:\s*"?(\d+)"#);
id_pattern!(delegate_page_id, r#""delegate_page_id"\s*:\s*"?(\d+)"#);
id_pattern!(associated_page_id, r#""associated_page_id"\s*:\s*"?(\d+)"#);
id_pattern!(typed_page_node, r#""__typename"\s*:\s*"Page"\s*,\s*"id"\s*:\s*"(\d+)""#);
id_pattern!(page_node_typed, r#""id"\s*:\s*"(\d+)"\s*,\s*"__typename"\s*:\s*"Page""#);
id_pattern!(profile_owner_object, r#""profile_owner"\s*:\s*\{\s*"id"\s*:\s*"(\d+)""#);
id_pattern!(profile_owner, r#""profile_owner"\s*:\s*"?(\d+)"#);
id_pattern!(owning_profile_id, r#""owning_profile_id"\s*:\s*"?(\d+)"#);
id_pattern!(entity_id, r#""entity_id"\s*:\s*"?(\d+)"#);
id_pattern!(profile_id_camel, r#""profileID"\s*:\s*"?(\d+)"#);
id_pattern!(page_id_lower, r#""pageid"\s*:\s*"?(\d+)"#);
id_pattern!(user_id_camel, r#""userID"\s*:\s*"?(\d+)"#);
id_pattern!(actor_id, r#""actorID"\s*:\s*"?(\d+)"#);
id_pattern!(canonical_numeric, r#"<link[^>]+rel="(?:canonical|alternate)"[^>]+href="[^"]*facebook\.com/(\d+)/?""#);
id_pattern!(profile_php_link, r#"profile\.php\?id=(\d+)"#);
id_pattern!(pages_path, r#"/pages/[^/"?]+/(\d+)"#);
id_pattern!(page_id_param, r#"[?&]page_id=(\d+)"#);

/// Ordered page-embedded patterns
const PAGE_PATTERNS: &[fn(&str) -> Option<String>] = &[
    android_app_link,
    ios_app_link,
    page_id_camel,
    page_id_snake,
    delegate_page_id,
    associated_page_id,
    typed_page_node,
    page_node_typed,
    profile_owner_object,
    profile_owner,
    owning_profile_id,
    entity_id,
    profile_id_camel,
    page_id_lower,
    user_id_camel,
    actor_id,
    canonical_numeric,
    profile_php_link,
    pages_path,
    page_id_param,
];

id_pattern!(url_profile_php, r#"profile\.php\?id=(\d+)"#);
id_pattern!(url_numeric_path, r#"facebook\.com/(\d+)(?:[/?#]|$)"#);
id_pattern!(url_pages_path, r#"/pages/[^/?]+/(\d+)"#);

/// Patterns applied to the final (post-redirect) URL
const URL_PATTERNS: &[fn(&str) -> Option<String>] =
    &[url_profile_php, url_numeric_path, url_pages_path];

static QUOTED_LONG_NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\d{15,20})""#).unwrap());

/// Resolve the numeric id of `name` from its page body and final URL
///
/// Order: a match anchored on the handle itself, the page patterns, the
/// final URL, then a best-effort scan for long quoted numerals.
pub fn resolve(name: &str, html: &str, final_url: &str) -> Option<String> {
    if is_numeric_id(name) {
        return Some(name.to_string());
    }

    handle_anchored(name, html)
        .or_else(|| first_some(PAGE_PATTERNS, html))
        .or_else(|| first_some(URL_PATTERNS, final_url))
        .or_else(|| broad_numeral_scan(html))
}

/// Whether `value` already is a numeric page id
pub fn is_numeric_id(value: &str) -> bool {
    value.len() >= MIN_ID_DIGITS && value.chars().all(|c| c.is_ascii_digit())
}

/// An id appearing next to the page's own vanity name
fn handle_anchored(name: &str, html: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    static NEAR_ID: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#""(?:id|userID|pageID)"\s*:\s*"(\d+)""#).unwrap());

    let escaped = regex::escape(name);
    let anchor = Regex::new(&format!(r#"(?i)"(?:vanity|username|userVanity)"\s*:\s*"{escaped}""#)).ok()?;

    let found = anchor.find_iter(html).find_map(|m| {
        let start = floor_char_boundary(html, m.start().saturating_sub(300));
        let end = floor_char_boundary(html, (m.end() + 300).min(html.len()));
        let anchor_at = m.start() - start;

        NEAR_ID
            .captures_iter(&html[start..end])
            .filter_map(|c| c.get(1))
            .filter(|digits| digits.as_str().len() >= MIN_ID_DIGITS)
            .min_by_key(|digits| digits.start().abs_diff(anchor_at))
            .map(|digits| digits.as_str().to_string())
    });
    found
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Any quoted 15–20 digit numeral that does not look like a timestamp
fn broad_numeral_scan(html: &str) -> Option<String> {
    QUOTED_LONG_NUMERAL
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|digits| !looks_like_timestamp(digits))
        .map(str::to_string)
}

/// Whether the leading ten digits read as an epoch second within the
/// timestamp window (previous years through the end of the current year)
pub fn looks_like_timestamp(digits: &str) -> bool {
    let Some(seconds) = digits.get(..10).and_then(|s| s.parse::<i64>().ok()) else {
        return false;
    };

    let year = Utc::now().year();
    let window = Utc
        .with_ymd_and_hms(year - TIMESTAMP_YEAR_WINDOW, 1, 1, 0, 0, 0)
        .single()
        .zip(Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single());

    match window {
        Some((from, to)) => seconds >= from.timestamp() && seconds < to.timestamp(),
        None => false,
    }
}
