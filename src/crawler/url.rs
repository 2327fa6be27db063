//! Identifier normalization and endpoint URL construction
//!
//! Users hand us page identifiers in many shapes: bare handles, `@handle`,
//! full desktop or mobile URLs, `profile.php?id=` links. This module reduces
//! them to a single handle and builds every platform URL the pipelines fetch.
//! Base URLs are overridable so tests can point at a local mock server.

use url::Url;

/// Host prefixes stripped before the platform domain
const HOST_PREFIXES: &[&str] = &["www.", "m.", "mbasic.", "web.", "touch.", "business."];

/// Platform domains recognized in identifiers
const PLATFORM_DOMAINS: &[&str] = &["facebook.com", "fb.com", "instagram.com"];

/// Path prefixes of login and checkpoint pages
const LOGIN_PATHS: &[&str] = &[
    "/login",
    "/login.php",
    "/checkpoint",
    "/accounts/login",
    "/challenge",
    "/cookie/consent",
];

/// Reduce a raw page identifier to a bare handle or numeric id
///
/// # Examples
///
/// ```
/// use feedsift::crawler::url::normalize_identifier;
///
/// assert_eq!(normalize_identifier("https://www.facebook.com/example-cafe/"), "example-cafe");
/// assert_eq!(normalize_identifier("@example.cafe"), "example.cafe");
/// assert_eq!(normalize_identifier("m.facebook.com/profile.php?id=100064"), "100064");
/// ```
pub fn normalize_identifier(raw: &str) -> String {
    let mut rest = raw.trim();

    for scheme in ["https://", "http://"] {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
        }
    }
    for prefix in HOST_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    for domain in PLATFORM_DOMAINS {
        if let Some(stripped) = rest.strip_prefix(domain) {
            rest = stripped.trim_start_matches('/');
            break;
        }
    }

    if let Some(query) = rest.strip_prefix("profile.php?") {
        if let Some(id) = query_param(query, "id") {
            return id;
        }
    }

    let path = rest.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let handle = match segments.as_slice() {
        ["pages" | "people", _, id, ..] if id.chars().all(|c| c.is_ascii_digit()) => *id,
        [first, ..] => *first,
        [] => "",
    };

    handle.trim_start_matches('@').to_string()
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key && !v.is_empty()).then(|| v.split('#').next().unwrap_or(v).to_string())
    })
}

/// Whether a URL (absolute or path-only) points at a login or checkpoint page
pub fn is_login_path(location: &str) -> bool {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(_) => location.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    LOGIN_PATHS
        .iter()
        .any(|login| path == *login || path.starts_with(&format!("{login}/")) || path.starts_with(&format!("{login}.")))
}

/// Resolve `location` against `base`, returning `location` unchanged when it
/// is already absolute or cannot be joined
pub fn to_absolute(location: &str, base: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

/// Compare two URLs ignoring a trailing slash
pub fn same_target(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

// ============================================================================
// Facebook
// ============================================================================

/// Facebook page URL builder
#[derive(Debug, Clone)]
pub struct FacebookUrls {
    pub desktop_base: String,
    pub mobile_base: String,
}

impl Default for FacebookUrls {
    fn default() -> Self {
        Self {
            desktop_base: "https://www.facebook.com".to_string(),
            mobile_base: "https://m.facebook.com".to_string(),
        }
    }
}

impl FacebookUrls {
    /// Point both desktop and mobile surfaces at one base (tests)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            desktop_base: base.clone(),
            mobile_base: base,
        }
    }

    fn page_path(handle: &str) -> String {
        if !handle.is_empty() && handle.chars().all(|c| c.is_ascii_digit()) {
            format!("profile.php?id={handle}")
        } else {
            handle.to_string()
        }
    }

    /// Primary desktop page
    pub fn page(&self, handle: &str) -> String {
        format!("{}/{}", self.desktop_base, Self::page_path(handle))
    }

    /// Mobile-site page
    pub fn mobile(&self, handle: &str) -> String {
        format!("{}/{}", self.mobile_base, Self::page_path(handle))
    }

    /// Alternate `/posts` view
    pub fn posts(&self, handle: &str) -> String {
        if handle.chars().all(|c| c.is_ascii_digit()) {
            format!("{}/profile.php?id={handle}&sk=posts", self.desktop_base)
        } else {
            format!("{}/{handle}/posts", self.desktop_base)
        }
    }
}

// ============================================================================
// Instagram
// ============================================================================

/// Instagram endpoint URL builder
#[derive(Debug, Clone)]
pub struct InstagramUrls {
    pub base: String,
}

impl Default for InstagramUrls {
    fn default() -> Self {
        Self {
            base: "https://www.instagram.com".to_string(),
        }
    }
}

impl InstagramUrls {
    pub fn with_base(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn profile_info(&self, username: &str) -> String {
        format!("{}/api/v1/users/web_profile_info/?username={username}", self.base)
    }

    pub fn user_feed(&self, user_id: &str, count: usize, max_id: Option<&str>) -> String {
        match max_id {
            Some(max_id) => format!(
                "{}/api/v1/feed/user/{user_id}/?count={count}&max_id={max_id}",
                self.base
            ),
            None => format!("{}/api/v1/feed/user/{user_id}/?count={count}", self.base),
        }
    }

    pub fn media_by_shortcode(&self, shortcode: &str) -> String {
        format!("{}/api/v1/media/shortcode/{shortcode}/", self.base)
    }

    /// Older JSON view of a post page
    pub fn media_page_json(&self, shortcode: &str) -> String {
        format!("{}/p/{shortcode}/?__a=1&__d=dis", self.base)
    }

    pub fn comments(&self, media_id: &str) -> String {
        format!(
            "{}/api/v1/media/{media_id}/comments/?can_support_threading=true&permalink_enabled=false",
            self.base
        )
    }

    /// Legacy query endpoint for comments, addressed by shortcode
    pub fn legacy_comments(&self, query_hash: &str, shortcode: &str, first: usize) -> String {
        let variables = serde_json::json!({ "shortcode": shortcode, "first": first });
        let encoded: String =
            url::form_urlencoded::byte_serialize(variables.to_string().as_bytes()).collect();
        format!(
            "{}/graphql/query/?query_hash={query_hash}&variables={encoded}",
            self.base
        )
    }

    /// Public profile page, used as the referer for API calls
    pub fn profile_page(&self, username: &str) -> String {
        format!("{}/{username}/", self.base)
    }
}
