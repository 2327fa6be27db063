//! Browser identity profiles
//!
//! Each profile is a fixed, internally consistent header set: the user
//! agent, client hints and fetch metadata all describe the same browser on
//! the same platform. Fields are never randomized independently, since
//! mismatched combinations are a stronger bot signal than a stable identity.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, ORIGIN, REFERER, USER_AGENT,
};

/// Web app id sent by the Instagram web client
pub const IG_APP_ID: &str = "936619743392459";

const IG_ORIGIN: &str = "https://www.instagram.com";

const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const MOBILE_CHROME_UA: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";

const CHROME_CLIENT_HINT: &str =
    r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#;

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Browser identity used for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserProfile {
    /// Chrome on Windows requesting documents
    #[default]
    DesktopChrome,
    /// Chrome on Android requesting documents
    MobileChrome,
    /// Desktop Chrome issuing XHR calls from the Instagram web app
    InstagramApi,
}

impl BrowserProfile {
    pub fn user_agent(&self) -> &'static str {
        match self {
            Self::DesktopChrome | Self::InstagramApi => DESKTOP_CHROME_UA,
            Self::MobileChrome => MOBILE_CHROME_UA,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DesktopChrome => "desktop_chrome",
            Self::MobileChrome => "mobile_chrome",
            Self::InstagramApi => "instagram_api",
        }
    }
}

fn insert_static(headers: &mut HeaderMap, name: &'static str, value: &'static str) {
    headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
}

/// Build the header set for `profile`
///
/// # Examples
///
/// ```
/// use feedsift::crawler::headers::{build_profile_headers, BrowserProfile};
///
/// let headers = build_profile_headers(BrowserProfile::MobileChrome, Some("https://m.facebook.com/"));
/// assert_eq!(headers.get("sec-ch-ua-mobile").unwrap(), "?1");
/// ```
pub fn build_profile_headers(profile: BrowserProfile, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent()));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    insert_static(&mut headers, "sec-ch-ua", CHROME_CLIENT_HINT);

    match profile {
        BrowserProfile::DesktopChrome | BrowserProfile::MobileChrome => {
            let mobile = profile == BrowserProfile::MobileChrome;
            headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
            insert_static(&mut headers, "sec-ch-ua-mobile", if mobile { "?1" } else { "?0" });
            insert_static(
                &mut headers,
                "sec-ch-ua-platform",
                if mobile { r#""Android""# } else { r#""Windows""# },
            );
            insert_static(&mut headers, "sec-fetch-dest", "document");
            insert_static(&mut headers, "sec-fetch-mode", "navigate");
            insert_static(
                &mut headers,
                "sec-fetch-site",
                if referer.is_some() { "same-origin" } else { "none" },
            );
            insert_static(&mut headers, "sec-fetch-user", "?1");
            insert_static(&mut headers, "upgrade-insecure-requests", "1");
        }
        BrowserProfile::InstagramApi => {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
            insert_static(&mut headers, "sec-ch-ua-mobile", "?0");
            insert_static(&mut headers, "sec-ch-ua-platform", r#""Windows""#);
            insert_static(&mut headers, "sec-fetch-dest", "empty");
            insert_static(&mut headers, "sec-fetch-mode", "cors");
            insert_static(&mut headers, "sec-fetch-site", "same-origin");
            insert_static(&mut headers, "x-ig-app-id", IG_APP_ID);
            insert_static(&mut headers, "x-asbd-id", "129477");
            insert_static(&mut headers, "x-ig-www-claim", "0");
            insert_static(&mut headers, "x-requested-with", "XMLHttpRequest");
            headers.insert(ORIGIN, origin_of(referer));
        }
    }

    if let Some(value) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
        headers.insert(REFERER, value);
    }

    headers
}

/// `Origin` matching the referer, so API calls look same-origin
fn origin_of(referer: Option<&str>) -> HeaderValue {
    referer
        .and_then(|r| url::Url::parse(r).ok())
        .map(|u| u.origin().ascii_serialization())
        .filter(|origin| origin != "null")
        .and_then(|origin| HeaderValue::from_str(&origin).ok())
        .unwrap_or_else(|| HeaderValue::from_static(IG_ORIGIN))
}

/// Cookie and CSRF headers carrying an authenticated Instagram session
///
/// Values that are not valid header text are dropped.
pub fn build_session_headers(
    session_id: &str,
    csrf_token: Option<&str>,
    user_id: Option<&str>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let mut cookie = format!("sessionid={session_id}");
    if let Some(csrf) = csrf_token {
        cookie.push_str(&format!("; csrftoken={csrf}"));
        if let Ok(value) = HeaderValue::from_str(csrf) {
            headers.insert(HeaderName::from_static("x-csrftoken"), value);
        }
    }
    if let Some(user_id) = user_id {
        cookie.push_str(&format!("; ds_user_id={user_id}"));
    }

    if let Ok(mut value) = HeaderValue::from_str(&cookie) {
        value.set_sensitive(true);
        headers.insert(COOKIE, value);
    }

    headers
}
