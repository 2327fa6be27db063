//! Resilient HTTP client
//!
//! All page and API fetches go through [`ResilientHttpClient`]:
//! - fixed browser identity profiles (see [`crate::crawler::headers`])
//! - request pacing with governor
//! - a hard per-attempt timeout
//! - rate-limit detection with linear backoff retries
//! - manual redirect handling with login-wall detection
//! - sticky egress routing over a proxy pool
//! - charset-aware body decoding

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use regex::Regex;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE, LOCATION},
    redirect, Client, Proxy, Response, StatusCode,
};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::crawler::headers::{build_profile_headers, BrowserProfile};
use crate::crawler::sticky::StickyRoutes;
use crate::crawler::url::{is_login_path, same_target, to_absolute};
use crate::utils::error::{FetchError, ParseError};
use crate::utils::retry::{with_retry_if, Retried, RetryPolicy};
use crate::utils::truncate_text;

/// Markers of a 400 response that is really a throttled or logged-out session
const LOGIN_SHAPED_MARKERS: &[&str] = &[
    "login_required",
    "\"require_login\":true",
    "checkpoint_required",
    "Please wait a few minutes",
    "feedback_required",
];

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-zA-Z0-9_\-]+)"#).unwrap());

/// How 3xx responses are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
    /// Let the HTTP stack follow redirects
    #[default]
    Follow,
    /// Inspect every `Location`: login walls and self-redirects are detected
    Manual,
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub profile: BrowserProfile,
    pub referer: Option<String>,
    /// Requests sharing a key leave through the same egress slot
    pub sticky_key: Option<String>,
    pub redirect: RedirectMode,
    /// Extra headers merged over the profile headers
    pub headers: HeaderMap,
}

impl FetchOptions {
    pub fn new(profile: BrowserProfile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn sticky(mut self, key: impl Into<String>) -> Self {
        self.sticky_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn manual_redirects(mut self) -> Self {
        self.redirect = RedirectMode::Manual;
        self
    }

    #[must_use]
    pub fn extra_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Anti-hijacking prefixes placed in front of JSON bodies
const JSON_GUARDS: &[&str] = &["for (;;);", "for(;;);", ")]}'", "while(1);"];

/// Strip an anti-hijacking prefix from a JSON response body
///
/// # Example
/// ```
/// use feedsift::crawler::fetcher::strip_json_guard;
///
/// assert_eq!(strip_json_guard(r#"for (;;);{"ok":true}"#), r#"{"ok":true}"#);
/// assert_eq!(strip_json_guard(r#"{"ok":true}"#), r#"{"ok":true}"#);
/// ```
pub fn strip_json_guard(body: &str) -> &str {
    let trimmed = body.trim_start();
    JSON_GUARDS
        .iter()
        .find_map(|guard| trimmed.strip_prefix(guard))
        .unwrap_or(trimmed)
        .trim()
}

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub body: String,
    /// Number of attempts made, including the successful one
    pub attempts: u32,
    /// Backoff delays applied before each retry
    pub backoff_delays: Vec<Duration>,
}

impl FetchedPage {
    /// Parse the body as JSON, tolerating anti-hijacking prefixes
    pub fn json(&self) -> Result<Value, ParseError> {
        serde_json::from_str(strip_json_guard(&self.body)).map_err(|e| {
            debug!(url = %self.url, preview = %truncate_text(&self.body, 120), "Body is not JSON");
            ParseError::Malformed(e.to_string())
        })
    }
}

/// Anything that can fetch pages
///
/// Implemented by [`ResilientHttpClient`]; pipelines depend on this trait so
/// they can be driven by scripted sources in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError>;
}

/// One egress slot: a redirect-following and a manual-redirect client
#[derive(Debug)]
struct Egress {
    follow: Client,
    manual: Client,
    label: String,
}

impl Egress {
    fn build(proxy: Option<&str>) -> Result<Self, FetchError> {
        let make = |policy: redirect::Policy| -> Result<Client, FetchError> {
            let mut builder = Client::builder()
                .gzip(true)
                .cookie_store(true)
                .connect_timeout(Duration::from_secs(10))
                .redirect(policy);
            if let Some(proxy) = proxy {
                let proxy =
                    Proxy::all(proxy).map_err(|e| FetchError::ClientBuild(e.to_string()))?;
                builder = builder.proxy(proxy);
            }
            builder
                .build()
                .map_err(|e| FetchError::ClientBuild(e.to_string()))
        };

        Ok(Self {
            follow: make(redirect::Policy::limited(10))?,
            manual: make(redirect::Policy::none())?,
            label: proxy.unwrap_or("direct").to_string(),
        })
    }
}

/// HTTP client with retry, pacing, redirect inspection and sticky routing
pub struct ResilientHttpClient {
    egress: Vec<Egress>,
    routes: StickyRoutes,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ResilientHttpClient {
    /// Create a client with default settings (30 s timeout, default retry policy)
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ClientBuild` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(
            requests_per_second,
            RetryPolicy::default(),
            Duration::from_secs(30),
            &[],
        )
    }

    /// Create a client with custom configuration
    ///
    /// Each proxy becomes an egress slot; with no proxies there is a single
    /// direct slot.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ClientBuild` if a client or proxy cannot be created
    pub fn with_config(
        requests_per_second: u32,
        retry: RetryPolicy,
        timeout: Duration,
        proxies: &[String],
    ) -> Result<Self, FetchError> {
        let egress = if proxies.is_empty() {
            vec![Egress::build(None)?]
        } else {
            proxies
                .iter()
                .map(|p| Egress::build(Some(p)))
                .collect::<Result<Vec<_>, _>>()?
        };

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            routes: StickyRoutes::new(egress.len()),
            egress,
            rate_limiter,
            retry,
            timeout,
        })
    }

    /// Fetch `url`, retrying rate-limited and network failures
    ///
    /// # Errors
    ///
    /// - `Timeout` when an attempt exceeds the hard timeout
    /// - `RateLimited` when 429 / login-shaped 400 persists past the budget
    /// - `LoginRequired` on a login-wall redirect (never retried)
    /// - `RedirectLoop` when the page keeps redirecting to itself
    /// - `Status` for any other non-success status
    pub async fn fetch_page(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedPage, FetchError> {
        url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let slot = options
            .sticky_key
            .as_deref()
            .map(|key| self.routes.slot_for(key))
            .unwrap_or(0)
            .min(self.egress.len() - 1);

        debug!(
            url = url,
            profile = options.profile.as_str(),
            egress = %self.egress[slot].label,
            "Fetching"
        );

        let Retried {
            value: mut page,
            attempts,
            delays,
        } = with_retry_if(
            &self.retry,
            |attempt| self.attempt(url, options, slot, attempt),
            FetchError::is_retryable,
        )
        .await?;

        page.attempts = attempts;
        page.backoff_delays = delays;
        Ok(page)
    }

    async fn attempt(
        &self,
        url: &str,
        options: &FetchOptions,
        slot: usize,
        attempt: u32,
    ) -> Result<FetchedPage, FetchError> {
        self.rate_limiter.until_ready().await;

        let timeout_ms = self.timeout.as_millis() as u64;
        match tokio::time::timeout(self.timeout, self.exchange(url, options, slot, attempt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = url, timeout_ms = timeout_ms, "Request timed out");
                Err(FetchError::Timeout(timeout_ms))
            }
        }
    }

    async fn exchange(
        &self,
        url: &str,
        options: &FetchOptions,
        slot: usize,
        attempt: u32,
    ) -> Result<FetchedPage, FetchError> {
        let egress = &self.egress[slot];

        let response = match options.redirect {
            RedirectMode::Follow => {
                let response = self.send(&egress.follow, url, options).await?;
                let final_url = response.url().to_string();
                if is_login_path(&final_url) {
                    return Err(FetchError::LoginRequired {
                        location: final_url,
                    });
                }
                response
            }
            RedirectMode::Manual => self.send_manual(&egress.manual, url, options).await?,
        };

        self.classify(response, attempt).await
    }

    async fn send(
        &self,
        client: &Client,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Response, FetchError> {
        let mut headers = build_profile_headers(options.profile, options.referer.as_deref());
        headers.extend(options.headers.clone());

        client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::from)
    }

    /// Resolve redirects by hand
    ///
    /// A login-path `Location` is terminal. A redirect back to the requested
    /// URL is retried once, then reported as a loop. Any other target is
    /// followed once; a further redirect from it is reported as a loop.
    async fn send_manual(
        &self,
        client: &Client,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Response, FetchError> {
        let mut current = url.to_string();
        let mut self_redirects = 0;
        let mut followed = false;

        loop {
            let response = self.send(client, &current, options).await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }

            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|l| to_absolute(l, &current))
            else {
                return Ok(response);
            };

            if is_login_path(&location) {
                debug!(url = url, location = %location, "Redirected to login wall");
                return Err(FetchError::LoginRequired { location });
            }

            if same_target(&location, url) || same_target(&location, &current) {
                self_redirects += 1;
                if self_redirects > 1 {
                    return Err(FetchError::RedirectLoop(url.to_string()));
                }
                continue;
            }

            if followed {
                debug!(url = url, location = %location, "Redirect chain too long");
                return Err(FetchError::RedirectLoop(url.to_string()));
            }
            followed = true;
            current = location;
        }
    }

    async fn classify(&self, response: Response, attempt: u32) -> Result<FetchedPage, FetchError> {
        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited { attempts: attempt });
        }

        if status == StatusCode::BAD_REQUEST {
            let body = decode_response(response).await?;
            if LOGIN_SHAPED_MARKERS.iter().any(|m| body.contains(m)) {
                return Err(FetchError::RateLimited { attempts: attempt });
            }
            return Err(FetchError::Status(status.as_u16()));
        }

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = decode_response(response).await?;
        Ok(FetchedPage {
            status: status.as_u16(),
            url: final_url,
            body,
            attempts: attempt,
            backoff_delays: Vec::new(),
        })
    }
}

#[async_trait]
impl PageSource for ResilientHttpClient {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        self.fetch_page(url, options).await
    }
}

async fn decode_response(response: Response) -> Result<String, FetchError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();

    let bytes = response.bytes().await?;
    Ok(decode_bytes(&bytes, &content_type))
}

/// Decode bytes to a string honouring the declared charset
///
/// The `Content-Type` charset wins, then a `<meta charset>` in the first
/// kilobyte, then UTF-8. Invalid sequences are replaced, never fatal.
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> String {
    let declared = content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .find_map(|label| Encoding::for_label(label.trim_matches('"').as_bytes()));

    let sniffed = || {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
        META_CHARSET_REGEX
            .captures(&head)
            .and_then(|c| c.get(1))
            .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
    };

    let encoding = declared.or_else(sniffed).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
