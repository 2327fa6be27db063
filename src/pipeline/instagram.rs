//! Instagram session feed pipeline
//!
//! Instagram is read through its web API with an authenticated session.
//! The profile lookup resolves the numeric user id; posts come from the
//! paginated user feed, then from the timeline edges embedded in the profile
//! response. Comments use the REST endpoint with the legacy query endpoint
//! as fallback.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::crawler::comment::{build_comment_tree, convert_instagram_comment, convert_instagram_edge, limit_comments};
use crate::crawler::fetcher::{FetchOptions, FetchedPage, PageSource};
use crate::crawler::headers::{build_session_headers, BrowserProfile};
use crate::crawler::url::{normalize_identifier, InstagramUrls};
use crate::models::{Comment, Platform, Post, Profile, ScrapeResult};
use crate::parser::fields::{as_count, as_id, as_text, resolve_path, INSTAGRAM_EDGE, INSTAGRAM_ITEM};
use crate::parser::ContentValidator;
use crate::pipeline::merge::ResultMerger;
use crate::pipeline::orchestrator::{Politeness, Strategy, StrategyOrchestrator};
use crate::pipeline::{ScrapeOptions, ScrapeState, StateMachine};
use crate::utils::content_hash;
use crate::utils::error::{FetchError, ParseError, ScrapeError};

/// Items requested per feed page
const FEED_PAGE_SIZE: usize = 12;

/// Upper bound on feed pages per scrape
const FEED_MAX_PAGES: usize = 10;

/// Query hash of the legacy comments query
pub const LEGACY_COMMENTS_QUERY_HASH: &str = "bc3296d1ce80a24b1b6e40b1e72903f5";

/// Authenticated session used for every Instagram request
#[derive(Clone, Default)]
pub struct InstagramCredentials {
    pub session_id: String,
    pub csrf_token: Option<String>,
    pub user_id: Option<String>,
}

impl fmt::Debug for InstagramCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstagramCredentials")
            .field("session_id", &"<redacted>")
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl InstagramCredentials {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn is_present(&self) -> bool {
        !self.session_id.trim().is_empty()
    }

    fn headers(&self) -> HeaderMap {
        build_session_headers(
            &self.session_id,
            self.csrf_token.as_deref(),
            self.user_id.as_deref(),
        )
    }

    /// Every request of one session leaves through the same egress slot
    fn sticky_key(&self) -> String {
        match &self.user_id {
            Some(id) => format!("ig:{id}"),
            None => format!("ig:{}", &content_hash(&self.session_id)[..12]),
        }
    }
}

/// Shared state for one Instagram scrape
pub struct InstagramContext {
    source: Arc<dyn PageSource>,
    urls: InstagramUrls,
    username: String,
    user_id: String,
    profile_json: Value,
    options: FetchOptions,
    validator: ContentValidator,
    politeness: Politeness,
    /// Post id -> shortcode, filled while parsing
    shortcodes: Mutex<HashMap<String, String>>,
}

impl InstagramContext {
    fn remember_shortcode(&self, post_id: &str, shortcode: Option<String>) {
        let Some(shortcode) = shortcode else {
            return;
        };
        if let Ok(mut map) = self.shortcodes.lock() {
            map.insert(post_id.to_string(), shortcode);
        }
    }

    fn shortcode(&self, post_id: &str) -> Option<String> {
        self.shortcodes.lock().ok()?.get(post_id).cloned()
    }
}

// ============================================================================
// Strategies
// ============================================================================

struct UserFeed;

#[async_trait]
impl Strategy<InstagramContext> for UserFeed {
    fn name(&self) -> &'static str {
        "user_feed"
    }

    async fn fetch(&self, ctx: &InstagramContext, quota: usize) -> Result<Vec<FetchedPage>, FetchError> {
        let mut pages = Vec::new();
        let mut max_id: Option<String> = None;
        let mut items = 0;

        for page_number in 0..FEED_MAX_PAGES {
            if page_number > 0 {
                ctx.politeness.pause().await;
            }

            let url = ctx.urls.user_feed(&ctx.user_id, FEED_PAGE_SIZE, max_id.as_deref());
            let page = match ctx.source.fetch(&url, &ctx.options).await {
                Ok(page) => page,
                Err(e) if pages.is_empty() => return Err(e),
                Err(e) => {
                    warn!(page = page_number, error = %e, "Feed pagination stopped early");
                    break;
                }
            };

            let cursor = page.json().ok().map(|json| {
                items += json
                    .get("items")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                let more = json
                    .get("more_available")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let next = json.get("next_max_id").and_then(as_id);
                more.then_some(next).flatten()
            });
            pages.push(page);

            match cursor.flatten() {
                Some(next) if items < quota => {
                    debug!(page = page_number, items = items, "Fetching next feed page");
                    max_id = Some(next);
                }
                _ => break,
            }
        }

        Ok(pages)
    }

    fn parse(&self, ctx: &InstagramContext, pages: &[FetchedPage], quota: usize) -> Result<Vec<Post>, ParseError> {
        let mut posts = Vec::new();

        for page in pages {
            let json = page.json()?;
            let items = json
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| ParseError::MissingField("items".to_string()))?;

            for item in items {
                let Some(post) = INSTAGRAM_ITEM.resolve_post(item, &ctx.validator) else {
                    continue;
                };
                ctx.remember_shortcode(&post.id, item.get("code").and_then(as_text));
                posts.push(post);
            }
        }

        posts.truncate(quota);
        Ok(posts)
    }
}

struct TimelineEdges;

const TIMELINE_EDGES_PATH: &str = "data.user.edge_owner_to_timeline_media.edges";

#[async_trait]
impl Strategy<InstagramContext> for TimelineEdges {
    fn name(&self) -> &'static str {
        "timeline_edges"
    }

    fn applies(&self, ctx: &InstagramContext, _accumulated: usize) -> bool {
        resolve_path(&ctx.profile_json, TIMELINE_EDGES_PATH).is_some()
    }

    fn needs_network(&self) -> bool {
        false
    }

    async fn fetch(&self, _ctx: &InstagramContext, _quota: usize) -> Result<Vec<FetchedPage>, FetchError> {
        Ok(Vec::new())
    }

    fn parse(&self, ctx: &InstagramContext, _pages: &[FetchedPage], quota: usize) -> Result<Vec<Post>, ParseError> {
        let edges = resolve_path(&ctx.profile_json, TIMELINE_EDGES_PATH)
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::MissingField(TIMELINE_EDGES_PATH.to_string()))?;

        Ok(edges
            .iter()
            .filter_map(|edge| edge.get("node"))
            .filter_map(|node| {
                let post = INSTAGRAM_EDGE.resolve_post(node, &ctx.validator)?;
                ctx.remember_shortcode(&post.id, node.get("shortcode").and_then(as_text));
                Some(post)
            })
            .take(quota)
            .collect())
    }
}

// ============================================================================
// Client
// ============================================================================

/// Reads an Instagram profile's posts through an authenticated session
pub struct SessionFeedClient {
    source: Arc<dyn PageSource>,
    credentials: InstagramCredentials,
    urls: InstagramUrls,
    validator: ContentValidator,
    orchestrator: StrategyOrchestrator,
}

impl SessionFeedClient {
    pub fn new(source: Arc<dyn PageSource>, credentials: InstagramCredentials) -> Self {
        Self {
            source,
            credentials,
            urls: InstagramUrls::default(),
            validator: ContentValidator::new(),
            orchestrator: StrategyOrchestrator::default(),
        }
    }

    #[must_use]
    pub fn with_urls(mut self, urls: InstagramUrls) -> Self {
        self.urls = urls;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: StrategyOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    fn require_credentials(&self) -> Result<(), ScrapeError> {
        if self.credentials.is_present() {
            Ok(())
        } else {
            Err(ScrapeError::MissingCredentials(
                "an Instagram session id is required".to_string(),
            ))
        }
    }

    fn fetch_options(&self, username: Option<&str>) -> FetchOptions {
        let referer = match username {
            Some(username) => self.urls.profile_page(username),
            None => format!("{}/", self.urls.base),
        };
        FetchOptions::new(BrowserProfile::InstagramApi)
            .referer(referer)
            .sticky(self.credentials.sticky_key())
            .extra_headers(self.credentials.headers())
    }

    async fn fetch_json(&self, url: &str, options: &FetchOptions) -> Result<Value, ScrapeError> {
        let page = self.source.fetch(url, options).await?;
        Ok(page.json()?)
    }

    /// Look up the profile behind `username`
    ///
    /// Returns the profile and the raw response, which also carries the
    /// first timeline edges.
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` without a session
    /// - `LoginRequired` when the session is rejected with a login wall
    /// - `Fetch` / `Parse` for other failures
    pub async fn profile(&self, username: &str) -> Result<(Profile, Value), ScrapeError> {
        self.require_credentials()?;

        let url = self.urls.profile_info(username);
        let json = self
            .fetch_json(&url, &self.fetch_options(Some(username)))
            .await
            .map_err(|e| match e {
                ScrapeError::Fetch(FetchError::LoginRequired { .. }) => {
                    ScrapeError::LoginRequired(username.to_string())
                }
                other => other,
            })?;

        let profile = profile_from_json(&json)?;
        Ok((profile, json))
    }

    /// Comments of one post, as a tree of at most `limit` top-level entries
    ///
    /// The REST endpoint is tried first; when it fails or returns nothing and
    /// the post's shortcode is known, the legacy query endpoint is used.
    pub async fn comments(
        &self,
        media_id: &str,
        shortcode: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Comment>, ScrapeError> {
        self.require_credentials()?;
        let options = self.fetch_options(None);

        let rest = self
            .fetch_json(&self.urls.comments(media_id), &options)
            .await
            .map(|json| {
                json.get("comments")
                    .and_then(Value::as_array)
                    .map(|comments| comments.iter().flat_map(convert_instagram_comment).collect::<Vec<_>>())
                    .unwrap_or_default()
            });

        let flat = match (rest, shortcode) {
            (Ok(flat), _) if !flat.is_empty() => flat,
            (Ok(flat), None) => flat,
            (Err(e), None) => return Err(e),
            (rest, Some(shortcode)) => {
                if let Err(e) = &rest {
                    debug!(media_id = media_id, error = %e, "REST comments failed, trying legacy query");
                }
                let url = self.urls.legacy_comments(LEGACY_COMMENTS_QUERY_HASH, shortcode, limit);
                let json = self.fetch_json(&url, &options).await?;
                let edges = resolve_path(&json, "data.shortcode_media.edge_media_to_parent_comment.edges")
                    .or_else(|| resolve_path(&json, "data.shortcode_media.edge_media_to_comment.edges"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| ParseError::MissingField("shortcode_media comments".to_string()))?;

                edges
                    .iter()
                    .filter_map(|edge| edge.get("node"))
                    .flat_map(convert_instagram_edge)
                    .collect()
            }
        };

        Ok(limit_comments(build_comment_tree(flat), limit))
    }

    /// Look up a single post by shortcode
    ///
    /// # Errors
    ///
    /// `Parse(NoDataFound)` when neither endpoint yields a valid post
    pub async fn media_by_shortcode(&self, shortcode: &str) -> Result<Post, ScrapeError> {
        self.require_credentials()?;
        let options = self.fetch_options(None);

        match self.fetch_json(&self.urls.media_by_shortcode(shortcode), &options).await {
            Ok(json) => {
                if let Some(post) = resolve_path(&json, "items.0")
                    .and_then(|item| INSTAGRAM_ITEM.resolve_post(item, &self.validator))
                {
                    return Ok(post);
                }
            }
            Err(e) => debug!(shortcode = shortcode, error = %e, "Media lookup failed, trying page JSON"),
        }

        let json = self
            .fetch_json(&self.urls.media_page_json(shortcode), &options)
            .await?;

        resolve_path(&json, "items.0")
            .and_then(|item| INSTAGRAM_ITEM.resolve_post(item, &self.validator))
            .or_else(|| {
                resolve_path(&json, "graphql.shortcode_media")
                    .and_then(|node| INSTAGRAM_EDGE.resolve_post(node, &self.validator))
            })
            .ok_or_else(|| ParseError::NoDataFound.into())
    }

    /// Scrape posts from the profile behind `identifier`
    ///
    /// Always returns a well-formed result; fatal conditions are reported
    /// through [`ScrapeResult::error`].
    pub async fn scrape(&self, identifier: &str, options: &ScrapeOptions) -> ScrapeResult {
        let mut machine = StateMachine::new();
        let username = normalize_identifier(identifier);

        if username.is_empty() {
            machine.transition(ScrapeState::FatalError);
            return ScrapeResult::fatal(
                Platform::Instagram,
                identifier,
                ScrapeError::InvalidIdentifier(identifier.to_string()),
            );
        }
        if let Err(e) = self.require_credentials() {
            machine.transition(ScrapeState::FatalError);
            warn!(username = %username, error = %e, "Cannot scrape");
            return ScrapeResult::fatal(Platform::Instagram, username.as_str(), e);
        }

        info!(username = %username, max_posts = options.max_posts, "Scraping Instagram profile");
        machine.transition(ScrapeState::ResolvingIdentifier);

        let mut result = ScrapeResult::new(Platform::Instagram, username.as_str());

        let (profile, profile_json) = match self.profile(&username).await {
            Ok(found) => found,
            Err(e @ (ScrapeError::LoginRequired(_) | ScrapeError::MissingCredentials(_))) => {
                machine.transition(ScrapeState::FatalError);
                warn!(username = %username, error = %e, "Profile lookup rejected");
                return ScrapeResult::fatal(Platform::Instagram, username.as_str(), e);
            }
            Err(e) => {
                warn!(username = %username, error = %e, "Profile lookup failed");
                result.warn(format!("profile unavailable: {e}"));
                result.warn(ParseError::NoDataFound.to_string());
                machine.transition(ScrapeState::Merging);
                machine.transition(ScrapeState::Complete);
                return result;
            }
        };

        result.resolved_id = Some(profile.id.clone());

        let ctx = InstagramContext {
            source: Arc::clone(&self.source),
            urls: self.urls.clone(),
            username: username.clone(),
            user_id: profile.id.clone(),
            profile_json,
            options: self.fetch_options(Some(&username)),
            validator: self.validator.clone(),
            politeness: self.orchestrator.politeness(),
            shortcodes: Mutex::new(HashMap::new()),
        };
        result.profile = Some(profile);

        let strategies: Vec<Box<dyn Strategy<InstagramContext>>> =
            vec![Box::new(UserFeed), Box::new(TimelineEdges)];
        let mut merger = ResultMerger::new(options.max_posts);
        result.strategies_tried = self
            .orchestrator
            .run(&ctx, &strategies, &mut merger, &mut machine, true)
            .await;

        if merger.is_empty() {
            result.warn(ParseError::NoDataFound.to_string());
        }

        let mut posts = merger.into_posts();
        if options.with_comments {
            for (i, post) in posts.iter_mut().enumerate() {
                if i > 0 {
                    ctx.politeness.pause().await;
                }
                let shortcode = ctx.shortcode(&post.id);
                match self.comments(&post.id, shortcode.as_deref(), options.comment_limit).await {
                    Ok(comments) => post.comments = Some(comments),
                    Err(e) => {
                        warn!(post_id = %post.id, error = %e, "Comments unavailable");
                        result.warn(format!("comments unavailable for post {}: {e}", post.id));
                    }
                }
            }
        }
        result.posts = posts;

        machine.transition(ScrapeState::Complete);
        info!(
            username = %ctx.username,
            posts = result.posts.len(),
            warnings = result.warnings.len(),
            "Instagram scrape complete"
        );
        result
    }
}

/// Profile attributes from a `web_profile_info` response
fn profile_from_json(json: &Value) -> Result<Profile, ParseError> {
    let user = resolve_path(json, "data.user")
        .or_else(|| resolve_path(json, "graphql.user"))
        .ok_or_else(|| ParseError::MissingField("data.user".to_string()))?;

    let text = |path: &str| resolve_path(user, path).and_then(as_text);

    let id = ["id", "pk"]
        .iter()
        .find_map(|path| resolve_path(user, path).and_then(as_id))
        .ok_or_else(|| ParseError::MissingField("data.user.id".to_string()))?;
    let username = text("username").unwrap_or_default();

    Ok(Profile {
        id,
        name: text("full_name").unwrap_or_else(|| username.clone()),
        username,
        about: text("biography").filter(|b| !b.is_empty()),
        follower_count: ["edge_followed_by.count", "follower_count"]
            .iter()
            .find_map(|path| resolve_path(user, path).and_then(as_count)),
        profile_pic_url: text("profile_pic_url"),
        profile_pic_url_hd: text("profile_pic_url_hd"),
        verified: user.get("is_verified").and_then(Value::as_bool).unwrap_or(false),
        website: text("external_url"),
        category: text("category_name"),
    })
}
