//! Facebook page pipeline
//!
//! The desktop page is fetched once up front: it resolves the numeric page
//! id and the profile, and a login wall there is fatal. Posts then come from
//! four strategies in order:
//!
//! 1. `mobile_site` - the lightweight mobile markup
//! 2. `desktop_feed` - structured payloads embedded in the primary page
//! 3. `alternate_view` - the `/posts` listing
//! 4. `meta_fallback` - the page description, only when nothing else worked

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::crawler::comment::limit_comments;
use crate::crawler::fetcher::{FetchOptions, FetchedPage, PageSource};
use crate::crawler::headers::BrowserProfile;
use crate::crawler::url::{normalize_identifier, FacebookUrls};
use crate::models::{Platform, Post, PostBuilder, ScrapeResult};
use crate::parser::html::{parse_json_text_patterns, profile_from_meta};
use crate::parser::selectors::SurfaceSelectors;
use crate::parser::{find_stories, page_id, parse_meta, posts_from_stories, ContentValidator, MarkupParser};
use crate::pipeline::merge::ResultMerger;
use crate::pipeline::orchestrator::{Strategy, StrategyOrchestrator};
use crate::pipeline::{ScrapeOptions, ScrapeState, StateMachine};
use crate::utils::error::{FetchError, ParseError, ScrapeError};

/// Shared state for one Facebook scrape
pub struct FacebookContext {
    source: Arc<dyn PageSource>,
    urls: FacebookUrls,
    handle: String,
    primary: Option<FetchedPage>,
    validator: ContentValidator,
    markup: MarkupParser,
    with_comments: bool,
}

impl FacebookContext {
    /// Posts from a listing page: story payloads first, markup otherwise
    fn parse_listing(&self, html: &str, surface: &SurfaceSelectors, quota: usize) -> Vec<Post> {
        let (payloads, stories) = find_stories(html);
        if !stories.is_empty() {
            return posts_from_stories(&stories, &self.validator, self.with_comments, quota);
        }

        debug!(payloads = payloads, "No story nodes, falling back to markup");
        let mut posts = self.markup.parse_posts(html, surface, &self.validator, quota);
        if posts.len() < quota {
            posts.extend(parse_json_text_patterns(html, &self.validator, quota - posts.len()));
        }
        posts
    }

    fn primary_page(&self) -> Result<Vec<FetchedPage>, FetchError> {
        self.primary
            .clone()
            .map(|page| vec![page])
            .ok_or_else(|| FetchError::Status(404))
    }
}

// ============================================================================
// Strategies
// ============================================================================

struct MobileSite;

#[async_trait]
impl Strategy<FacebookContext> for MobileSite {
    fn name(&self) -> &'static str {
        "mobile_site"
    }

    async fn fetch(&self, ctx: &FacebookContext, _quota: usize) -> Result<Vec<FetchedPage>, FetchError> {
        let options = FetchOptions::new(BrowserProfile::MobileChrome)
            .referer(format!("{}/", ctx.urls.mobile_base))
            .sticky(ctx.handle.as_str());
        let page = ctx.source.fetch(&ctx.urls.mobile(&ctx.handle), &options).await?;
        Ok(vec![page])
    }

    fn parse(&self, ctx: &FacebookContext, pages: &[FetchedPage], quota: usize) -> Result<Vec<Post>, ParseError> {
        let surface = SurfaceSelectors::mobile();
        Ok(pages
            .iter()
            .flat_map(|page| ctx.parse_listing(&page.body, &surface, quota))
            .take(quota)
            .collect())
    }
}

struct DesktopFeed;

#[async_trait]
impl Strategy<FacebookContext> for DesktopFeed {
    fn name(&self) -> &'static str {
        "desktop_feed"
    }

    fn applies(&self, ctx: &FacebookContext, _accumulated: usize) -> bool {
        ctx.primary.is_some()
    }

    fn needs_network(&self) -> bool {
        false
    }

    async fn fetch(&self, ctx: &FacebookContext, _quota: usize) -> Result<Vec<FetchedPage>, FetchError> {
        ctx.primary_page()
    }

    fn parse(&self, ctx: &FacebookContext, pages: &[FetchedPage], quota: usize) -> Result<Vec<Post>, ParseError> {
        let surface = SurfaceSelectors::desktop();
        Ok(pages
            .iter()
            .flat_map(|page| ctx.parse_listing(&page.body, &surface, quota))
            .take(quota)
            .collect())
    }
}

struct AlternateView;

#[async_trait]
impl Strategy<FacebookContext> for AlternateView {
    fn name(&self) -> &'static str {
        "alternate_view"
    }

    async fn fetch(&self, ctx: &FacebookContext, _quota: usize) -> Result<Vec<FetchedPage>, FetchError> {
        let options = FetchOptions::new(BrowserProfile::DesktopChrome)
            .referer(ctx.urls.page(&ctx.handle))
            .sticky(ctx.handle.as_str());
        let page = ctx.source.fetch(&ctx.urls.posts(&ctx.handle), &options).await?;
        Ok(vec![page])
    }

    fn parse(&self, ctx: &FacebookContext, pages: &[FetchedPage], quota: usize) -> Result<Vec<Post>, ParseError> {
        let surface = SurfaceSelectors::desktop();
        Ok(pages
            .iter()
            .flat_map(|page| ctx.parse_listing(&page.body, &surface, quota))
            .take(quota)
            .collect())
    }
}

struct MetaFallback;

#[async_trait]
impl Strategy<FacebookContext> for MetaFallback {
    fn name(&self) -> &'static str {
        "meta_fallback"
    }

    fn applies(&self, ctx: &FacebookContext, accumulated: usize) -> bool {
        accumulated == 0 && ctx.primary.is_some()
    }

    fn needs_network(&self) -> bool {
        false
    }

    async fn fetch(&self, ctx: &FacebookContext, _quota: usize) -> Result<Vec<FetchedPage>, FetchError> {
        ctx.primary_page()
    }

    fn parse(&self, ctx: &FacebookContext, pages: &[FetchedPage], _quota: usize) -> Result<Vec<Post>, ParseError> {
        let page = pages.first().ok_or(ParseError::NoDataFound)?;
        let meta = parse_meta(&page.body);
        let description = meta
            .description
            .ok_or_else(|| ParseError::MissingField("og:description".to_string()))?;

        let mut builder = PostBuilder::new().content(description);
        if let Some(image) = meta.image {
            builder = builder.media_url(image);
        }
        Ok(builder.build(&ctx.validator).into_iter().collect())
    }
}

fn strategies() -> Vec<Box<dyn Strategy<FacebookContext>>> {
    vec![
        Box::new(MobileSite),
        Box::new(DesktopFeed),
        Box::new(AlternateView),
        Box::new(MetaFallback),
    ]
}

// ============================================================================
// Scraper
// ============================================================================

/// Scrapes public Facebook pages
pub struct FacebookScraper {
    source: Arc<dyn PageSource>,
    urls: FacebookUrls,
    validator: ContentValidator,
    orchestrator: StrategyOrchestrator,
}

impl FacebookScraper {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            urls: FacebookUrls::default(),
            validator: ContentValidator::new(),
            orchestrator: StrategyOrchestrator::default(),
        }
    }

    #[must_use]
    pub fn with_urls(mut self, urls: FacebookUrls) -> Self {
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

    async fn fetch_primary(&self, handle: &str) -> Result<FetchedPage, FetchError> {
        let options = FetchOptions::new(BrowserProfile::DesktopChrome)
            .sticky(handle)
            .manual_redirects();
        self.source.fetch(&self.urls.page(handle), &options).await
    }

    /// Resolve the numeric page id behind `identifier`
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` when nothing usable remains after normalization
    /// - `LoginRequired` / `Fetch` when the page cannot be loaded
    /// - `Parse(MissingField)` when the page carries no recognizable id
    pub async fn resolve_page_id(&self, identifier: &str) -> Result<String, ScrapeError> {
        let handle = normalize_identifier(identifier);
        if handle.is_empty() {
            return Err(ScrapeError::InvalidIdentifier(identifier.to_string()));
        }
        if page_id::is_numeric_id(&handle) {
            return Ok(handle);
        }

        let page = self.fetch_primary(&handle).await.map_err(|e| match e {
            FetchError::LoginRequired { .. } => ScrapeError::LoginRequired(handle.clone()),
            other => ScrapeError::Fetch(other),
        })?;

        page_id::resolve(&handle, &page.body, &page.url)
            .ok_or_else(|| ParseError::MissingField("page id".to_string()).into())
    }

    /// Scrape posts from the page behind `identifier`
    ///
    /// Always returns a well-formed result; fatal conditions are reported
    /// through [`ScrapeResult::error`].
    pub async fn scrape(&self, identifier: &str, options: &ScrapeOptions) -> ScrapeResult {
        let mut machine = StateMachine::new();
        let handle = normalize_identifier(identifier);

        if handle.is_empty() {
            machine.transition(ScrapeState::FatalError);
            let error = ScrapeError::InvalidIdentifier(identifier.to_string());
            warn!(error = %error, "Cannot scrape");
            return ScrapeResult::fatal(Platform::Facebook, identifier, error);
        }

        info!(handle = %handle, max_posts = options.max_posts, "Scraping Facebook page");
        machine.transition(ScrapeState::ResolvingIdentifier);
        let mut result = ScrapeResult::new(Platform::Facebook, handle.as_str());

        let primary = match self.fetch_primary(&handle).await {
            Ok(page) => Some(page),
            Err(e) if e.is_login_wall() => {
                machine.transition(ScrapeState::FatalError);
                warn!(handle = %handle, error = %e, "Page is behind a login wall");
                return ScrapeResult::fatal(
                    Platform::Facebook,
                    handle.as_str(),
                    ScrapeError::LoginRequired(handle.clone()),
                );
            }
            Err(e) => {
                warn!(handle = %handle, error = %e, "Primary page unavailable");
                result.warn(format!("primary page unavailable: {e}"));
                None
            }
        };

        if let Some(page) = &primary {
            result.resolved_id = page_id::resolve(&handle, &page.body, &page.url);
            let meta = parse_meta(&page.body);
            result.profile = Some(profile_from_meta(&meta, &handle, result.resolved_id.as_deref()));
        }
        match &result.resolved_id {
            Some(id) => debug!(handle = %handle, page_id = %id, "Resolved page id"),
            None => result.warn(format!("page id not resolved for {handle}")),
        }

        let ctx = FacebookContext {
            source: Arc::clone(&self.source),
            urls: self.urls.clone(),
            handle: handle.clone(),
            primary,
            validator: self.validator.clone(),
            markup: MarkupParser::new(),
            with_comments: options.with_comments,
        };

        let mut merger = ResultMerger::new(options.max_posts);
        result.strategies_tried = self
            .orchestrator
            .run(&ctx, &strategies(), &mut merger, &mut machine, true)
            .await;

        if merger.is_empty() {
            result.warn(ParseError::NoDataFound.to_string());
        }

        result.posts = merger
            .into_posts()
            .into_iter()
            .map(|mut post| {
                post.comments = post
                    .comments
                    .take()
                    .map(|comments| limit_comments(comments, options.comment_limit));
                post
            })
            .collect();

        machine.transition(ScrapeState::Complete);
        info!(
            handle = %handle,
            posts = result.posts.len(),
            warnings = result.warnings.len(),
            "Facebook scrape complete"
        );
        result
    }
}
