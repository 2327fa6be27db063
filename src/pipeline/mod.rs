//! Scrape pipelines
//!
//! A scrape moves through a fixed state machine:
//!
//! ```text
//! Idle -> ResolvingIdentifier -> Fetching(i) -> Parsing(i) -> { NextStrategy | Merging } -> Complete
//! ```
//!
//! `FatalError` is reachable only before any strategy runs: missing
//! credentials, or a login wall / unrecoverable failure on the
//! identifier-resolution fetch. Everything after that degrades into
//! warnings on an otherwise successful result.

pub mod facebook;
pub mod instagram;
pub mod merge;
pub mod orchestrator;

use std::fmt;
use tracing::{debug, warn};

pub use facebook::FacebookScraper;
pub use instagram::{InstagramCredentials, SessionFeedClient};
pub use merge::ResultMerger;
pub use orchestrator::{Politeness, Strategy, StrategyOrchestrator};

/// Options shared by every platform pipeline
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Maximum number of posts to return
    pub max_posts: usize,

    /// Fetch comments for each post
    pub with_comments: bool,

    /// Maximum number of top-level comments per post
    pub comment_limit: usize,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            max_posts: 10,
            with_comments: false,
            comment_limit: 20,
        }
    }
}

/// Scrape lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    ResolvingIdentifier,
    /// Strategy `i` is fetching
    Fetching(usize),
    /// Strategy `i` is parsing what it fetched
    Parsing(usize),
    NextStrategy,
    Merging,
    Complete,
    FatalError,
}

impl ScrapeState {
    /// Whether moving from `self` to `next` is legal
    pub fn can_transition_to(&self, next: ScrapeState) -> bool {
        use ScrapeState::*;

        match (*self, next) {
            (Idle, ResolvingIdentifier | FatalError) => true,
            (ResolvingIdentifier, Fetching(_) | NextStrategy | Merging | FatalError) => true,
            (Fetching(i), Parsing(j)) => i == j,
            (Fetching(_), NextStrategy | Merging) => true,
            (Parsing(_), NextStrategy | Merging) => true,
            (NextStrategy, Fetching(_) | NextStrategy | Merging) => true,
            (Merging, Complete) => true,
            _ => false,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::FatalError)
    }
}

impl fmt::Display for ScrapeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ResolvingIdentifier => write!(f, "resolving_identifier"),
            Self::Fetching(i) => write!(f, "fetching({i})"),
            Self::Parsing(i) => write!(f, "parsing({i})"),
            Self::NextStrategy => write!(f, "next_strategy"),
            Self::Merging => write!(f, "merging"),
            Self::Complete => write!(f, "complete"),
            Self::FatalError => write!(f, "fatal_error"),
        }
    }
}

/// Tracks the current state and the path taken
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ScrapeState,
    history: Vec<ScrapeState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: ScrapeState::Idle,
            history: vec![ScrapeState::Idle],
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScrapeState {
        self.state
    }

    pub fn history(&self) -> &[ScrapeState] {
        &self.history
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn transition(&mut self, next: ScrapeState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Illegal scrape state transition");
            return false;
        }
        debug!(from = %self.state, to = %next, "Scrape state transition");
        self.state = next;
        self.history.push(next);
        true
    }
}

/// Scripted page source for pipeline unit tests
#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::crawler::fetcher::{FetchOptions, FetchedPage, PageSource};
    use crate::utils::error::FetchError;

    #[derive(Debug, Clone)]
    pub enum Reply {
        Body(String),
        Status(u16),
        Login,
    }

    /// Answers exact URLs from a script; anything else is a 404
    #[derive(Default)]
    pub struct ScriptedSource {
        replies: HashMap<String, Reply>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, url: impl Into<String>, reply: Reply) -> Self {
            self.replies.insert(url.into(), reply);
            self
        }

        pub fn body(self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.on(url, Reply::Body(body.into()))
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchedPage, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.replies.get(url).cloned().unwrap_or(Reply::Status(404)) {
                Reply::Body(body) => Ok(FetchedPage {
                    status: 200,
                    url: url.to_string(),
                    body,
                    attempts: 1,
                    backoff_delays: Vec::new(),
                }),
                Reply::Status(code) => Err(FetchError::Status(code)),
                Reply::Login => Err(FetchError::LoginRequired {
                    location: "https://www.facebook.com/login/".to_string(),
                }),
            }
        }
    }
}
