//! CSS selectors for page markup
//!
//! Selector sets for the mobile site, the desktop page and the document
//! metadata. Each set lists alternatives in priority order; markup changes
//! over time, so several generations are kept side by side.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    // Mobile site post containers
    static ref MOBILE_CONTAINER: Vec<Selector> = vec![
        parse_selector!("article[data-ft]"),
        parse_selector!("div[data-ft][data-store]"),
        parse_selector!("div.story_body_container"),
        parse_selector!("article"),
    ];

    static ref MOBILE_TEXT: Vec<Selector> = vec![
        parse_selector!("div[data-ft] > div > span"),
        parse_selector!("div.story_body_container > div"),
        parse_selector!("p"),
    ];

    static ref MOBILE_TIME: Vec<Selector> = vec![
        parse_selector!("abbr[data-utime]"),
        parse_selector!("abbr"),
    ];

    // Desktop page post containers
    static ref DESKTOP_CONTAINER: Vec<Selector> = vec![
        parse_selector!("div[role='article']"),
        parse_selector!("div.userContentWrapper"),
        parse_selector!("div[data-pagelet^='FeedUnit']"),
    ];

    static ref DESKTOP_TEXT: Vec<Selector> = vec![
        parse_selector!("div[data-ad-preview='message']"),
        parse_selector!("div[data-ad-comet-preview='message']"),
        parse_selector!("div.userContent"),
        parse_selector!("div[dir='auto']"),
    ];

    static ref DESKTOP_TIME: Vec<Selector> = vec![
        parse_selector!("abbr[data-utime]"),
        parse_selector!("a[role='link'] span[id] > span"),
    ];

    static ref POST_IMAGE: Selector = parse_selector!("img[src]");

    // Document metadata
    static ref META_OG_TITLE: Selector = parse_selector!("meta[property='og:title']");
    static ref META_OG_DESCRIPTION: Selector = parse_selector!("meta[property='og:description']");
    static ref META_OG_IMAGE: Selector = parse_selector!("meta[property='og:image']");
    static ref META_OG_URL: Selector = parse_selector!("meta[property='og:url']");
    static ref META_DESCRIPTION: Selector = parse_selector!("meta[name='description']");
    static ref TITLE: Selector = parse_selector!("title");

    // Noise selectors - elements whose text never belongs to a post
    static ref NOISE_ELEMENTS: Vec<Selector> = {
        let selectors = vec![
            "script",
            "style",
            "noscript",
            "iframe",
            "footer",
            "[role='button']",
            "[aria-hidden='true']",
        ];

        selectors
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect()
    };
}

/// Selectors for one post-listing surface
pub struct SurfaceSelectors {
    pub container: &'static [Selector],
    pub text: &'static [Selector],
    pub time: &'static [Selector],
    pub image: &'static Selector,
}

impl SurfaceSelectors {
    /// Mobile site markup (m.facebook.com)
    pub fn mobile() -> Self {
        Self {
            container: &MOBILE_CONTAINER,
            text: &MOBILE_TEXT,
            time: &MOBILE_TIME,
            image: &POST_IMAGE,
        }
    }

    /// Desktop page markup
    pub fn desktop() -> Self {
        Self {
            container: &DESKTOP_CONTAINER,
            text: &DESKTOP_TEXT,
            time: &DESKTOP_TIME,
            image: &POST_IMAGE,
        }
    }
}

/// Selectors for document-level metadata
pub struct MetaSelectors {
    pub og_title: &'static Selector,
    pub og_description: &'static Selector,
    pub og_image: &'static Selector,
    pub og_url: &'static Selector,
    pub description: &'static Selector,
    pub title: &'static Selector,
}

impl MetaSelectors {
    pub fn new() -> Self {
        Self {
            og_title: &META_OG_TITLE,
            og_description: &META_OG_DESCRIPTION,
            og_image: &META_OG_IMAGE,
            og_url: &META_OG_URL,
            description: &META_DESCRIPTION,
            title: &TITLE,
        }
    }
}

impl Default for MetaSelectors {
    fn default() -> Self {
        Self::new()
    }
}

/// Elements skipped when collecting text
pub struct NoiseSelectors {
    pub elements: &'static [Selector],
}

impl NoiseSelectors {
    pub fn new() -> Self {
        Self {
            elements: &NOISE_ELEMENTS,
        }
    }
}

impl Default for NoiseSelectors {
    fn default() -> Self {
        Self::new()
    }
}
