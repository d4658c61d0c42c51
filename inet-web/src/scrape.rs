//! The scrape pipeline: normalize, fetch, parse, extract, follow about links.
//!
//! A top-level fetch or parse failure makes the whole call come back empty
//! handed ([`HtmlScraper::scrape`] returns `None`). A failure while fetching
//! one about link only drops that page. Twitter links are collected, never
//! fetched.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use inet_http::{FetchError, PageFetcher};
use thiserror::Error;
use url::Url;

use crate::extract::{
    default_about_selector, default_twitter_selector, extract_links, extract_links_resolved,
    Document, LinkSelector, ParseError,
};
use crate::normalize::normalize_url;

/// About-link fetches in flight at once, unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Hosts whose first path segment is a profile handle.
const TWITTER_HOSTS: &[&str] = &[
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
    "x.com",
    "www.x.com",
];
/// Path segments on those hosts that are not profiles.
const NON_PROFILE_SEGMENTS: &[&str] = &["intent", "share", "home", "i", "hashtag", "search"];

/// What to scrape and how.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    /// Follow and fetch about links.
    pub about: bool,
    /// Collect Twitter links.
    pub twitter_handles: bool,
    /// Overrides [`default_about_selector`].
    pub about_selector: Option<LinkSelector>,
    /// Overrides [`default_twitter_selector`].
    pub twitter_selector: Option<LinkSelector>,
    /// Resolve relative hrefs against the fetched page URL before normalizing.
    pub resolve_relative: bool,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            about: true,
            twitter_handles: true,
            about_selector: None,
            twitter_selector: None,
            resolve_relative: false,
        }
    }

    pub fn about(mut self, enabled: bool) -> Self {
        self.about = enabled;
        self
    }

    pub fn twitter_handles(mut self, enabled: bool) -> Self {
        self.twitter_handles = enabled;
        self
    }

    pub fn about_selector(mut self, selector: LinkSelector) -> Self {
        self.about_selector = Some(selector);
        self
    }

    pub fn twitter_selector(mut self, selector: LinkSelector) -> Self {
        self.twitter_selector = Some(selector);
        self
    }

    pub fn resolve_relative(mut self, enabled: bool) -> Self {
        self.resolve_relative = enabled;
        self
    }

    fn about_links_selector(&self) -> Option<&LinkSelector> {
        self.about.then(|| {
            self.about_selector
                .as_ref()
                .unwrap_or_else(|| default_about_selector())
        })
    }

    fn twitter_links_selector(&self) -> Option<&LinkSelector> {
        self.twitter_handles.then(|| {
            self.twitter_selector
                .as_ref()
                .unwrap_or_else(|| default_twitter_selector())
        })
    }
}

/// Bodies of the about pages that could be fetched, and the Twitter links found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeResult {
    pub about_pages: Vec<Bytes>,
    pub twitter_links: Vec<String>,
}

impl ScrapeResult {
    /// Profile handles (first path segment, without `@`) of the links that
    /// point at a Twitter host. Links on other hosts are ignored.
    ///
    /// ```
    /// use inet_web::ScrapeResult;
    ///
    /// let result = ScrapeResult {
    ///     about_pages: vec![],
    ///     twitter_links: vec![
    ///         "https://twitter.com/acme".into(),
    ///         "https://twitter.com/intent/tweet?text=hi".into(),
    ///         "http://twitter.com/@AcmeLabs/".into(),
    ///         "https://facebook.com/acme".into(),
    ///         "https://x.com/acme_x".into(),
    ///     ],
    /// };
    /// assert_eq!(result.twitter_handles(), vec!["acme", "AcmeLabs", "acme_x"]);
    /// ```
    pub fn twitter_handles(&self) -> Vec<String> {
        self.twitter_links
            .iter()
            .filter_map(|link| Url::parse(link).ok())
            .filter(|url| {
                url.host_str().is_some_and(|host| {
                    TWITTER_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host))
                })
            })
            .filter_map(|url| {
                let first = url.path_segments()?.find(|s| !s.is_empty())?;
                let handle = first.trim_start_matches('@');
                let reserved = NON_PROFILE_SEGMENTS
                    .iter()
                    .any(|r| r.eq_ignore_ascii_case(handle));
                (!handle.is_empty() && !reserved).then(|| handle.to_string())
            })
            .collect()
    }
}

/// Why a scrape produced no result.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

struct Links {
    about: Vec<String>,
    twitter: Vec<String>,
}

/// Scraper bound to a pooled [`PageFetcher`].
#[derive(Clone)]
pub struct HtmlScraper {
    fetcher: PageFetcher,
    max_concurrency: usize,
}

impl HtmlScraper {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self {
            fetcher,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Bound on concurrent about-link fetches; 1 fetches them one by one.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Scrape `req`, or `None` when the page itself could not be fetched or parsed.
    pub async fn scrape(&self, req: &ScrapeRequest) -> Option<ScrapeResult> {
        match self.try_scrape(req).await {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::debug!(url=%req.url, error=%err, "scrape.failed");
                None
            }
        }
    }

    /// Like [`HtmlScraper::scrape`], but says why nothing came back.
    pub async fn try_scrape(&self, req: &ScrapeRequest) -> Result<ScrapeResult, ScrapeError> {
        let url = normalize_url(&req.url);
        tracing::info!(
            url=%url,
            about=req.about,
            twitter_handles=req.twitter_handles,
            "scrape.start"
        );

        let page = self.fetcher.fetch(&url).await?;
        let base = req.resolve_relative.then_some(&page.url);
        let links = collect_links(
            &page.body,
            base,
            req.about_links_selector(),
            req.twitter_links_selector(),
        )
        .map_err(|source| ScrapeError::Parse {
            url: url.clone(),
            source,
        })?;

        let about_pages = self.fetch_about_pages(&links.about).await;
        tracing::info!(
            url=%url,
            about_links=links.about.len(),
            about_pages=about_pages.len(),
            twitter_links=links.twitter.len(),
            "scrape.done"
        );

        Ok(ScrapeResult {
            about_pages,
            twitter_links: links.twitter,
        })
    }

    /// Fetch every link, at most `max_concurrency` at a time. Bodies keep
    /// the order of `links`; failed fetches are skipped.
    async fn fetch_about_pages(&self, links: &[String]) -> Vec<Bytes> {
        stream::iter(links)
            .map(|link| self.fetcher.fetch_optional(link))
            .buffered(self.max_concurrency)
            .filter_map(|page| async move { page.map(|p| p.body) })
            .collect()
            .await
    }
}

/// Parse and extract in one synchronous step so the non-`Send` document
/// never lives across an await.
fn collect_links(
    body: &[u8],
    base: Option<&Url>,
    about: Option<&LinkSelector>,
    twitter: Option<&LinkSelector>,
) -> Result<Links, ParseError> {
    let doc = Document::parse(body)?;
    let extract = |selector: &LinkSelector| match base {
        Some(base) => extract_links_resolved(&doc, selector, base),
        None => extract_links(&doc, selector),
    };
    Ok(Links {
        about: about.map(extract).unwrap_or_default(),
        twitter: twitter.map(extract).unwrap_or_default(),
    })
}
