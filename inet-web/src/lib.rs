//! Website scraping for entity enrichment.
//!
//! - URL scheme normalization (`normalize`)
//! - Selector-based link extraction (`extract`)
//! - The fetch, parse and follow-about-links pipeline (`scrape`)
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use inet_http::{FetchSettings, PageFetcher};
//! use inet_web::{HtmlScraper, ScrapeRequest};
//!
//! let scraper = HtmlScraper::new(PageFetcher::new(FetchSettings::default())?);
//! if let Some(result) = scraper.scrape(&ScrapeRequest::new("example.com")).await {
//!     println!("{} about pages, twitter: {:?}", result.about_pages.len(), result.twitter_links);
//! }
//! # Ok(()) }
//! ```

pub mod extract;
pub mod normalize;
pub mod scrape;

pub use extract::{
    default_about_selector, default_twitter_selector, extract_links, extract_links_resolved,
    Document, LinkSelector, ParseError, SelectorError, TextFilter,
};
pub use normalize::normalize_url;
pub use scrape::{HtmlScraper, ScrapeError, ScrapeRequest, ScrapeResult, DEFAULT_MAX_CONCURRENCY};
