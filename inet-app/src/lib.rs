//! Enrichment orchestration behind the `inet` binary.
//!
//! [`Inet`] owns one dataset plus everything built from configuration: the
//! HTML scraper, the registry client stacks and the entity matchers.
pub mod inet;

pub use inet::{link_selector, AboutPage, Inet, RowReport, RowScrape, ScrapeReport};
