//! Selector-driven link extraction over parsed HTML.
//!
//! A [`LinkSelector`] is the selector expression used throughout the scraper.
//! It has three parts: a CSS selector that picks elements, the attribute whose
//! value is extracted (`href` unless told otherwise), and an optional
//! [`TextFilter`] that inspects the element's *direct* text children, the way
//! an XPath `a[text()[contains(...)]]` predicate does. Every extracted value
//! goes through [`normalize_url`].
//!
//! [`Document`] wraps `scraper::Html`, which is not `Send`; keep it inside a
//! synchronous scope and drop it before awaiting.

use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

use crate::normalize::normalize_url;

const DEFAULT_ABOUT_CSS: &str = "a[href]";
const DEFAULT_TWITTER_CSS: &str = "a[href*='twitter.com']";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("document is empty")]
    EmptyDocument,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid selector `{expr}`: {message}")]
    Invalid { expr: String, message: String },
    #[error("attribute name must not be empty")]
    EmptyAttribute,
}

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse raw response bytes. Markup errors are tolerated; only an empty
    /// (or whitespace-only) body is rejected.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::EmptyDocument);
        }
        Ok(Self {
            html: Html::parse_document(&String::from_utf8_lossy(body)),
        })
    }

    pub fn parse_str(body: &str) -> Result<Self, ParseError> {
        Self::parse(body.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fold {
    /// XPath `translate(., from, to)`: chars in `from` map to the char at the
    /// same index in `to`, or are dropped when `to` is shorter.
    Translate { from: Vec<char>, to: Vec<char> },
    /// Full Unicode lowercasing of both sides.
    Lowercase,
}

/// "Direct text contains needle" predicate, with an optional character fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    needle: String,
    fold: Fold,
}

impl TextFilter {
    /// Plain, case-sensitive substring match.
    pub fn contains(needle: &str) -> Self {
        Self::translate_contains("", "", needle)
    }

    /// `contains(translate(text, from, to), needle)`.
    ///
    /// ```
    /// use inet_web::TextFilter;
    ///
    /// let about = TextFilter::translate_contains("ABOUT", "about", "about");
    /// assert!(about.matches("ABOUT US"));
    /// // Only the five letters are folded.
    /// assert!(!TextFilter::translate_contains("ABOUT", "about", "team").matches("TEAM"));
    /// ```
    pub fn translate_contains(from: &str, to: &str, needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
            fold: Fold::Translate {
                from: from.chars().collect(),
                to: to.chars().collect(),
            },
        }
    }

    /// Case-insensitive substring match using full Unicode lowercasing.
    pub fn contains_ignore_case(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
            fold: Fold::Lowercase,
        }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.fold {
            Fold::Translate { from, .. } if from.is_empty() => text.contains(&self.needle),
            Fold::Translate { from, to } => translate(text, from, to).contains(&self.needle),
            Fold::Lowercase => text.to_lowercase().contains(&self.needle),
        }
    }
}

fn translate(text: &str, from: &[char], to: &[char]) -> String {
    text.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Which elements to visit, which attribute to take, and an optional text test.
#[derive(Debug, Clone)]
pub struct LinkSelector {
    expr: String,
    selector: Selector,
    attr: String,
    text: Option<TextFilter>,
}

impl LinkSelector {
    /// Select elements by CSS expression and extract their `href`.
    pub fn css(expr: &str) -> Result<Self, SelectorError> {
        let selector = Selector::parse(expr).map_err(|e| SelectorError::Invalid {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            selector,
            attr: "href".to_string(),
            text: None,
        })
    }

    /// Extract `attr` instead of `href`.
    pub fn with_attr(mut self, attr: &str) -> Result<Self, SelectorError> {
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(SelectorError::EmptyAttribute);
        }
        self.attr = attr.to_string();
        Ok(self)
    }

    /// Keep only elements with a direct text child accepted by `filter`.
    pub fn with_text(mut self, filter: TextFilter) -> Self {
        self.text = Some(filter);
        self
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }

    pub fn text_filter(&self) -> Option<&TextFilter> {
        self.text.as_ref()
    }

    fn accepts(&self, el: &ElementRef<'_>) -> bool {
        let Some(filter) = &self.text else {
            return true;
        };
        el.children()
            .filter_map(|child| child.value().as_text())
            .any(|text| filter.matches(text))
    }

    fn raw_values<'a>(&'a self, doc: &'a Document) -> impl Iterator<Item = &'a str> + 'a {
        doc.html
            .select(&self.selector)
            .filter(move |el| self.accepts(el))
            .filter_map(move |el| el.value().attr(&self.attr))
    }
}

/// Anchors with an `href` whose direct text contains "about", folding only
/// the letters A, B, O, U and T to lowercase.
pub fn default_about_selector() -> &'static LinkSelector {
    static ABOUT: OnceLock<LinkSelector> = OnceLock::new();
    ABOUT.get_or_init(|| {
        LinkSelector::css(DEFAULT_ABOUT_CSS)
            .expect("built-in about selector parses")
            .with_text(TextFilter::translate_contains("ABOUT", "about", "about"))
    })
}

/// Anchors whose `href` contains `twitter.com`.
pub fn default_twitter_selector() -> &'static LinkSelector {
    static TWITTER: OnceLock<LinkSelector> = OnceLock::new();
    TWITTER.get_or_init(|| {
        LinkSelector::css(DEFAULT_TWITTER_CSS).expect("built-in twitter selector parses")
    })
}

/// Apply `selector` to `doc`; values come back normalized, in document
/// order, duplicates included.
pub fn extract_links(doc: &Document, selector: &LinkSelector) -> Vec<String> {
    selector.raw_values(doc).map(normalize_url).collect()
}

/// Like [`extract_links`], but relative values are first resolved against
/// `base`. Values that cannot be joined are normalized as-is.
pub fn extract_links_resolved(doc: &Document, selector: &LinkSelector, base: &Url) -> Vec<String> {
    selector
        .raw_values(doc)
        .map(|raw| match base.join(raw.trim()) {
            Ok(joined) => joined.to_string(),
            Err(_) => normalize_url(raw),
        })
        .map(|url| normalize_url(&url))
        .collect()
}
