//! Single-shot page fetching for the HTML scraper.
//!
//! Unlike [`crate::HttpClient`], a [`PageFetcher`] is not anchored to a base
//! URL and never retries: one call is one GET. Every failure is reported as a
//! [`FetchError`] so callers can tell retryable transport problems from a
//! server that answered with an error status. Callers that only care whether
//! a page arrived use [`PageFetcher::fetch_optional`], which logs the failure
//! at debug level and collapses it to `None`.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

use crate::{next_request_id, HttpError};

/// Transport-level failure of a single page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("network error fetching {url}: {message}")]
    Network {
        url: String,
        message: String,
        timed_out: bool,
    },
    #[error("too many redirects fetching {url}")]
    TooManyRedirects { url: String },
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::TooManyRedirects { url }
            | FetchError::HttpStatus { url, .. } => url,
        }
    }

    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::Network { .. } => "network",
            FetchError::TooManyRedirects { .. } => "too_many_redirects",
            FetchError::HttpStatus { .. } => "http_status",
        }
    }

    /// Whether trying the same URL again later could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchError::InvalidUrl { .. } | FetchError::TooManyRedirects { .. } => false,
        }
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Client settings for [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Whole-request timeout, applied to every fetch independently.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 30,
            user_agent: None,
        }
    }
}

/// Pooled GET client for arbitrary absolute URLs.
#[derive(Clone)]
pub struct PageFetcher {
    inner: Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(redirect::Policy::limited(settings.max_redirects));
        if let Some(ua) = &settings.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let inner = builder
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            timeout: settings.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` once. Any status >= 400 is an error.
    pub async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                message: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        let req_id = next_request_id();
        tracing::debug!(
            req_id=%req_id,
            host_path=%format!("{}{}", parsed.host_str().unwrap_or("-"), parsed.path()),
            timeout_ms=self.timeout.as_millis() as u64,
            "page.fetch.start"
        );

        let t0 = std::time::Instant::now();
        let resp = self
            .inner
            .get(parsed)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status();
        let final_url = resp.url().clone();
        let headers = resp.headers().clone();

        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.bytes().await.map_err(|e| classify(url, e))?;
        tracing::debug!(
            req_id=%req_id,
            %status,
            final_url=%final_url,
            duration_ms=t0.elapsed().as_millis() as u64,
            body_len=body.len(),
            "page.fetch.done"
        );

        Ok(Page {
            url: final_url,
            status,
            headers,
            body,
        })
    }

    /// [`PageFetcher::fetch`] with every failure logged and collapsed to `None`.
    pub async fn fetch_optional(&self, url: &str) -> Option<Page> {
        match self.fetch(url).await {
            Ok(page) => Some(page),
            Err(err) => {
                tracing::debug!(
                    url=%err.url(),
                    kind=err.kind(),
                    retryable=err.is_retryable(),
                    error=%err,
                    "page.fetch.failed"
                );
                None
            }
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_redirect() {
        FetchError::TooManyRedirects {
            url: url.to_string(),
        }
    } else if err.is_builder() {
        FetchError::InvalidUrl {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let not_found = FetchError::HttpStatus {
            url: "http://x".into(),
            status: StatusCode::NOT_FOUND,
        };
        let unavailable = FetchError::HttpStatus {
            url: "http://x".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        let redirects = FetchError::TooManyRedirects {
            url: "http://x".into(),
        };
        assert!(!not_found.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!redirects.is_retryable());
        assert_eq!(redirects.kind(), "too_many_redirects");
    }

    #[tokio::test]
    async fn malformed_url_is_invalid_not_network() {
        let fetcher = PageFetcher::new(FetchSettings::default()).unwrap();
        let err = fetcher.fetch("http://exa mple.com/").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn non_http_scheme_is_invalid() {
        let fetcher = PageFetcher::new(FetchSettings::default()).unwrap();
        let err = fetcher.fetch("ftp://example.com/about").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(err.url(), "ftp://example.com/about");
    }
}
