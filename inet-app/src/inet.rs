//! The enrichment run: one dataset, the scraper, registry clients and matchers,
//! all wired from [`InetConfig`].
use inet_common::{EntityKind, InetError, Result, SourceKind};
use inet_config::{InetConfig, ScraperSettings, SelectorSpec, SourcesConfig};
use inet_data::Dataset;
use inet_http::{FetchSettings, PageFetcher};
use inet_sources::{
    build_registry_stack, CompaniesHouseClient, MatchOutcome, MatcherSet, OpsClient, RegistryKind,
    RegistryQuery, RegistrySearch, ResultRange,
};
use inet_web::{HtmlScraper, LinkSelector, ScrapeRequest, ScrapeResult, SelectorError, TextFilter};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Scrape outcome for one dataset row.
#[derive(Debug, Clone)]
pub struct RowScrape {
    pub row_index: usize,
    pub url: String,
    pub result: Option<ScrapeResult>,
}

pub struct Inet {
    dataset: Dataset,
    scraper: HtmlScraper,
    template: ScrapeRequest,
    registries: HashMap<RegistryKind, Arc<dyn RegistrySearch>>,
    matchers: MatcherSet,
}

impl Inet {
    pub fn new(dataset: Dataset, config: &InetConfig) -> Result<Self> {
        let (scraper, template) = build_scraper(&config.scraper)?;
        let registries = build_registries(&config.sources)?;
        tracing::info!(
            rows = dataset.len(),
            registries = ?registries.keys().collect::<Vec<_>>(),
            max_concurrency = scraper.max_concurrency(),
            "inet.ready"
        );
        Ok(Self {
            dataset,
            scraper,
            template,
            registries,
            matchers: MatcherSet::default(),
        })
    }

    pub fn with_matchers(mut self, matchers: MatcherSet) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// A request for `url` carrying the configured flags and selectors.
    pub fn request_for(&self, url: &str) -> ScrapeRequest {
        ScrapeRequest {
            url: url.to_string(),
            ..self.template.clone()
        }
    }

    /// About pages and Twitter links for one URL, `None` when the page
    /// itself could not be fetched or parsed.
    pub async fn scrape_html(&self, url: &str) -> Option<ScrapeResult> {
        self.scrape(&self.request_for(url)).await
    }

    pub async fn scrape(&self, request: &ScrapeRequest) -> Option<ScrapeResult> {
        self.scraper.scrape(request).await
    }

    /// Scrape the URL in `url_column` of every row, one row at a time.
    /// Rows without a URL are skipped.
    pub async fn scrape_rows(&self, url_column: &str) -> Vec<RowScrape> {
        let mut out = Vec::new();
        for (row_index, row) in self.dataset.rows().iter().enumerate() {
            let Some(url) = row.get(url_column).map(str::trim).filter(|u| !u.is_empty()) else {
                tracing::debug!(row_index, column = url_column, "inet.row.no_url");
                continue;
            };
            let result = self.scrape_html(url).await;
            out.push(RowScrape {
                row_index,
                url: url.to_string(),
                result,
            });
        }
        out
    }

    pub async fn match_twitter_to_emails(&self) -> MatchOutcome {
        self.run_matcher(EntityKind::Company, SourceKind::Social).await
    }

    pub async fn match_companies_to_ch(&self) -> MatchOutcome {
        self.run_matcher(EntityKind::Company, SourceKind::CompaniesRegistry)
            .await
    }

    pub async fn match_people_to_ch(&self) -> MatchOutcome {
        self.run_matcher(EntityKind::Person, SourceKind::CompaniesRegistry)
            .await
    }

    pub async fn match_companies_to_epo(&self) -> MatchOutcome {
        self.run_matcher(EntityKind::Company, SourceKind::PatentRegistry)
            .await
    }

    pub async fn match_people_to_epo(&self) -> MatchOutcome {
        self.run_matcher(EntityKind::Person, SourceKind::PatentRegistry)
            .await
    }

    pub async fn run_matcher(&self, entity: EntityKind, source: SourceKind) -> MatchOutcome {
        self.matchers
            .match_rows(entity, source, self.dataset.rows())
            .await
    }

    /// The configured client stack for `kind`, if credentials were given.
    pub fn registry(&self, kind: RegistryKind) -> Option<Arc<dyn RegistrySearch>> {
        self.registries.get(&kind).cloned()
    }

    /// Run `query` against the `kind` registry. An unconfigured registry is a
    /// config error; an upstream failure is a source error.
    pub async fn search(
        &self,
        kind: RegistryKind,
        query: &RegistryQuery,
        range: ResultRange,
    ) -> Result<Value> {
        let client = self
            .registries
            .get(&kind)
            .ok_or_else(|| InetError::config(config_key(kind), "credentials are not configured"))?;
        client
            .search(query, range)
            .await
            .map_err(|e| InetError::upstream(client.name(), e))
    }
}

fn config_key(kind: RegistryKind) -> &'static str {
    match kind {
        RegistryKind::Epo => "sources.epo",
        RegistryKind::CompaniesHouse => "sources.companies_house",
    }
}

fn build_scraper(settings: &ScraperSettings) -> Result<(HtmlScraper, ScrapeRequest)> {
    let fetcher = PageFetcher::new(FetchSettings {
        timeout: Duration::from_secs(settings.timeout_secs),
        max_redirects: settings.max_redirects,
        user_agent: settings.user_agent.clone(),
        ..FetchSettings::default()
    })
    .map_err(|e| InetError::config("scraper", e))?;
    let scraper = HtmlScraper::new(fetcher).with_max_concurrency(settings.max_concurrency);

    let mut template = ScrapeRequest::new("")
        .about(settings.about)
        .twitter_handles(settings.twitter_handles)
        .resolve_relative(settings.resolve_relative);
    if let Some(spec) = &settings.about_selector {
        let selector =
            link_selector(spec).map_err(|e| InetError::config("scraper.about_selector", e))?;
        template = template.about_selector(selector);
    }
    if let Some(spec) = &settings.twitter_selector {
        let selector =
            link_selector(spec).map_err(|e| InetError::config("scraper.twitter_selector", e))?;
        template = template.twitter_selector(selector);
    }
    Ok((scraper, template))
}

pub fn link_selector(spec: &SelectorSpec) -> std::result::Result<LinkSelector, SelectorError> {
    let mut selector = LinkSelector::css(&spec.css)?.with_attr(&spec.attr)?;
    if let Some(text) = &spec.text {
        let filter = if text.ignore_case {
            TextFilter::contains_ignore_case(&text.needle)
        } else if text.from.is_empty() {
            TextFilter::contains(&text.needle)
        } else {
            TextFilter::translate_contains(&text.from, &text.to, &text.needle)
        };
        selector = selector.with_text(filter);
    }
    Ok(selector)
}

fn build_registries(
    sources: &SourcesConfig,
) -> Result<HashMap<RegistryKind, Arc<dyn RegistrySearch>>> {
    let mut out: HashMap<RegistryKind, Arc<dyn RegistrySearch>> = HashMap::new();

    if let Some(epo) = &sources.epo {
        match epo.credentials() {
            Some((key, secret)) => {
                let client = match &epo.base_url {
                    Some(base) => OpsClient::with_base(key, secret, base),
                    None => OpsClient::new(key, secret),
                }
                .map_err(|e| InetError::config(config_key(RegistryKind::Epo), e))?;
                out.insert(
                    RegistryKind::Epo,
                    build_registry_stack(client, epo.cache, Duration::from_millis(epo.min_interval_ms)),
                );
            }
            None => tracing::warn!("sources.epo present but key/secret unset; EPO disabled"),
        }
    }

    if let Some(ch) = &sources.companies_house {
        match ch.api_key() {
            Some(api_key) => {
                let client = match &ch.base_url {
                    Some(base) => CompaniesHouseClient::with_base(api_key, base),
                    None => CompaniesHouseClient::new(api_key),
                }
                .map_err(|e| InetError::config(config_key(RegistryKind::CompaniesHouse), e))?;
                out.insert(
                    RegistryKind::CompaniesHouse,
                    build_registry_stack(client, ch.cache, Duration::from_millis(ch.min_interval_ms)),
                );
            }
            None => tracing::warn!("sources.companies_house present but api_key unset; disabled"),
        }
    }

    Ok(out)
}

/// JSON view of a [`ScrapeResult`]; page bodies are decoded lossily.
#[derive(Debug, Serialize)]
pub struct ScrapeReport {
    pub about_pages: Vec<AboutPage>,
    pub twitter_links: Vec<String>,
    pub twitter_handles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AboutPage {
    pub bytes: usize,
    pub text: String,
}

impl From<&ScrapeResult> for ScrapeReport {
    fn from(result: &ScrapeResult) -> Self {
        Self {
            about_pages: result
                .about_pages
                .iter()
                .map(|body| AboutPage {
                    bytes: body.len(),
                    text: String::from_utf8_lossy(body).into_owned(),
                })
                .collect(),
            twitter_links: result.twitter_links.clone(),
            twitter_handles: result.twitter_handles(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RowReport {
    pub row_index: usize,
    pub url: String,
    pub result: Option<ScrapeReport>,
}

impl From<&RowScrape> for RowReport {
    fn from(row: &RowScrape) -> Self {
        Self {
            row_index: row.row_index,
            url: row.url.clone(),
            result: row.result.as_ref().map(ScrapeReport::from),
        }
    }
}
