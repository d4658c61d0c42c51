//! Shared surface of the public registries (EPO, Companies House).

use async_trait::async_trait;
use inet_http::HttpError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which role the search term plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    /// Company or organisation.
    Applicant,
    /// Natural person.
    Inventor,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::Applicant => "applicant",
            QueryKind::Inventor => "inventor",
        })
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "applicant" | "company" => Ok(QueryKind::Applicant),
            "inventor" | "person" => Ok(QueryKind::Inventor),
            other => Err(format!("unknown query kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryQuery {
    pub kind: QueryKind,
    pub term: String,
}

impl RegistryQuery {
    pub fn applicant(term: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Applicant,
            term: term.into(),
        }
    }

    pub fn inventor(term: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Inventor,
            term: term.into(),
        }
    }
}

/// Inclusive, 1-based window of results. Only [`ResultRange::new`] and
/// `Default` build one, so `1 <= begin <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultRange {
    begin: u32,
    end: u32,
}

impl Default for ResultRange {
    fn default() -> Self {
        Self { begin: 1, end: 25 }
    }
}

impl ResultRange {
    /// `None` unless `1 <= begin <= end`.
    pub fn new(begin: u32, end: u32) -> Option<Self> {
        (begin >= 1 && begin <= end).then_some(Self { begin, end })
    }

    pub fn begin(&self) -> u32 {
        self.begin
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of results the window asks for.
    pub fn count(&self) -> u32 {
        self.end.saturating_sub(self.begin).saturating_add(1)
    }

    /// Zero-based index of the first result.
    pub fn offset(&self) -> u32 {
        self.begin.saturating_sub(1)
    }
}

impl fmt::Display for ResultRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Which registry a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryKind {
    Epo,
    CompaniesHouse,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistryKind::Epo => "epo",
            RegistryKind::CompaniesHouse => "companies-house",
        })
    }
}

impl FromStr for RegistryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "epo" | "ops" => Ok(RegistryKind::Epo),
            "companies-house" | "ch" => Ok(RegistryKind::CompaniesHouse),
            other => Err(format!("unknown registry: {other}")),
        }
    }
}

/// A searchable public registry. Replies are passed through as raw JSON.
#[async_trait]
pub trait RegistrySearch: Send + Sync {
    async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: RegistrySearch + ?Sized> RegistrySearch for Arc<S> {
    async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError> {
        (**self).search(query, range).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub async fn applicant_search<S: RegistrySearch + ?Sized>(
    registry: &S,
    term: &str,
    range: ResultRange,
) -> Result<Value, HttpError> {
    registry.search(&RegistryQuery::applicant(term), range).await
}

pub async fn inventor_search<S: RegistrySearch + ?Sized>(
    registry: &S,
    term: &str,
    range: ResultRange,
) -> Result<Value, HttpError> {
    registry.search(&RegistryQuery::inventor(term), range).await
}
