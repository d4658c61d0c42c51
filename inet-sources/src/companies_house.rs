//! Companies House public data API client.
use async_trait::async_trait;
use inet_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde_json::Value;
use std::borrow::Cow;

use crate::registry::{QueryKind, RegistryQuery, RegistrySearch, ResultRange};

pub const DEFAULT_BASE: &str = "https://api.company-information.service.gov.uk/";

#[derive(Clone)]
pub struct CompaniesHouseClient {
    http: HttpClient,
    api_key: String,
}

impl CompaniesHouseClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, HttpError> {
        Self::with_base(api_key, DEFAULT_BASE)
    }

    pub fn with_base(api_key: impl Into<String>, base: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http: HttpClient::new(base)?,
            api_key: api_key.into(),
        })
    }

    /// Companies for applicants, officers for inventors.
    fn search_path(kind: QueryKind) -> &'static str {
        match kind {
            QueryKind::Applicant => "search/companies",
            QueryKind::Inventor => "search/officers",
        }
    }
}

#[async_trait]
impl RegistrySearch for CompaniesHouseClient {
    async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError> {
        let path = Self::search_path(query.kind);
        tracing::info!(path, term=%query.term, range=%range, "companies_house.search");
        self.http
            .get_json(
                path,
                RequestOpts {
                    // The key is the username; the password stays empty.
                    auth: Some(Auth::Basic {
                        username: &self.api_key,
                        password: None,
                    }),
                    query: Some(vec![
                        ("q", Cow::Borrowed(query.term.as_str())),
                        ("items_per_page", Cow::Owned(range.count().to_string())),
                        ("start_index", Cow::Owned(range.offset().to_string())),
                    ]),
                    ..Default::default()
                },
            )
            .await
    }

    fn name(&self) -> &str {
        "companies-house"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_selects_endpoint() {
        assert_eq!(
            CompaniesHouseClient::search_path(QueryKind::Applicant),
            "search/companies"
        );
        assert_eq!(
            CompaniesHouseClient::search_path(QueryKind::Inventor),
            "search/officers"
        );
    }

    #[test]
    fn bad_base_is_a_url_error() {
        assert!(matches!(
            CompaniesHouseClient::with_base("k", "not a url"),
            Err(HttpError::Url(_))
        ));
    }
}
