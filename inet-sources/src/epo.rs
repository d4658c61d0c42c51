//! EPO Open Patent Services (OPS) client.
//!
//! Authenticates with the OAuth client-credentials flow and caches the access
//! token until shortly before it expires. Searches go to the published-data
//! endpoint with a CQL query; the JSON reply is returned untouched.
use async_trait::async_trait;
use inet_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::registry::{QueryKind, RegistryQuery, RegistrySearch, ResultRange};

pub const DEFAULT_BASE: &str = "https://ops.epo.org/3.2/";
const TOKEN_PATH: &str = "auth/accesstoken";
const SEARCH_PATH: &str = "rest-services/published-data/search";
/// Refresh this long before the advertised expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(deserialize_with = "seconds_from_string_or_number")]
    expires_in: u64,
}

/// OPS sends `expires_in` as a quoted number.
fn seconds_from_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("expires_in out of range")),
        Value::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expires_in: unexpected {other}"
        ))),
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct OpsClient {
    http: HttpClient,
    key: String,
    secret: String,
    constituents: Option<String>,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl OpsClient {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self, HttpError> {
        Self::with_base(key, secret, DEFAULT_BASE)
    }

    /// Point the client at another OPS deployment (or a mock).
    pub fn with_base(
        key: impl Into<String>,
        secret: impl Into<String>,
        base: &str,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            http: HttpClient::new(base)?,
            key: key.into(),
            secret: secret.into(),
            constituents: None,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Ask for extra constituents (e.g. `biblio`) on every [`RegistrySearch`] call.
    pub fn with_constituents(mut self, constituents: impl Into<String>) -> Self {
        self.constituents = Some(constituents.into());
        self
    }

    /// A valid bearer token, fetching a new one when none is cached or it is
    /// about to expire.
    pub async fn access_token(&self) -> Result<String, HttpError> {
        if let Some(tok) = self.token.read().await.as_ref() {
            if Instant::now() < tok.expires_at {
                return Ok(tok.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(tok) = slot.as_ref() {
            if Instant::now() < tok.expires_at {
                return Ok(tok.value.clone());
            }
        }

        let resp: TokenResponse = self
            .http
            .post_form_json(
                TOKEN_PATH,
                &[("grant_type", "client_credentials")],
                RequestOpts {
                    auth: Some(Auth::Basic {
                        username: &self.key,
                        password: Some(&self.secret),
                    }),
                    ..Default::default()
                },
            )
            .await?;

        let ttl = Duration::from_secs(resp.expires_in).saturating_sub(TOKEN_SLACK);
        tracing::debug!(ttl_secs = ttl.as_secs(), "epo.token.refreshed");
        *slot = Some(CachedToken {
            value: resp.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(resp.access_token)
    }

    async fn forget_token(&self) {
        *self.token.write().await = None;
    }

    /// `GET rest-services/published-data/search[/<constituents>]?q=<cql>&Range=<b>-<e>`.
    ///
    /// A 401 drops the cached token and the request is tried once more with a
    /// fresh one.
    pub async fn published_data_search(
        &self,
        cql: &str,
        range: ResultRange,
        constituents: Option<&str>,
    ) -> Result<Value, HttpError> {
        let path = match constituents {
            Some(c) if !c.is_empty() => format!("{SEARCH_PATH}/{c}"),
            _ => SEARCH_PATH.to_string(),
        };

        match self.search_once(&path, cql, range).await {
            Err(HttpError::Api { status, .. }) if status == StatusCode::UNAUTHORIZED => {
                tracing::info!("epo.token.rejected");
                self.forget_token().await;
                self.search_once(&path, cql, range).await
            }
            other => other,
        }
    }

    async fn search_once(&self, path: &str, cql: &str, range: ResultRange) -> Result<Value, HttpError> {
        let token = self.access_token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        tracing::info!(cql, range=%range, "epo.search");
        self.http
            .get_json(
                path,
                RequestOpts {
                    auth: Some(Auth::Bearer(&token)),
                    headers: Some(headers),
                    query: Some(vec![
                        ("q", Cow::Borrowed(cql)),
                        ("Range", Cow::Owned(range.to_string())),
                    ]),
                    ..Default::default()
                },
            )
            .await
    }
}

/// CQL for a registry query: `pa=` for applicants, `in=` for inventors.
/// Multi-word terms are quoted so they stay one phrase.
pub fn cql_for(query: &RegistryQuery) -> String {
    let field = match query.kind {
        QueryKind::Applicant => "pa",
        QueryKind::Inventor => "in",
    };
    let term = query.term.trim();
    if term.contains(char::is_whitespace) && !term.starts_with('"') {
        format!("{field}=\"{}\"", term.replace('"', ""))
    } else {
        format!("{field}={term}")
    }
}

#[async_trait]
impl RegistrySearch for OpsClient {
    async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError> {
        self.published_data_search(&cql_for(query), range, self.constituents.as_deref())
            .await
    }

    fn name(&self) -> &str {
        "epo-ops"
    }
}
