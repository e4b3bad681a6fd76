//! Catalog lookups and title matching
//!
//! Search results from all providers go through one matching predicate,
//! whether they are being narrowed to the candidates of a playback session
//! ([`MatchCriteria`]) or grouped for browsing ([`aggregate`]).

use crate::{
    types::{CandidateSource, ContentKind},
    Error, Result,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Search and detail collaborator
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// All candidates across providers for a query
    async fn search(&self, query: &str) -> Result<Vec<CandidateSource>>;

    /// One provider's entry
    async fn detail(&self, source: &str, id: &str) -> Result<CandidateSource>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CandidateSource>,
}

/// Catalog client for the `/api/search` and `/api/detail` endpoints
pub struct HttpCatalogApi {
    client: Client,
    base_url: Url,
}

impl HttpCatalogApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn with_client(base_url: Url, client: Client) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("invalid API base url: {}", e)))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<CandidateSource>> {
        let url = self.endpoint("api/search", &[("q", query.trim())])?;
        let response: SearchResponse = self.get_json(url).await?;
        debug!(results = response.results.len(), "Search finished");
        Ok(response.results)
    }

    #[instrument(skip(self))]
    async fn detail(&self, source: &str, id: &str) -> Result<CandidateSource> {
        let url = self.endpoint("api/detail", &[("source", source), ("id", id)])?;
        self.get_json(url).await
    }
}

/// Title form used for equality: whitespace removed, lowercased
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Filter narrowing search results to one logical title
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    /// `None` accepts every title
    pub title: Option<String>,
    pub year: Option<String>,
    pub kind: Option<ContentKind>,
}

impl MatchCriteria {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Criteria that only narrow by year and kind
    pub fn any_title() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: Option<String>) -> Self {
        self.year = year.filter(|y| !y.trim().is_empty());
        self
    }

    pub fn with_kind(mut self, kind: Option<ContentKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn matches(&self, candidate: &CandidateSource) -> bool {
        if let Some(title) = &self.title {
            if normalize_title(&candidate.title) != normalize_title(title) {
                return false;
            }
        }
        if let Some(year) = &self.year {
            if !candidate.year.eq_ignore_ascii_case(year.trim()) {
                return false;
            }
        }
        match self.kind {
            Some(kind) => ContentKind::from_episode_count(candidate.total_episodes()) == Some(kind),
            None => true,
        }
    }

    pub fn filter(&self, candidates: Vec<CandidateSource>) -> Vec<CandidateSource> {
        candidates.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// Grouping key of one logical title
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AggregateKey {
    pub title: String,
    pub year: String,
    pub kind: ContentKind,
}

impl AggregateKey {
    pub fn of(candidate: &CandidateSource) -> Self {
        let year = candidate.year.trim();
        Self {
            title: normalize_title(&candidate.title),
            year: if year.is_empty() { "unknown".to_string() } else { year.to_string() },
            kind: ContentKind::from_episode_count(candidate.total_episodes()).unwrap_or(ContentKind::Tv),
        }
    }
}

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.title, self.year, self.kind)
    }
}

/// Candidates of one logical title from several providers
#[derive(Debug, Clone, Serialize)]
pub struct SourceGroup {
    pub key: AggregateKey,
    pub sources: Vec<CandidateSource>,
}

impl SourceGroup {
    pub fn title(&self) -> &str {
        self.sources.first().map(|s| s.title.as_str()).unwrap_or_default()
    }
}

/// Group search results by title, year and kind.
///
/// Groups whose title contains the query come first, then newer years;
/// unknown years sort last.
pub fn aggregate(results: Vec<CandidateSource>, query: &str) -> Vec<SourceGroup> {
    let mut order: Vec<AggregateKey> = Vec::new();
    let mut groups: HashMap<AggregateKey, Vec<CandidateSource>> = HashMap::new();

    for candidate in results {
        let key = AggregateKey::of(&candidate);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(candidate);
    }

    let needle = normalize_title(query);
    let mut grouped: Vec<SourceGroup> = order
        .into_iter()
        .filter_map(|key| groups.remove(&key).map(|sources| SourceGroup { key, sources }))
        .collect();

    grouped.sort_by(|a, b| {
        let a_hit = normalize_title(a.title()).contains(&needle);
        let b_hit = normalize_title(b.title()).contains(&needle);
        match (a_hit, b_hit) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        match (a.key.year.as_str(), b.key.year.as_str()) {
            (a_year, b_year) if a_year == b_year => a.key.to_string().cmp(&b.key.to_string()),
            ("unknown", _) => Ordering::Greater,
            (_, "unknown") => Ordering::Less,
            (a_year, b_year) => b_year.cmp(a_year),
        }
    });

    grouped
}
