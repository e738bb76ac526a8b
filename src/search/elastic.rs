//! Elasticsearch-backed QueryExecutor.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::aggregation::SearchResponse;
use super::error::{SearchError, SearchResult};
use super::executor::QueryExecutor;
use super::filter::CountFilter;

/// Default timeout for a single HTTP request (30 seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Body of a `_count` response.
#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// QueryExecutor that talks to an Elasticsearch index over HTTP.
///
/// The underlying `reqwest::Client` pools connections and is safe to share
/// across the concurrent count requests of the enrichment stage.
///
/// # Example
///
/// ```ignore
/// use aggreport::search::ElasticsearchExecutor;
///
/// let executor = ElasticsearchExecutor::new(
///     "http://elasticsearch:9200",
///     "trials",
///     Duration::from_secs(30),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct ElasticsearchExecutor {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticsearchExecutor {
    /// Create an executor for one index.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server URL, e.g. `http://elasticsearch:9200`.
    /// * `index` - Index (or alias) to query.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        index: impl Into<String>,
        timeout: Duration,
    ) -> SearchResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            index: index.into(),
        })
    }

    /// The index this executor queries.
    pub fn index(&self) -> &str {
        &self.index
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.index,
            action
        )
    }

    async fn post<R: DeserializeOwned>(&self, action: &str, body: &Value) -> SearchResult<R> {
        let url = self.endpoint(action);
        debug!(%url, "posting search request");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(SearchError::Decode)
    }
}

#[async_trait]
impl QueryExecutor for ElasticsearchExecutor {
    async fn search(&self, body: &Value) -> SearchResult<SearchResponse> {
        self.post("_search", body).await
    }

    async fn count(&self, filter: &CountFilter) -> SearchResult<u64> {
        let response: CountResponse = self.post("_count", &filter.to_body()).await?;
        Ok(response.count)
    }
}
