//! QueryExecutor trait definition.
//!
//! The QueryExecutor trait abstracts over the search backend. The pipeline
//! only ever issues two kinds of request: one aggregation search per run and
//! a count per enriched row.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::aggregation::SearchResponse;
use super::error::SearchResult;
use super::filter::CountFilter;

/// Capability to run queries against the search backend.
///
/// Implementations must tolerate concurrent in-flight requests: the
/// enrichment stage issues many `count` calls at once.
///
/// # Example
///
/// ```ignore
/// use aggreport::search::{CountFilter, QueryExecutor};
///
/// async fn example(executor: &impl QueryExecutor) -> SearchResult<()> {
///     let response = executor.search(&body).await?;
///     let tree = response.aggregation("interventions")?;
///
///     let filter = CountFilter::nested("biomarkers")
///         .term("biomarkers.nci_thesaurus_concept_id", "C1234");
///     let total = executor.count(&filter).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run an aggregation search with the given request body.
    async fn search(&self, body: &Value) -> SearchResult<SearchResponse>;

    /// Count documents matching a filter.
    async fn count(&self, filter: &CountFilter) -> SearchResult<u64>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn search(&self, body: &Value) -> SearchResult<SearchResponse> {
        (**self).search(body).await
    }

    async fn count(&self, filter: &CountFilter) -> SearchResult<u64> {
        (**self).count(filter).await
    }
}
