//! In-memory QueryExecutor with canned answers.
//!
//! Used for offline runs against a saved `_search` response and by the
//! test suites. Count answers are keyed by [`CountFilter::key`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::aggregation::SearchResponse;
use super::error::{SearchError, SearchResult};
use super::executor::QueryExecutor;
use super::filter::CountFilter;

/// QueryExecutor backed by canned responses.
#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    search_response: Option<Value>,
    counts: HashMap<String, (u64, u64)>,
    default_counts: Option<(u64, u64)>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    count_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryExecutor {
    /// Create an executor with no canned answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `search` with this full response body.
    pub fn with_search_response(mut self, response: Value) -> Self {
        self.search_response = Some(response);
        self
    }

    /// Answer counts for `key` with (qualifying, total).
    pub fn with_counts(mut self, key: impl Into<String>, qualifying: u64, total: u64) -> Self {
        self.counts.insert(key.into(), (qualifying, total));
        self
    }

    /// Answer counts for any key without its own entry.
    pub fn with_default_counts(mut self, qualifying: u64, total: u64) -> Self {
        self.default_counts = Some((qualifying, total));
        self
    }

    /// Fail every count for `key`.
    pub fn with_failure(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Delay every count for `key`.
    pub fn with_delay(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(key.into(), delay);
        self
    }

    /// Number of `count` calls received so far.
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `count` calls that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer_count(&self, filter: &CountFilter) -> SearchResult<u64> {
        let key = filter.key();

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.failing.contains(&key) {
            return Err(SearchError::Status {
                status: 500,
                body: format!("count failed for {}", key),
            });
        }

        let (qualifying, total) = self
            .counts
            .get(&key)
            .copied()
            .or(self.default_counts)
            .ok_or_else(|| SearchError::NoCannedResponse(format!("count {}", key)))?;

        Ok(if filter.is_qualified() {
            qualifying
        } else {
            total
        })
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn search(&self, _body: &Value) -> SearchResult<SearchResponse> {
        let response = self
            .search_response
            .clone()
            .ok_or_else(|| SearchError::NoCannedResponse("search".to_string()))?;
        serde_json::from_value(response).map_err(SearchError::Decode)
    }

    async fn count(&self, filter: &CountFilter) -> SearchResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.answer_count(filter).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
