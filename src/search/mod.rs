//! Search backend module.
//!
//! This module provides the query-executor capability the pipeline runs
//! against, the aggregation tree model parsed from search responses, and
//! count-filter construction for per-row enrichment.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        QueryExecutor                            │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  search(body) -> SearchResponse -> AggNode tree           │  │
//! │  │  count(CountFilter) -> u64                                │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │         │                                   │                   │
//! │         ▼                                   ▼                   │
//! │  ElasticsearchExecutor (HTTP)        InMemoryExecutor (canned)  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               ▲
//!                               │ every call wrapped by
//!                         CallGuard (cancel token + deadline)
//! ```

mod aggregation;
mod elastic;
mod error;
mod executor;
mod filter;
mod guard;
mod memory;

pub use aggregation::{AggNode, SearchResponse, ShapeError};
pub use elastic::{ElasticsearchExecutor, DEFAULT_TIMEOUT_SECS};
pub use error::{SearchError, SearchResult};
pub use executor::QueryExecutor;
pub use filter::{CountFilter, TermMatch};
pub use guard::CallGuard;
pub use memory::InMemoryExecutor;
