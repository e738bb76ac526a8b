//! # aggreport
//!
//! Aggregation reports over a clinical-trial search index, written as
//! spreadsheets.
//!
//! ## Architecture
//!
//! A report runs one aggregation query, flattens the bucket tree into rows,
//! enriches each row with per-row counts, and writes a single-sheet workbook:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              ReportKind -> ReportDefinition             │
//! │     (query body, flattening strategy, sheet layout)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [QueryExecutor::search]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 AggNode (bucket tree)                   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [extract_rows]
//! ┌─────────────────────────────────────────────────────────┐
//! │        CandidateRow*  (+ LookupTable for PDQ ids)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [RowEnricher, QueryExecutor::count]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Workbook / Sheet (header + rows)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [OutputSink]
//!                     .xlsx / .csv
//! ```
//!
//! [`pipeline::QueryPipeline`] drives the stages in order.

pub mod config;
pub mod enrich;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod workbook;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{Settings, SettingsError};
    pub use crate::enrich::RowEnricher;
    pub use crate::error::{ReportError, ReportResult};
    pub use crate::lookup::{LookupLayout, LookupTable};
    pub use crate::pipeline::{
        PipelineFailure, PipelineOptions, PipelineState, QueryPipeline, RunSummary,
    };
    pub use crate::report::{ReportDefinition, ReportKind};
    pub use crate::search::{
        CallGuard, CountFilter, ElasticsearchExecutor, InMemoryExecutor, QueryExecutor,
    };
    pub use crate::workbook::{sink_for_path, CellValue, OutputSink, Workbook};
}
