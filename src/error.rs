//! Report-level error taxonomy.
//!
//! Every pipeline stage fails with one of these variants; the originating
//! cause is kept as the error source.

use thiserror::Error;

use crate::config::SettingsError;
use crate::lookup::LookupError;
use crate::search::{SearchError, ShapeError};
use crate::workbook::{OutputError, WorkbookError};

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that abort a report run.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Unknown report kind, missing query definition, or unusable settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The primary search request failed.
    #[error("query execution failed: {0}")]
    QueryExecution(#[source] SearchError),

    /// The search succeeded but the expected aggregation is missing or empty.
    #[error("unexpected aggregation shape for '{aggregation}': {source}")]
    AggregationShape {
        aggregation: String,
        #[source]
        source: ShapeError,
    },

    /// A per-row count query failed.
    #[error("enrichment failed for row '{key}': {source}")]
    Enrichment {
        key: String,
        #[source]
        source: SearchError,
    },

    /// The workbook was assembled out of order or with malformed rows.
    #[error("workbook build failed: {0}")]
    Build(#[from] WorkbookError),

    /// Writing the workbook failed.
    #[error("output failed: {0}")]
    Output(#[from] OutputError),

    /// The lookup table could not be loaded.
    #[error("lookup table failed to load: {0}")]
    Lookup(#[from] LookupError),
}

impl ReportError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if the run was stopped by cancellation or its deadline.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::QueryExecution(err) | Self::Enrichment { source: err, .. } => err.is_cancelled(),
            _ => false,
        }
    }
}

impl From<SearchError> for ReportError {
    fn from(err: SearchError) -> Self {
        Self::QueryExecution(err)
    }
}

impl From<SettingsError> for ReportError {
    fn from(err: SettingsError) -> Self {
        Self::Configuration(err.to_string())
    }
}
