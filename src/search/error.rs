//! Search-backend error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for search backend operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while talking to the search backend.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("search request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("search backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the backend.
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("failed to decode search response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request was cancelled before it completed.
    #[error("search request cancelled")]
    Cancelled,

    /// The run's deadline elapsed while the request was in flight.
    #[error("search deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// An in-memory executor had no canned answer for the request.
    #[error("no canned response for {0}")]
    NoCannedResponse(String),
}

impl SearchError {
    /// Check if this error came from the cancellation/deadline guard.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded(_))
    }

    /// Check if a caller could reasonably retry the request.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err)
    }
}
