//! Cancellation and deadline guard for backend calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{SearchError, SearchResult};

/// Wraps every executor call of one pipeline run.
///
/// A call resolves with [`SearchError::Cancelled`] as soon as the token is
/// cancelled, or with [`SearchError::DeadlineExceeded`] once the run's
/// deadline passes, dropping the in-flight request future.
#[derive(Debug, Clone, Default)]
pub struct CallGuard {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    budget: Duration,
}

impl CallGuard {
    /// Guard calls with a cancellation token and no deadline.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
            budget: Duration::ZERO,
        }
    }

    /// Add a deadline `budget` from now.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self.budget = budget;
        self
    }

    /// Whether calls through this guard would fail immediately.
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Fail with the error a guarded call would raise right now, if any.
    ///
    /// Used between stages that make no backend call.
    pub fn check(&self) -> SearchResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(SearchError::DeadlineExceeded(self.budget))
            }
            _ => Ok(()),
        }
    }

    /// Run a backend call under the guard.
    pub async fn call<T, F>(&self, request: F) -> SearchResult<T>
    where
        F: Future<Output = SearchResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(SearchError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => {
                        Err(SearchError::DeadlineExceeded(self.budget))
                    }
                    result = request => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(SearchError::Cancelled),
                    result = request => result,
                }
            }
        }
    }
}
