//! Report pipeline.
//!
//! One `run` drives a report through every stage in order, awaiting each
//! before the next begins:
//!
//! ```text
//!  Idle ─► Querying ─► Flattening ─► Enriching ─► Building ─► Writing ─► Done
//!             │            │             │           │           │
//!             └────────────┴─────────────┴───────────┴───────────┴─► Failed
//! ```
//!
//! A failed run never reaches the sink, so no partial workbook is written.
//! Cancellation is rechecked before Building and before Writing, so a token
//! cancelled while the last counts finish still fails the run.
//! The pipeline keeps no state between runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::enrich::{RowEnricher, DEFAULT_CONCURRENCY};
use crate::error::{ReportError, ReportResult};
use crate::report::ReportDefinition;
use crate::search::{CallGuard, QueryExecutor};
use crate::workbook::{OutputResult, OutputSink, Row, Workbook};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Querying,
    Flattening,
    Enriching,
    Building,
    Writing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Querying => "querying",
            Self::Flattening => "flattening",
            Self::Enriching => "enriching",
            Self::Building => "building",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Rows enriched at once.
    pub concurrency: usize,
    /// Budget for every backend call of one run, measured from its start.
    pub deadline: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub state: PipelineState,
    pub sheet: String,
    /// Data rows written, header excluded.
    pub rows: usize,
    pub destination: PathBuf,
    pub elapsed: Duration,
}

/// A run that stopped before `Done`.
#[derive(Error, Debug)]
#[error("report run failed while {failed_in}: {error}")]
pub struct PipelineFailure {
    /// The stage that was active when the error occurred.
    pub failed_in: PipelineState,
    #[source]
    pub error: ReportError,
}

impl PipelineFailure {
    /// Always [`PipelineState::Failed`].
    pub fn state(&self) -> PipelineState {
        PipelineState::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancelled()
    }
}

/// Runs reports against one executor and one sink.
pub struct QueryPipeline {
    executor: Arc<dyn QueryExecutor>,
    sink: Arc<dyn OutputSink>,
    options: PipelineOptions,
    cancel: CancellationToken,
}

impl QueryPipeline {
    pub fn new(executor: Arc<dyn QueryExecutor>, sink: Box<dyn OutputSink>) -> Self {
        Self {
            executor,
            sink: Arc::from(sink),
            options: PipelineOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop runs when `cancel` is cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this pipeline's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run `report` and write the workbook to `destination`.
    pub async fn run(
        &self,
        report: &dyn ReportDefinition,
        destination: &Path,
    ) -> Result<RunSummary, PipelineFailure> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut run = Run {
            id: run_id,
            report: report.kind().name(),
            state: PipelineState::Idle,
        };

        let mut guard = CallGuard::new(self.cancel.clone());
        if let Some(budget) = self.options.deadline {
            guard = guard.with_deadline(budget);
        }

        info!(
            run_id = %run_id,
            report = run.report,
            destination = %destination.display(),
            "starting report run"
        );

        match self.stages(&mut run, report, destination, &guard).await {
            Ok(rows) => {
                run.advance(PipelineState::Done);
                let summary = RunSummary {
                    state: PipelineState::Done,
                    sheet: report.sheet_name().to_string(),
                    rows,
                    destination: destination.to_path_buf(),
                    elapsed: started.elapsed(),
                };
                info!(
                    run_id = %run_id,
                    rows = summary.rows,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "report run complete"
                );
                Ok(summary)
            }
            Err(error) => {
                let failed_in = run.state;
                warn!(
                    run_id = %run_id,
                    report = run.report,
                    stage = %failed_in,
                    error = %error,
                    "report run failed"
                );
                run.advance(PipelineState::Failed);
                Err(PipelineFailure { failed_in, error })
            }
        }
    }

    async fn stages(
        &self,
        run: &mut Run,
        report: &dyn ReportDefinition,
        destination: &Path,
        guard: &CallGuard,
    ) -> ReportResult<usize> {
        run.advance(PipelineState::Querying);
        let body = report.query_body();
        let response = guard.call(self.executor.search(&body)).await?;
        let aggregation = report.aggregation();
        let tree = response
            .aggregation(aggregation)
            .map_err(|source| ReportError::AggregationShape {
                aggregation: aggregation.to_string(),
                source,
            })?;

        run.advance(PipelineState::Flattening);
        let candidates = report.extract_rows(&tree);
        drop(tree);
        debug!(run_id = %run.id, rows = candidates.len(), "flattened aggregation");

        run.advance(PipelineState::Enriching);
        let rows: Vec<Row> = match report.enrichment() {
            Some(plan) => {
                RowEnricher::new(self.options.concurrency)
                    .enrich(self.executor.as_ref(), candidates, &plan, guard)
                    .await?
            }
            None => candidates.into_iter().map(|row| row.cells).collect(),
        };

        guard.check()?;
        run.advance(PipelineState::Building);
        let sheet = report.sheet_name();
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet)?;
        workbook.set_header(sheet, report.header())?;
        let row_count = rows.len();
        for row in rows {
            workbook.append_row(sheet, row)?;
        }
        if let Some(range) = workbook.sheet(sheet).and_then(|s| s.range()) {
            debug!(run_id = %run.id, sheet, range = %range, "workbook assembled");
        }

        guard.check()?;
        run.advance(PipelineState::Writing);
        self.write(workbook, destination).await?;

        Ok(row_count)
    }

    /// Hand the workbook to the sink on the blocking pool.
    async fn write(&self, workbook: Workbook, destination: &Path) -> OutputResult<()> {
        let sink = Arc::clone(&self.sink);
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || sink.write(&workbook, &destination)).await?
    }
}

/// Bookkeeping for one run.
struct Run {
    id: Uuid,
    report: &'static str,
    state: PipelineState,
}

impl Run {
    fn advance(&mut self, next: PipelineState) {
        debug!(
            run_id = %self.id,
            report = self.report,
            from = %self.state,
            to = %next,
            "pipeline transition"
        );
        self.state = next;
    }
}
