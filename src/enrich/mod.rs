//! Per-row count enrichment.
//!
//! Each candidate row gets two derived columns from two count queries over
//! its key: the count narrowed by the plan's qualifying clauses, then the
//! unqualified count.
//!
//! ```text
//!  rows ──enumerate──► [row 0] [row 1] ... [row n]
//!                         │       │           │
//!                  buffer_unordered(concurrency)      two counts per row,
//!                         │       │           │       issued together
//!                         ▼       ▼           ▼
//!                  EnrichmentResult { row_index, derived }
//!                         │
//!                  sort by row_index ──► rows with derived columns appended
//! ```
//!
//! Results are re-associated by index, so the output order always matches
//! the input order no matter which counts finish first. The first failing
//! count aborts the whole batch and drops every outstanding request.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::error::{ReportError, ReportResult};
use crate::report::{CandidateRow, EnrichmentPlan};
use crate::search::{CallGuard, QueryExecutor};
use crate::workbook::{CellValue, Row};

/// Default number of rows enriched at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Derived counts for one row, tagged with the row's position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub row_index: usize,
    /// Qualifying count, then unqualified count.
    pub derived: [u64; 2],
}

/// Appends derived count columns to candidate rows.
#[derive(Debug, Clone, Copy)]
pub struct RowEnricher {
    concurrency: usize,
}

impl Default for RowEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl RowEnricher {
    /// Enrich at most `concurrency` rows at once. Zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Enrich every row, preserving input order.
    ///
    /// Fails with [`ReportError::Enrichment`] naming the first row whose
    /// count failed; no partial output is returned.
    pub async fn enrich(
        &self,
        executor: &dyn QueryExecutor,
        rows: Vec<CandidateRow>,
        plan: &EnrichmentPlan,
        guard: &CallGuard,
    ) -> ReportResult<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let row_count = rows.len();
        info!(
            rows = row_count,
            concurrency = self.concurrency,
            "enriching rows"
        );

        let mut results: Vec<EnrichmentResult> = stream::iter(rows.iter().enumerate())
            .map(|(row_index, row)| Self::count_row(executor, plan, guard, row_index, row))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        results.sort_by_key(|result| result.row_index);

        let enriched = rows
            .into_iter()
            .zip(results)
            .map(|(row, result)| {
                let mut cells = row.cells;
                cells.extend(result.derived.into_iter().map(CellValue::from));
                cells
            })
            .collect::<Vec<_>>();

        debug!(rows = enriched.len(), "enrichment complete");
        Ok(enriched)
    }

    async fn count_row(
        executor: &dyn QueryExecutor,
        plan: &EnrichmentPlan,
        guard: &CallGuard,
        row_index: usize,
        row: &CandidateRow,
    ) -> ReportResult<EnrichmentResult> {
        let all = row.key.count_filter();
        let qualifying = all.clone().qualified_by(plan.qualifying.clone());

        let (qualifying_count, all_count) = tokio::try_join!(
            guard.call(executor.count(&qualifying)),
            guard.call(executor.count(&all)),
        )
        .map_err(|source| ReportError::Enrichment {
            key: row.key.to_string(),
            source,
        })?;

        debug!(
            row = row_index,
            key = %row.key,
            qualifying = qualifying_count,
            all = all_count,
            "row counted"
        );

        Ok(EnrichmentResult {
            row_index,
            derived: [qualifying_count, all_count],
        })
    }
}
