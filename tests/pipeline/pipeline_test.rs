use aggreport::error::ReportError;
use aggreport::lookup::LookupTable;
use aggreport::pipeline::{PipelineOptions, PipelineState, QueryPipeline};
use aggreport::report::ReportKind;
use aggreport::search::{
    CountFilter, InMemoryExecutor, QueryExecutor, SearchError, SearchResponse, SearchResult,
    ShapeError,
};
use async_trait::async_trait;
use aggreport::workbook::{CellValue, CsvSink, OutputResult, OutputSink, Workbook};
use insta::assert_snapshot;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Keeps a copy of every workbook it is handed.
#[derive(Clone, Default)]
struct RecordingSink {
    written: Arc<Mutex<Vec<(Workbook, PathBuf)>>>,
}

impl RecordingSink {
    fn taken(&self) -> Vec<(Workbook, PathBuf)> {
        self.written.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingSink {
    fn write(&self, workbook: &Workbook, destination: &Path) -> OutputResult<()> {
        self.written
            .lock()
            .unwrap()
            .push((workbook.clone(), destination.to_path_buf()));
        Ok(())
    }
}

/// Notes the thread each write runs on.
#[derive(Clone, Default)]
struct ThreadSink {
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl OutputSink for ThreadSink {
    fn write(&self, _workbook: &Workbook, _destination: &Path) -> OutputResult<()> {
        self.threads.lock().unwrap().push(thread::current().id());
        Ok(())
    }
}

/// Answers like its inner executor but cancels `token` as the last
/// expected count request completes.
struct CancelOnLastCount {
    inner: InMemoryExecutor,
    token: CancellationToken,
    remaining: AtomicUsize,
}

#[async_trait]
impl QueryExecutor for CancelOnLastCount {
    async fn search(&self, body: &Value) -> SearchResult<SearchResponse> {
        self.inner.search(body).await
    }

    async fn count(&self, filter: &CountFilter) -> SearchResult<u64> {
        let result = self.inner.count(filter).await;
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.token.cancel();
        }
        result
    }
}

fn two_type_response() -> Value {
    json!({
        "aggregations": {
            "interventions": {
                "doc_count": 2,
                "arms.interventions.intervention_type": {
                    "buckets": [
                        {
                            "key": "drug",
                            "doc_count": 1,
                            "arms.interventions.intervention_name": {
                                "buckets": [ { "key": "aspirin", "doc_count": 1 } ]
                            }
                        },
                        {
                            "key": "biological",
                            "doc_count": 1,
                            "arms.interventions.intervention_name": {
                                "buckets": [ { "key": "vaccineX", "doc_count": 1 } ]
                            }
                        }
                    ]
                }
            }
        }
    })
}

fn texts(row: &[CellValue]) -> Vec<String> {
    row.iter().map(CellValue::to_string).collect()
}

#[tokio::test]
async fn test_end_to_end_interventions_by_type() {
    let executor = InMemoryExecutor::new()
        .with_search_response(two_type_response())
        .with_default_counts(3, 5);
    let sink = RecordingSink::default();
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(sink.clone()));
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    let summary = pipeline
        .run(report.as_ref(), Path::new("interventions.xlsx"))
        .await
        .unwrap();

    assert_eq!(summary.state, PipelineState::Done);
    assert_eq!(summary.sheet, "Interventions");
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.destination, PathBuf::from("interventions.xlsx"));

    let written = sink.taken();
    assert_eq!(written.len(), 1);
    let (workbook, destination) = &written[0];
    assert_eq!(destination, &PathBuf::from("interventions.xlsx"));
    assert_eq!(workbook.len(), 1);

    let sheet = workbook.sheet("Interventions").unwrap();
    assert_eq!(
        sheet.header(),
        [
            "arms.interventions.intervention_code",
            "arms.interventions.intervention_type",
            "arms.interventions.intervention_name",
            "Viewable Count",
            "All Count",
        ]
    );
    assert_eq!(texts(&sheet.rows()[0]), vec!["UNK", "drug", "aspirin", "3", "5"]);
    assert_eq!(
        texts(&sheet.rows()[1]),
        vec!["UNK", "biological", "vaccineX", "3", "5"]
    );
    assert_eq!(sheet.rows()[0][3], CellValue::Integer(3));
    assert_snapshot!(sheet.range().unwrap().to_string(), @"A1:E3");
}

#[tokio::test]
async fn test_end_to_end_csv_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interventions.csv");
    let executor = InMemoryExecutor::new()
        .with_search_response(two_type_response())
        .with_default_counts(3, 5);
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(CsvSink));
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    pipeline.run(report.as_ref(), &path).await.unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_snapshot!(content.trim_end(), @r"
    arms.interventions.intervention_code,arms.interventions.intervention_type,arms.interventions.intervention_name,Viewable Count,All Count
    UNK,drug,aspirin,3,5
    UNK,biological,vaccineX,3,5
    ");
}

#[tokio::test]
async fn test_empty_aggregation_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interventions.csv");
    let executor = InMemoryExecutor::new()
        .with_search_response(json!({ "aggregations": { "interventions": {} } }))
        .with_default_counts(3, 5);
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(CsvSink));
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    let failure = pipeline.run(report.as_ref(), &path).await.unwrap_err();

    assert_eq!(failure.state(), PipelineState::Failed);
    assert_eq!(failure.failed_in, PipelineState::Querying);
    match &failure.error {
        ReportError::AggregationShape {
            aggregation,
            source,
        } => {
            assert_eq!(aggregation, "interventions");
            assert_eq!(source, &ShapeError::Empty("interventions".to_string()));
        }
        other => panic!("expected aggregation shape error, got {:?}", other),
    }
    assert!(!path.exists());
}

#[tokio::test]
async fn test_missing_aggregations_fails() {
    let executor = InMemoryExecutor::new().with_search_response(json!({ "took": 3 }));
    let sink = RecordingSink::default();
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(sink.clone()));

    let failure = pipeline
        .run(&aggreport::report::InclusionBiomarkers, Path::new("bio.xlsx"))
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ReportError::AggregationShape {
            source: ShapeError::NoAggregations,
            ..
        }
    ));
    assert!(sink.taken().is_empty());
}

#[tokio::test]
async fn test_zero_rows_is_not_an_error() {
    let executor = InMemoryExecutor::new().with_search_response(json!({
        "aggregations": {
            "interventions": {
                "doc_count": 0,
                "arms.interventions.intervention_type": { "buckets": [] }
            }
        }
    }));
    let sink = RecordingSink::default();
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(sink.clone()));
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    let summary = pipeline
        .run(report.as_ref(), Path::new("empty.xlsx"))
        .await
        .unwrap();

    assert_eq!(summary.rows, 0);
    let written = sink.taken();
    let sheet = written[0].0.sheet("Interventions").unwrap();
    assert!(sheet.has_header());
    assert!(!sheet.has_data());
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interventions.csv");
    let token = CancellationToken::new();
    let executor = InMemoryExecutor::new()
        .with_search_response(two_type_response())
        .with_default_counts(3, 5);
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(CsvSink))
        .with_cancellation(token.clone());
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    token.cancel();
    let failure = pipeline.run(report.as_ref(), &path).await.unwrap_err();

    assert!(failure.is_cancelled());
    assert!(matches!(
        failure.error,
        ReportError::QueryExecution(SearchError::Cancelled)
    ));
    assert_eq!(failure.failed_in, PipelineState::Querying);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_cancel_during_last_count_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interventions.csv");
    let token = CancellationToken::new();
    let executor = CancelOnLastCount {
        inner: InMemoryExecutor::new()
            .with_search_response(two_type_response())
            .with_default_counts(3, 5),
        token: token.clone(),
        // two rows, two counts each
        remaining: AtomicUsize::new(4),
    };
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(CsvSink))
        .with_cancellation(token.clone());
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    let failure = pipeline.run(report.as_ref(), &path).await.unwrap_err();

    assert!(token.is_cancelled());
    assert!(failure.is_cancelled());
    assert_eq!(failure.state(), PipelineState::Failed);
    assert_eq!(failure.failed_in, PipelineState::Enriching);
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_sink_write_leaves_the_runtime_thread() {
    let sink = ThreadSink::default();
    let executor = InMemoryExecutor::new().with_search_response(two_type_response());
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(sink.clone()));
    let report = ReportKind::ViewableInterventionsByType
        .definition(None)
        .unwrap();

    pipeline
        .run(report.as_ref(), Path::new("viewable.xlsx"))
        .await
        .unwrap();

    let threads = sink.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], thread::current().id());
}

#[tokio::test]
async fn test_enrichment_failure_names_row() {
    let executor = InMemoryExecutor::new()
        .with_search_response(two_type_response())
        .with_default_counts(3, 5)
        .with_failure("biological/vaccineX");
    let sink = RecordingSink::default();
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(sink.clone()))
        .with_options(PipelineOptions {
            concurrency: 1,
            deadline: Some(Duration::from_secs(30)),
        });
    let report = ReportKind::InterventionsByType.definition(None).unwrap();

    let failure = pipeline
        .run(report.as_ref(), Path::new("interventions.xlsx"))
        .await
        .unwrap_err();

    assert_eq!(failure.failed_in, PipelineState::Enriching);
    assert!(matches!(
        &failure.error,
        ReportError::Enrichment { key, .. } if key == "biological/vaccineX"
    ));
    assert!(sink.taken().is_empty());
}

#[tokio::test]
async fn test_viewable_report_skips_enrichment() {
    let executor = Arc::new(
        InMemoryExecutor::new().with_search_response(json!({
            "aggregations": {
                "interventions": {
                    "doc_count": 9,
                    "arms.interventions.intervention_type": { "buckets": [ {
                        "key": "drug",
                        "doc_count": 9,
                        "arms.interventions.intervention_name": { "buckets": [
                            { "key": "aspirin", "doc_count": 9 }
                        ] }
                    } ] }
                }
            }
        })),
    );
    let sink = RecordingSink::default();
    let pipeline = QueryPipeline::new(executor.clone(), Box::new(sink.clone()));
    let report = ReportKind::ViewableInterventionsByType
        .definition(None)
        .unwrap();

    pipeline
        .run(report.as_ref(), Path::new("viewable.xlsx"))
        .await
        .unwrap();

    assert_eq!(executor.count_calls(), 0);
    let written = sink.taken();
    let sheet = written[0].0.sheet("Interventions").unwrap();
    assert_eq!(texts(&sheet.rows()[0]), vec!["drug", "aspirin", "9"]);
}

#[tokio::test]
async fn test_pdq_report_end_to_end() {
    let executor = InMemoryExecutor::new()
        .with_search_response(json!({
            "aggregations": {
                "interventions": {
                    "doc_count": 1,
                    "arms.interventions.intervention_type": { "buckets": [ {
                        "key": "drug",
                        "doc_count": 1,
                        "arms.interventions.intervention_name": { "buckets": [ {
                            "key": "aspirin",
                            "doc_count": 1,
                            "arms.interventions.intervention_code": { "buckets": [
                                { "key": "C287", "doc_count": 1 }
                            ] }
                        } ] }
                    } ] }
                }
            }
        }))
        .with_counts("drug/aspirin", 2, 7);
    let mut table = LookupTable::default();
    table.insert("CDR0000040279", "C287");
    let sink = RecordingSink::default();
    let pipeline = QueryPipeline::new(Arc::new(executor), Box::new(sink.clone()));
    let report = ReportKind::InterventionsByTypeWithPdq
        .definition(Some(Arc::new(table)))
        .unwrap();

    pipeline
        .run(report.as_ref(), Path::new("pdq.xlsx"))
        .await
        .unwrap();

    let written = sink.taken();
    let sheet = written[0].0.sheet("Interventions").unwrap();
    assert_eq!(
        texts(&sheet.rows()[0]),
        vec!["C287", "drug", "aspirin", "CDR0000040279", "2", "7"]
    );
    assert_snapshot!(sheet.range().unwrap().to_string(), @"A1:F2");
}
