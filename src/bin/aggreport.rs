//! aggreport CLI - run aggregation reports against a trial search index
//!
//! Usage:
//!   aggreport run <report> --output <file> [--index <index>] [--server <host>] [--port <port>]
//!   aggreport list
//!
//! Examples:
//!   aggreport run interventions-by-type --index trials --output interventions.xlsx
//!   aggreport run interventions-by-type-with-pdq --index trials --lookup pdq_ncit.csv -o pdq.xlsx
//!   aggreport run inclusion-biomarkers --server https://search.example.org -i trials -o bio.csv

use aggreport::config::Settings;
use aggreport::error::{ReportError, ReportResult};
use aggreport::lookup::LookupTable;
use aggreport::pipeline::QueryPipeline;
use aggreport::report::{ReportDefinition, ReportKind};
use aggreport::search::ElasticsearchExecutor;
use aggreport::workbook::sink_for_path;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aggreport")]
#[command(about = "aggreport - Aggregation reports over a clinical-trial search index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report and write it to a spreadsheet
    Run(RunArgs),

    /// List the available reports
    List,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Report to run
    report: ReportArg,

    /// Output file (.xlsx, or .csv for the first sheet only)
    #[arg(short, long)]
    output: PathBuf,

    /// Config file (defaults to AGGREPORT_CONFIG, ./aggreport.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Search server host, or a base URL with scheme
    #[arg(short, long)]
    server: Option<String>,

    /// Search node port
    #[arg(short, long)]
    port: Option<u16>,

    /// Index or alias to query
    #[arg(short, long)]
    index: Option<String>,

    /// PDQ to NCIt mapping file
    #[arg(short, long)]
    lookup: Option<String>,

    /// Rows enriched at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Budget in seconds for every backend call of the run
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportArg {
    InterventionsByType,
    InterventionsByTypeWithPdq,
    ViewableInterventionsByType,
    InclusionBiomarkers,
}

impl From<ReportArg> for ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::InterventionsByType => ReportKind::InterventionsByType,
            ReportArg::InterventionsByTypeWithPdq => ReportKind::InterventionsByTypeWithPdq,
            ReportArg::ViewableInterventionsByType => ReportKind::ViewableInterventionsByType,
            ReportArg::InclusionBiomarkers => ReportKind::InclusionBiomarkers,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::List => cmd_list(),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_run(args: RunArgs) -> ExitCode {
    init_tracing(args.verbose);

    let kind = ReportKind::from(args.report);
    let (pipeline, report) = match prepare(kind, &args) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let token = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling report run");
            token.cancel();
        }
    });

    match pipeline.run(report.as_ref(), &args.output).await {
        Ok(summary) => {
            println!(
                "Wrote {} rows to sheet '{}' in {} ({:.1}s)",
                summary.rows,
                summary.sheet,
                summary.destination.display(),
                summary.elapsed.as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("Error: {}", failure);
            ExitCode::FAILURE
        }
    }
}

/// Resolve settings and build the pipeline and report for one run.
fn prepare(
    kind: ReportKind,
    args: &RunArgs,
) -> ReportResult<(QueryPipeline, Box<dyn ReportDefinition>)> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };

    if let Some(server) = &args.server {
        settings.search.server = server.clone();
    }
    if let Some(port) = args.port {
        settings.search.port = port;
    }
    if let Some(index) = &args.index {
        settings.search.index = index.clone();
    }
    if let Some(lookup) = &args.lookup {
        settings.lookup.path = Some(lookup.clone());
    }
    if let Some(concurrency) = args.concurrency {
        settings.enrichment.concurrency = concurrency;
    }
    if let Some(deadline) = args.deadline_secs {
        settings.pipeline.deadline_secs = Some(deadline);
    }
    settings.validate()?;

    let lookup = match (kind.needs_lookup(), settings.lookup.resolved_path()?) {
        (true, Some(path)) => {
            let table = LookupTable::load(&path, settings.lookup.layout()?)?;
            Some(Arc::new(table))
        }
        _ => None,
    };
    let report = kind.definition(lookup)?;

    let url = settings.search.resolved_url()?;
    let index = settings.search.resolved_index()?;
    info!(url = %url, index = %index, report = %kind, "resolved search backend");

    let executor = ElasticsearchExecutor::new(url, index, settings.search.timeout())
        .map_err(|e| ReportError::configuration(format!("cannot build search client: {}", e)))?;

    let pipeline = QueryPipeline::new(Arc::new(executor), sink_for_path(&args.output))
        .with_options(settings.pipeline_options());

    Ok((pipeline, report))
}

fn cmd_list() -> ExitCode {
    // Any table satisfies the PDQ report here; only its layout is printed.
    let placeholder = Arc::new(LookupTable::default());

    for kind in ReportKind::ALL {
        let definition = match kind.definition(Some(placeholder.clone())) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        println!("{}", kind);
        println!("  {}", kind.description());
        println!("  sheet:  {}", definition.sheet_name());
        println!("  header: {}", definition.header().join(", "));
        if kind.needs_lookup() {
            println!("  requires: --lookup <csv>");
        }
        println!();
    }

    ExitCode::SUCCESS
}
