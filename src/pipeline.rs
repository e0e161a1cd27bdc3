//! End-to-end run: input directory -> merged CSV

use crate::config::RunPaths;
use crate::error::Result;
use crate::harmonize::SchemaHarmonizer;
use crate::ingestion::{ensure_input_dir, load_directory, SourceFailure};
use crate::orchestrator::{MergeOrchestrator, MergeReport};
use crate::output::write_csv;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: MergeReport,
    pub source_failures: Vec<SourceFailure>,
    pub rows_written: usize,
}

/// Load every source, merge duplicates and write the output file.
///
/// Unreadable sources and failed merges are recorded in the summary; only an
/// unreadable input directory or a failed write is returned as an error.
pub async fn run_pipeline(
    paths: &RunPaths,
    harmonizer: &SchemaHarmonizer,
    orchestrator: &MergeOrchestrator,
) -> Result<RunSummary> {
    ensure_input_dir(&paths.input_dir)?;

    info!("Loading CSV files from {:?}...", paths.input_dir);
    let loaded = load_directory(&paths.input_dir, harmonizer)?;
    info!("Total loaded rows: {}", loaded.records.len());

    let outcome = orchestrator.run(loaded.records).await;
    let rows_written = write_csv(&outcome.table, &paths.output_file)?;

    Ok(RunSummary {
        report: outcome.report,
        source_failures: loaded.failures,
        rows_written,
    })
}
