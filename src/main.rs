use anyhow::{Context, Result};
use clap::Parser;
use contact_merge::config::{FieldPolicy, MergeConfig, RunPaths, DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_FILE};
use contact_merge::harmonize::SchemaHarmonizer;
use contact_merge::llm::OllamaClient;
use contact_merge::orchestrator::MergeOrchestrator;
use contact_merge::pipeline::run_pipeline;
use itertools::Itertools;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contact-merge")]
#[command(about = "Deduplicate contact CSVs, merging duplicate groups with an LLM")]
#[command(version)]
struct Args {
    /// Directory holding the source CSV files
    #[arg(short, long, default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Merged output CSV
    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// Generation endpoint (or set MERGE_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Model identifier (or set MERGE_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Per-request timeout in seconds (or set MERGE_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Stop merging after this many successful merges (or set MERGE_MAX_GROUPS)
    #[arg(long)]
    max_groups: Option<usize>,

    /// trust | restrict-to-input (or set MERGE_FIELD_POLICY)
    #[arg(long)]
    field_policy: Option<FieldPolicy>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn merge_config(&self) -> Result<MergeConfig> {
        let mut config = MergeConfig::from_env()?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if self.max_groups.is_some() {
            config.max_groups = self.max_groups;
        }
        if let Some(policy) = self.field_policy {
            config.field_policy = policy;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.merge_config().context("Invalid configuration")?;
    info!("Using model {} at {}", config.model, config.endpoint);

    let client = OllamaClient::new(&config)?;
    let orchestrator = MergeOrchestrator::new(Box::new(client), config);
    let paths = RunPaths {
        input_dir: args.input_dir.clone(),
        output_file: args.output.clone(),
    };

    let summary = run_pipeline(&paths, &SchemaHarmonizer::new(), &orchestrator)
        .await
        .with_context(|| format!("Merge run failed writing {:?}", paths.output_file))?;

    if !summary.source_failures.is_empty() {
        warn!(
            "Skipped {} unreadable source(s): {}",
            summary.source_failures.len(),
            summary.source_failures.iter().map(|f| f.path.display()).join(", ")
        );
    }

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&summary.report)?;
        std::fs::write(report_path, json).with_context(|| format!("Failed to write report {:?}", report_path))?;
        info!("Wrote run report to {:?}", report_path);
    }

    info!("Done. Wrote {} rows to {:?}", summary.rows_written, paths.output_file);
    Ok(())
}
