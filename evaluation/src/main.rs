use anyhow::Result;
use clap::Parser;
use crumb_eval::{
    DatasetSource, EvalConfig, EvaluationRequest, Evaluator, HuggingFaceSource,
    LocalDatasetSource, MaxPMode, PassageIdFormat,
};
use dotenvy::dotenv;
use shared::telemetry::{self, TelemetryConfig};
use shared::utils::resolve_path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crumb-eval")]
#[command(about = "Evaluate a retrieval run against the CRUMB relevance judgments")]
struct Cli {
    /// Metrics to compute, e.g. nDCG@10 P@5 MRR. Defaults to the standard set.
    metrics: Vec<String>,

    /// JSONL run file
    #[arg(long)]
    run_path: PathBuf,

    /// Task name; inferred from the run file name when omitted
    #[arg(long)]
    task_name: Option<String>,

    /// Write the metrics as JSON to this file
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// MaxP mode: auto, true or false
    #[arg(long, default_value = "auto")]
    max_p: MaxPMode,

    /// Use the validation queries instead of the evaluation queries
    #[arg(long)]
    is_validation: bool,

    /// Evaluate against full-document judgments
    #[arg(long)]
    is_full_docs: bool,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read splits from a local directory instead of the datasets server
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Treat passage ids without a document separator as document ids
    #[arg(long)]
    lenient_doc_ids: bool,
}

fn build_source(config: &EvalConfig) -> Result<Arc<dyn DatasetSource>> {
    match &config.dataset_dir {
        Some(dir) => Ok(Arc::new(LocalDatasetSource::new(resolve_path(dir)?))),
        None => Ok(Arc::new(HuggingFaceSource::from_config(config)?)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let telemetry_config = TelemetryConfig::from_env("crumb-eval");
    telemetry::init_telemetry(telemetry_config)?;

    let config_path = cli.config.as_deref().map(resolve_path).transpose()?;
    let mut config = EvalConfig::load(config_path.as_deref())?;
    if cli.dataset_dir.is_some() {
        config.dataset_dir = cli.dataset_dir.clone();
    }

    let source = build_source(&config)?;
    info!("Reading judgments from {}", source.get_name());

    let passage_ids = if cli.lenient_doc_ids {
        PassageIdFormat::lenient()
    } else {
        PassageIdFormat::default()
    };
    let evaluator = Evaluator::new(source).with_passage_id_format(passage_ids);

    let mut request = EvaluationRequest::new(resolve_path(&cli.run_path)?)
        .with_max_p(cli.max_p)
        .validation(cli.is_validation)
        .full_docs(cli.is_full_docs);
    if let Some(task_name) = cli.task_name {
        request = request.with_task_name(task_name);
    }
    if let Some(output_path) = cli.output_path {
        request = request.with_output_path(output_path);
    }
    if !cli.metrics.is_empty() {
        request = request.with_metrics(cli.metrics);
    }

    evaluator.evaluate(&request).await?;

    Ok(())
}
