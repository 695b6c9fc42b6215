use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::datasets::DatasetSource;
use crate::error::{EvalError, Result};
use crate::evaluator::{classify_metrics, compute_metrics, MetricEngine, RankingMetrics};
use crate::max_p::{document_level_run, modify_run_for_max_p, PassageIdFormat};
use crate::qrels::{QrelLoader, QrelSets};
use crate::reporter::EvaluationReport;
use crate::run::load_run;
use crate::tasks::{Task, TaskRegistry};

pub const DEFAULT_METRICS: [&str; 9] = [
    "nDCG@10", "nDCG@5", "P@10", "P@5", "R@10", "MRR", "R@1000", "R@100", "MRR@10",
];

/// Requested MaxP behaviour before it is resolved against a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxPMode {
    /// On for MaxP tasks unless full documents were requested.
    #[default]
    Auto,
    Enabled,
    Disabled,
}

impl FromStr for MaxPMode {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(MaxPMode::Auto),
            "true" | "on" | "yes" | "1" => Ok(MaxPMode::Enabled),
            "false" | "off" | "no" | "0" => Ok(MaxPMode::Disabled),
            _ => Err(EvalError::InvalidMaxPMode(s.to_string())),
        }
    }
}

impl fmt::Display for MaxPMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxPMode::Auto => f.write_str("auto"),
            MaxPMode::Enabled => f.write_str("true"),
            MaxPMode::Disabled => f.write_str("false"),
        }
    }
}

impl From<bool> for MaxPMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            MaxPMode::Enabled
        } else {
            MaxPMode::Disabled
        }
    }
}

/// Decides whether MaxP applies. Explicitly enabling it fails for full
/// document runs and for tasks without MaxP support.
pub fn resolve_max_p(
    registry: &TaskRegistry,
    task: Task,
    mode: MaxPMode,
    is_full_docs: bool,
) -> Result<bool> {
    match mode {
        MaxPMode::Disabled => Ok(false),
        MaxPMode::Auto => Ok(!is_full_docs && registry.uses_max_p(task)),
        MaxPMode::Enabled => {
            if is_full_docs {
                return Err(EvalError::MaxPWithFullDocuments);
            }
            if !registry.uses_max_p(task) {
                let supported = registry
                    .max_p_tasks()
                    .iter()
                    .map(|task| task.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(EvalError::MaxPUnsupported {
                    task: task.to_string(),
                    supported,
                });
            }
            Ok(true)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub run_path: PathBuf,
    pub task_name: Option<String>,
    pub output_path: Option<PathBuf>,
    pub max_p: MaxPMode,
    /// `None` selects [`DEFAULT_METRICS`].
    pub metrics: Option<Vec<String>>,
    pub is_validation: bool,
    pub is_full_docs: bool,
}

impl EvaluationRequest {
    pub fn new(run_path: impl Into<PathBuf>) -> Self {
        Self {
            run_path: run_path.into(),
            task_name: None,
            output_path: None,
            max_p: MaxPMode::Auto,
            metrics: None,
            is_validation: false,
            is_full_docs: false,
        }
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }

    pub fn with_output_path(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    pub fn with_max_p(mut self, max_p: MaxPMode) -> Self {
        self.max_p = max_p;
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    pub fn validation(mut self, is_validation: bool) -> Self {
        self.is_validation = is_validation;
        self
    }

    pub fn full_docs(mut self, is_full_docs: bool) -> Self {
        self.is_full_docs = is_full_docs;
        self
    }

    pub fn metric_names(&self) -> Vec<String> {
        match &self.metrics {
            Some(metrics) if !metrics.is_empty() => metrics.clone(),
            _ => DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Scores a run file against the CRUMB judgments for its task.
pub struct Evaluator {
    registry: TaskRegistry,
    source: Arc<dyn DatasetSource>,
    engine: Box<dyn MetricEngine>,
    passage_ids: PassageIdFormat,
}

impl Evaluator {
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            registry: TaskRegistry::crumb(),
            source,
            engine: Box::new(RankingMetrics),
            passage_ids: PassageIdFormat::default(),
        }
    }

    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_engine(mut self, engine: Box<dyn MetricEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_passage_id_format(mut self, passage_ids: PassageIdFormat) -> Self {
        self.passage_ids = passage_ids;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationReport> {
        let task = self
            .registry
            .determine_task(&request.run_path, request.task_name.as_deref())?;
        let max_p = resolve_max_p(&self.registry, task, request.max_p, request.is_full_docs)?;

        let metrics = request.metric_names();
        classify_metrics(self.engine.as_ref(), &metrics)?;

        if max_p {
            info!("Using MaxP evaluation for task {}", task);
        }
        // MaxP dedupes passages against document-level judgments
        let qrel_is_full_docs = max_p || request.is_full_docs;

        let loader = QrelLoader::new(&self.registry, self.source.as_ref());
        let QrelSets {
            qrels,
            binary_qrels,
        } = loader
            .load_qrel_sets(task, request.is_validation, qrel_is_full_docs)
            .await?;

        let mut run = load_run(&request.run_path)?;
        if max_p {
            let max_p_run = modify_run_for_max_p(&run, &self.passage_ids)?;
            // Full-document judgments are keyed by document id
            run = document_level_run(&max_p_run, &self.passage_ids)?;
        }

        let results = compute_metrics(self.engine.as_ref(), &run, &qrels, &binary_qrels, &metrics)?;
        let report = EvaluationReport::new(task, max_p, results);

        report.print_summary();
        if let Some(output_path) = &request.output_path {
            report.save_to_file(output_path)?;
        }

        Ok(report)
    }
}

/// Evaluates with the default CRUMB registry and the built-in metrics.
pub async fn evaluate(
    source: Arc<dyn DatasetSource>,
    request: &EvaluationRequest,
) -> Result<EvaluationReport> {
    Evaluator::new(source).evaluate(request).await
}
