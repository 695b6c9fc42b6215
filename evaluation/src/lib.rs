pub mod config;
pub mod datasets;
pub mod error;
pub mod evaluate;
pub mod evaluator;
pub mod max_p;
pub mod qrels;
pub mod reporter;
pub mod run;
pub mod tasks;

pub use config::EvalConfig;
pub use datasets::{DatasetSource, HuggingFaceSource, LocalDatasetSource, SplitGroup};
pub use error::{EvalError, Result};
pub use evaluate::{evaluate, resolve_max_p, EvaluationRequest, Evaluator, MaxPMode, DEFAULT_METRICS};
pub use evaluator::{compute_metrics, Measure, MetricEngine, RankingMetrics};
pub use max_p::{document_level_run, modify_run_for_max_p, MissingSeparator, PassageIdFormat};
pub use qrels::{QrelKey, QrelLoader, QrelSets};
pub use reporter::EvaluationReport;
pub use run::load_run;
pub use tasks::{Task, TaskCapabilities, TaskRegistry};
