use shared::JsonlError;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Unknown task name: {0}")]
    UnknownTask(String),
    #[error("Could not determine task from run path: {0}. Please specify the task name.")]
    TaskNotInferred(String),
    #[error("max_p cannot be used when evaluating on full documents")]
    MaxPWithFullDocuments,
    #[error("max_p is only supported for tasks: {supported}, but got {task}")]
    MaxPUnsupported { task: String, supported: String },
    #[error("Invalid max_p mode '{0}', expected one of: auto, true, false")]
    InvalidMaxPMode(String),
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
    #[error("Metric computation failed: {0}")]
    Metric(String),
    #[error("Record for query {query_id} has no {field} field")]
    MissingField {
        query_id: String,
        field: &'static str,
    },
    #[error("Entry is missing a query id")]
    MissingQueryId,
    #[error("Item of query {0} is missing an id")]
    MissingItemId(String),
    #[error("Items of query {0} have no scores")]
    MissingScores(String),
    #[error("Item id '{id}' has no document separator '{separator}'")]
    MissingDocumentSeparator { id: String, separator: char },
    #[error("Dataset error: {0}")]
    Dataset(String),
    #[error(transparent)]
    Jsonl(#[from] JsonlError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EvalError {
    /// Errors the caller can fix by changing the requested task, flags or metrics.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            EvalError::UnknownTask(_)
                | EvalError::TaskNotInferred(_)
                | EvalError::MaxPWithFullDocuments
                | EvalError::MaxPUnsupported { .. }
                | EvalError::InvalidMaxPMode(_)
                | EvalError::UnknownMetric(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
