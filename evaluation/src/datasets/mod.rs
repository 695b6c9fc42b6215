pub mod huggingface;
pub mod local;

pub use huggingface::*;
pub use local::*;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{EvalError, Result};
use crate::qrels::QrelKey;
use crate::tasks::Task;

/// Which query set a split belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitGroup {
    Validation,
    Evaluation,
}

impl SplitGroup {
    pub fn from_validation_flag(is_validation: bool) -> Self {
        if is_validation {
            SplitGroup::Validation
        } else {
            SplitGroup::Evaluation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitGroup::Validation => "validation_queries",
            SplitGroup::Evaluation => "evaluation_queries",
        }
    }
}

impl fmt::Display for SplitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrelEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub label: f64,
}

/// One query row of a benchmark split. Only the judgment list matching the
/// requested qrel key has to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrelRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub query_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_qrels: Option<Vec<QrelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_binary_qrels: Option<Vec<QrelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_document_qrels: Option<Vec<QrelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_document_binary_qrels: Option<Vec<QrelEntry>>,
}

impl QrelRecord {
    pub fn judgments(&self, key: QrelKey) -> Result<&[QrelEntry]> {
        let judgments = match key {
            QrelKey::Passage => &self.passage_qrels,
            QrelKey::PassageBinary => &self.passage_binary_qrels,
            QrelKey::FullDocument => &self.full_document_qrels,
            QrelKey::FullDocumentBinary => &self.full_document_binary_qrels,
        };

        judgments
            .as_deref()
            .ok_or_else(|| EvalError::MissingField {
                query_id: self.query_id.clone(),
                field: key.as_str(),
            })
    }
}

// Some splits store numeric ids.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Integer(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Integer(number) => number.to_string(),
    })
}

#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetches every query row of the split named after `task` in `split_group`.
    async fn fetch_split(&self, split_group: SplitGroup, task: Task) -> Result<Vec<QrelRecord>>;
    fn get_name(&self) -> String;
}
