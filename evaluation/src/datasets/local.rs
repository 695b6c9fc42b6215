use async_trait::async_trait;
use shared::jsonl::{read_jsonl, JsonlWriter};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::datasets::{DatasetSource, QrelRecord, SplitGroup};
use crate::error::{EvalError, Result};
use crate::tasks::Task;

/// Splits stored on disk as `<root>/<split_group>/<task>.jsonl`, one query row
/// per line. Also the layout of the download cache.
#[derive(Debug, Clone)]
pub struct LocalDatasetSource {
    root: PathBuf,
}

impl LocalDatasetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn split_path(&self, split_group: SplitGroup, task: Task) -> PathBuf {
        self.root
            .join(split_group.as_str())
            .join(format!("{}.jsonl", task))
    }

    pub fn contains(&self, split_group: SplitGroup, task: Task) -> bool {
        self.split_path(split_group, task).is_file()
    }

    pub fn read_split(&self, split_group: SplitGroup, task: Task) -> Result<Vec<QrelRecord>> {
        let path = self.split_path(split_group, task);
        if !path.is_file() {
            return Err(EvalError::Dataset(format!(
                "Split {}/{} not found at {}",
                split_group,
                task,
                path.display()
            )));
        }

        let records: Vec<QrelRecord> = read_jsonl(&path)?;
        info!(
            "Loaded {} query records from {}",
            records.len(),
            path.display()
        );
        Ok(records)
    }

    pub fn write_split(
        &self,
        split_group: SplitGroup,
        task: Task,
        records: &[QrelRecord],
    ) -> Result<usize> {
        let path = self.split_path(split_group, task);
        let mut writer = JsonlWriter::create(&path, false)?;
        for record in records {
            writer.write(record)?;
        }
        Ok(writer.finish()?)
    }
}

#[async_trait]
impl DatasetSource for LocalDatasetSource {
    async fn fetch_split(&self, split_group: SplitGroup, task: Task) -> Result<Vec<QrelRecord>> {
        self.read_split(split_group, task)
    }

    fn get_name(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::QrelEntry;
    use crate::qrels::QrelKey;
    use tempfile::TempDir;

    fn record(query_id: &str) -> QrelRecord {
        QrelRecord {
            query_id: query_id.to_string(),
            query_content: Some("find trials".to_string()),
            passage_qrels: Some(vec![QrelEntry {
                id: "NCT01:0".to_string(),
                label: 2.0,
            }]),
            passage_binary_qrels: None,
            full_document_qrels: None,
            full_document_binary_qrels: None,
        }
    }

    #[tokio::test]
    async fn test_local_source_reads_written_split() {
        let temp_dir = TempDir::new().unwrap();
        let source = LocalDatasetSource::new(temp_dir.path());

        let written = source
            .write_split(
                SplitGroup::Evaluation,
                Task::ClinicalTrial,
                &[record("q1"), record("q2")],
            )
            .unwrap();
        assert_eq!(written, 2);
        assert!(temp_dir
            .path()
            .join("evaluation_queries/clinical_trial.jsonl")
            .is_file());

        let records = source
            .fetch_split(SplitGroup::Evaluation, Task::ClinicalTrial)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].query_id, "q2");
        assert_eq!(records[0].judgments(QrelKey::Passage).unwrap().len(), 1);
        assert!(matches!(
            records[0].judgments(QrelKey::FullDocument),
            Err(EvalError::MissingField { field: "full_document_qrels", .. })
        ));
    }

    #[tokio::test]
    async fn test_local_source_missing_split_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = LocalDatasetSource::new(temp_dir.path());

        assert!(!source.contains(SplitGroup::Validation, Task::LegalQa));
        let result = source
            .fetch_split(SplitGroup::Validation, Task::LegalQa)
            .await;
        assert!(matches!(result, Err(EvalError::Dataset(_))));
    }

    #[test]
    fn test_record_accepts_integer_labels_and_null_lists() {
        let line = r#"{"query_id": "7", "query_content": null, "passage_qrels": [{"id": "a:1", "label": 1}],
            "full_document_qrels": null, "extra_column": "ignored"}"#;
        let parsed: QrelRecord = serde_json::from_str(line).unwrap();

        assert_eq!(parsed.query_content, None);
        assert_eq!(parsed.judgments(QrelKey::Passage).unwrap()[0].label, 1.0);
        assert!(parsed.full_document_qrels.is_none());
    }
}
