use shared::{Item, QueryAssociatedItems};
use std::fmt;
use tracing::{debug, info, warn};

use crate::datasets::{DatasetSource, QrelRecord, SplitGroup};
use crate::error::Result;
use crate::tasks::{Task, TaskRegistry};

/// Field of a query record holding one judgment variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QrelKey {
    Passage,
    PassageBinary,
    FullDocument,
    FullDocumentBinary,
}

impl QrelKey {
    pub fn new(is_full_docs: bool, is_binary: bool) -> Self {
        match (is_full_docs, is_binary) {
            (false, false) => QrelKey::Passage,
            (false, true) => QrelKey::PassageBinary,
            (true, false) => QrelKey::FullDocument,
            (true, true) => QrelKey::FullDocumentBinary,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QrelKey::Passage => "passage_qrels",
            QrelKey::PassageBinary => "passage_binary_qrels",
            QrelKey::FullDocument => "full_document_qrels",
            QrelKey::FullDocumentBinary => "full_document_binary_qrels",
        }
    }

    pub fn is_full_docs(&self) -> bool {
        matches!(self, QrelKey::FullDocument | QrelKey::FullDocumentBinary)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, QrelKey::PassageBinary | QrelKey::FullDocumentBinary)
    }
}

impl fmt::Display for QrelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The split and judgment field that will actually be read for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrelVariant {
    pub split_group: SplitGroup,
    pub key: QrelKey,
}

/// Applies the task's capabilities to the requested flags. Unsupported
/// requests are downgraded rather than rejected: full documents fall back to
/// passages, binary falls back to graded, and full-document judgments are
/// never binary.
pub fn resolve_qrel_variant(
    registry: &TaskRegistry,
    task: Task,
    is_validation: bool,
    is_full_docs: bool,
    is_binary: bool,
) -> QrelVariant {
    let mut is_full_docs = is_full_docs;
    let mut is_binary = is_binary;

    if is_full_docs && !registry.supports_full_documents(task) {
        warn!(
            "Task {} only has one collection, ignoring full_docs flag.",
            task
        );
        is_full_docs = false;
    }

    if is_binary && !registry.has_binary_qrels(task) {
        debug!("Task {} has no binary qrels, using graded qrels", task);
        is_binary = false;
    }

    if is_binary && is_full_docs {
        debug!("Full document qrels are not binary for task {}", task);
        is_binary = false;
    }

    QrelVariant {
        split_group: SplitGroup::from_validation_flag(is_validation),
        key: QrelKey::new(is_full_docs, is_binary),
    }
}

/// Shapes query records into qrel entries whose scores are the labels of the
/// selected judgment field.
pub fn qrels_from_records(records: &[QrelRecord], key: QrelKey) -> Result<Vec<QueryAssociatedItems>> {
    records
        .iter()
        .map(|record| -> Result<QueryAssociatedItems> {
            let query = Item::with_id(record.query_id.clone())
                .with_content(record.query_content.clone());
            let judged = record
                .judgments(key)?
                .iter()
                .map(|entry| (Item::with_id(entry.id.clone()), entry.label))
                .collect();

            Ok(QueryAssociatedItems::from_scored_pairs(query, judged))
        })
        .collect()
}

/// Graded and binary judgments of one split.
#[derive(Debug, Clone, PartialEq)]
pub struct QrelSets {
    pub qrels: Vec<QueryAssociatedItems>,
    pub binary_qrels: Vec<QueryAssociatedItems>,
}

pub struct QrelLoader<'a> {
    registry: &'a TaskRegistry,
    source: &'a dyn DatasetSource,
}

impl<'a> QrelLoader<'a> {
    pub fn new(registry: &'a TaskRegistry, source: &'a dyn DatasetSource) -> Self {
        Self { registry, source }
    }

    pub async fn load_qrels(
        &self,
        task: Task,
        is_validation: bool,
        is_full_docs: bool,
        is_binary: bool,
    ) -> Result<Vec<QueryAssociatedItems>> {
        let variant =
            resolve_qrel_variant(self.registry, task, is_validation, is_full_docs, is_binary);

        let records = self.source.fetch_split(variant.split_group, task).await?;
        let qrels = qrels_from_records(&records, variant.key)?;

        info!(
            "Loaded {} {} for {} ({}) from {}",
            qrels.len(),
            variant.key,
            task,
            variant.split_group,
            self.source.get_name()
        );
        Ok(qrels)
    }

    /// Loads graded and binary judgments from a single fetch of the split.
    pub async fn load_qrel_sets(
        &self,
        task: Task,
        is_validation: bool,
        is_full_docs: bool,
    ) -> Result<QrelSets> {
        let graded = resolve_qrel_variant(self.registry, task, is_validation, is_full_docs, false);
        // Full-docs support is already resolved, so this never warns again
        let binary = resolve_qrel_variant(
            self.registry,
            task,
            is_validation,
            graded.key.is_full_docs(),
            true,
        );

        let records = self.source.fetch_split(graded.split_group, task).await?;
        let qrels = qrels_from_records(&records, graded.key)?;
        let binary_qrels = if binary.key == graded.key {
            qrels.clone()
        } else {
            qrels_from_records(&records, binary.key)?
        };

        info!(
            "Loaded {} {} and {} for {} ({}) from {}",
            qrels.len(),
            graded.key,
            binary.key,
            task,
            graded.split_group,
            self.source.get_name()
        );
        Ok(QrelSets {
            qrels,
            binary_qrels,
        })
    }
}
