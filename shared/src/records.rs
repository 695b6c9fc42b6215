use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Expected one score per item, got {scores} scores for {items} items")]
    ScoreLengthMismatch { items: usize, scores: usize },
}

/// A query or a retrievable unit. Every field is optional on the wire; callers
/// that need an id for lookups must check for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Item {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = content;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Item as it appears inside a run line: the item fields plus an optional score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItemRecord {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// One line of a JSONL run file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub query: Item,
    pub items: Vec<ScoredItemRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// A query with an ordered list of associated items.
///
/// For runs the scores are retrieval scores, for qrels they are relevance
/// labels. When scores are present there is exactly one per item.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAssociatedItems {
    pub query: Item,
    pub metadata: Option<Map<String, Value>>,
    items: Vec<Item>,
    item_scores: Option<Vec<f64>>,
}

impl QueryAssociatedItems {
    pub fn new(query: Item, items: Vec<Item>) -> Self {
        Self {
            query,
            metadata: None,
            items,
            item_scores: None,
        }
    }

    pub fn with_scores(
        query: Item,
        items: Vec<Item>,
        item_scores: Vec<f64>,
    ) -> Result<Self, RecordError> {
        if items.len() != item_scores.len() {
            return Err(RecordError::ScoreLengthMismatch {
                items: items.len(),
                scores: item_scores.len(),
            });
        }

        Ok(Self {
            query,
            metadata: None,
            items,
            item_scores: Some(item_scores),
        })
    }

    pub fn from_scored_pairs(query: Item, pairs: Vec<(Item, f64)>) -> Self {
        let (items, item_scores) = pairs.into_iter().unzip();
        Self {
            query,
            metadata: None,
            items,
            item_scores: Some(item_scores),
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Map<String, Value>>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query.id()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_scores(&self) -> Option<&[f64]> {
        self.item_scores.as_deref()
    }

    /// Items zipped with their scores, or `None` when the entry is unscored.
    pub fn scored_items(&self) -> Option<impl Iterator<Item = (&Item, f64)>> {
        self.item_scores
            .as_ref()
            .map(|scores| self.items.iter().zip(scores.iter().copied()))
    }

    /// Builds an entry from a run line. A line where any item lacks a score
    /// yields an unscored entry.
    pub fn from_record(record: RunRecord) -> Self {
        let scores: Option<Vec<f64>> = record.items.iter().map(|item| item.score).collect();
        let items = record.items.into_iter().map(|scored| scored.item).collect();

        Self {
            query: record.query,
            metadata: record.metadata,
            items,
            item_scores: scores,
        }
    }

    pub fn to_record(&self) -> RunRecord {
        let items = match &self.item_scores {
            Some(scores) => self
                .items
                .iter()
                .zip(scores)
                .map(|(item, score)| ScoredItemRecord {
                    item: item.clone(),
                    score: Some(*score),
                })
                .collect(),
            None => self
                .items
                .iter()
                .map(|item| ScoredItemRecord {
                    item: item.clone(),
                    score: None,
                })
                .collect(),
        };

        RunRecord {
            query: self.query.clone(),
            items,
            metadata: self.metadata.clone(),
        }
    }
}
