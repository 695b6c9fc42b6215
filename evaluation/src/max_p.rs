//! MaxP: score a passage run against document judgments by keeping only the
//! best passage of every document.

use shared::{Item, QueryAssociatedItems};
use std::collections::HashSet;
use tracing::debug;

use crate::error::{EvalError, Result};

/// What to do with an item id that has no document separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSeparator {
    #[default]
    Fail,
    /// The whole id is the document id.
    WholeId,
}

/// Passage ids are `<doc_id><separator><passage_index>`; the document id is
/// everything before the first separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassageIdFormat {
    pub separator: char,
    pub on_missing: MissingSeparator,
}

impl Default for PassageIdFormat {
    fn default() -> Self {
        Self {
            separator: ':',
            on_missing: MissingSeparator::Fail,
        }
    }
}

impl PassageIdFormat {
    pub fn lenient() -> Self {
        Self {
            on_missing: MissingSeparator::WholeId,
            ..Self::default()
        }
    }

    pub fn document_id<'a>(&self, item_id: &'a str) -> Result<&'a str> {
        match item_id.split_once(self.separator) {
            Some((document_id, _)) => Ok(document_id),
            None => match self.on_missing {
                MissingSeparator::Fail => Err(EvalError::MissingDocumentSeparator {
                    id: item_id.to_string(),
                    separator: self.separator,
                }),
                MissingSeparator::WholeId => Ok(item_id),
            },
        }
    }
}

/// Reduces every query's ranking to the highest-scored passage per document.
/// Output items are ordered by descending score; equal scores keep their
/// input order.
pub fn modify_run_for_max_p(
    run: &[QueryAssociatedItems],
    format: &PassageIdFormat,
) -> Result<Vec<QueryAssociatedItems>> {
    let modified = run
        .iter()
        .map(|entry| max_p_entry(entry, format))
        .collect::<Result<Vec<_>>>()?;

    let before: usize = run.iter().map(|entry| entry.items().len()).sum();
    let after: usize = modified.iter().map(|entry| entry.items().len()).sum();
    debug!(
        "MaxP kept {} of {} passages across {} queries",
        after,
        before,
        modified.len()
    );

    Ok(modified)
}

fn max_p_entry(
    entry: &QueryAssociatedItems,
    format: &PassageIdFormat,
) -> Result<QueryAssociatedItems> {
    let query_id = entry.query_id().unwrap_or_default();
    let mut ranked: Vec<(&Item, f64)> = entry
        .scored_items()
        .ok_or_else(|| EvalError::MissingScores(query_id.to_string()))?
        .collect();

    // sort_by is stable, so ties stay in input order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut seen_documents = HashSet::new();
    let mut kept = Vec::new();
    for (item, score) in ranked {
        let item_id = item
            .id()
            .ok_or_else(|| EvalError::MissingItemId(query_id.to_string()))?;
        let document_id = format.document_id(item_id)?;

        if seen_documents.insert(document_id) {
            kept.push((item.clone(), score));
        }
    }

    Ok(QueryAssociatedItems::from_scored_pairs(entry.query.clone(), kept)
        .with_metadata(entry.metadata.clone()))
}

/// Renames every item to its document id so a MaxP run can be matched
/// against document-level judgments. Expects one item per document, as
/// produced by [`modify_run_for_max_p`].
pub fn document_level_run(
    run: &[QueryAssociatedItems],
    format: &PassageIdFormat,
) -> Result<Vec<QueryAssociatedItems>> {
    run.iter()
        .map(|entry| -> Result<QueryAssociatedItems> {
            let query_id = entry.query_id().unwrap_or_default();
            let documents = entry
                .scored_items()
                .ok_or_else(|| EvalError::MissingScores(query_id.to_string()))?
                .map(|(item, score)| -> Result<(Item, f64)> {
                    let item_id = item
                        .id()
                        .ok_or_else(|| EvalError::MissingItemId(query_id.to_string()))?;
                    let mut document = item.clone();
                    document.id = Some(format.document_id(item_id)?.to_string());
                    Ok((document, score))
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(QueryAssociatedItems::from_scored_pairs(entry.query.clone(), documents)
                .with_metadata(entry.metadata.clone()))
        })
        .collect()
}
