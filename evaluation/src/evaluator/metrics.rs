use elinor::{Metric, PredRelStoreBuilder, TrueRelStoreBuilder};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{EvalError, Result};

/// query id -> item id -> relevance label
pub type QrelMap = HashMap<String, HashMap<String, i64>>;
/// query id -> item id -> retrieval score
pub type RunMap = HashMap<String, HashMap<String, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelevanceFamily {
    /// Only relevant / not relevant matters.
    Binary,
    Graded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeasureKind {
    Ndcg,
    Precision,
    Recall,
    ReciprocalRank,
}

impl MeasureKind {
    pub fn family(&self) -> RelevanceFamily {
        match self {
            MeasureKind::Precision | MeasureKind::Recall | MeasureKind::ReciprocalRank => {
                RelevanceFamily::Binary
            }
            MeasureKind::Ndcg => RelevanceFamily::Graded,
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            MeasureKind::Ndcg => "nDCG",
            MeasureKind::Precision => "P",
            MeasureKind::Recall => "R",
            MeasureKind::ReciprocalRank => "RR",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ndcg" | "ndcg_cut" => Some(MeasureKind::Ndcg),
            "p" | "precision" => Some(MeasureKind::Precision),
            "r" | "recall" => Some(MeasureKind::Recall),
            "rr" | "mrr" | "recip_rank" => Some(MeasureKind::ReciprocalRank),
            _ => None,
        }
    }
}

/// A ranking measure with an optional rank cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Measure {
    pub kind: MeasureKind,
    pub cutoff: Option<usize>,
}

impl Measure {
    pub fn new(kind: MeasureKind, cutoff: Option<usize>) -> Self {
        Self { kind, cutoff }
    }

    pub fn family(&self) -> RelevanceFamily {
        self.kind.family()
    }

    /// A cutoff of 0 means the whole ranking.
    fn to_elinor(self) -> Metric {
        let k = self.cutoff.unwrap_or(0);
        match self.kind {
            MeasureKind::Ndcg => Metric::NDCG { k },
            MeasureKind::Precision => Metric::Precision { k },
            MeasureKind::Recall => Metric::Recall { k },
            MeasureKind::ReciprocalRank => Metric::RR { k },
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cutoff {
            Some(cutoff) => write!(f, "{}@{}", self.kind.display_name(), cutoff),
            None => f.write_str(self.kind.display_name()),
        }
    }
}

/// Accepts `nDCG@10` style names as well as trec_eval style names such as
/// `ndcg_cut_10`, `P_5`, `recall.100` and `recip_rank`.
impl FromStr for Measure {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        let unknown = || EvalError::UnknownMetric(s.to_string());

        let (kind, cutoff) = match name.split_once('@') {
            Some((kind, cutoff)) => {
                let cutoff = cutoff.parse::<usize>().map_err(|_| unknown())?;
                (kind, Some(cutoff))
            }
            None => match name.rsplit_once(|c: char| c == '_' || c == '.') {
                Some((kind, cutoff)) if cutoff.parse::<usize>().is_ok() => {
                    (kind, cutoff.parse::<usize>().ok())
                }
                _ => (name, None),
            },
        };

        if cutoff == Some(0) {
            return Err(unknown());
        }

        let kind = MeasureKind::from_name(kind).ok_or_else(unknown)?;
        Ok(Measure::new(kind, cutoff))
    }
}

/// Computes aggregate values of ranking measures.
pub trait MetricEngine: Send + Sync {
    fn parse(&self, name: &str) -> Result<Measure>;

    /// Returns one value per measure keyed by the measure's display name.
    fn aggregate(
        &self,
        measures: &[Measure],
        qrels: &QrelMap,
        run: &RunMap,
    ) -> Result<BTreeMap<String, f64>>;
}

/// Measures computed with `elinor`.
///
/// Aggregates are means over the queries present in both the qrels and the
/// run; with no such query every measure is 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingMetrics;

impl MetricEngine for RankingMetrics {
    fn parse(&self, name: &str) -> Result<Measure> {
        name.parse()
    }

    fn aggregate(
        &self,
        measures: &[Measure],
        qrels: &QrelMap,
        run: &RunMap,
    ) -> Result<BTreeMap<String, f64>> {
        let mut true_builder = TrueRelStoreBuilder::new();
        let mut pred_builder = PredRelStoreBuilder::new();
        let mut shared_queries = 0;

        for (query_id, judgments) in qrels {
            let Some(scores) = run.get(query_id) else {
                continue;
            };
            if judgments.is_empty() || scores.is_empty() {
                continue;
            }
            shared_queries += 1;

            for (item_id, label) in judgments {
                // Negative labels count as non-relevant
                let label = u32::try_from((*label).max(0)).unwrap_or(u32::MAX);
                true_builder
                    .add_record(query_id.clone(), item_id.clone(), label)
                    .map_err(|e| EvalError::Metric(e.to_string()))?;
            }
            for (item_id, score) in scores {
                pred_builder
                    .add_record(query_id.clone(), item_id.clone(), (*score).into())
                    .map_err(|e| EvalError::Metric(e.to_string()))?;
            }
        }

        if shared_queries == 0 {
            return Ok(measures
                .iter()
                .map(|measure| (measure.to_string(), 0.0))
                .collect());
        }

        let true_rels = true_builder.build();
        let pred_rels = pred_builder.build();

        measures
            .iter()
            .map(|measure| {
                let evaluation = elinor::evaluate(&true_rels, &pred_rels, measure.to_elinor())
                    .map_err(|e| EvalError::Metric(e.to_string()))?;
                Ok((measure.to_string(), evaluation.mean()))
            })
            .collect()
    }
}
