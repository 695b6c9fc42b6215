use shared::QueryAssociatedItems;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::evaluator::metrics::{Measure, MetricEngine, QrelMap, RelevanceFamily, RunMap};

/// Measures split by the judgments they are computed against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedMeasures {
    pub binary: Vec<Measure>,
    pub graded: Vec<Measure>,
}

/// Parses every metric name. An unknown name fails the whole request.
pub fn classify_metrics(engine: &dyn MetricEngine, metrics: &[String]) -> Result<ClassifiedMeasures> {
    let mut classified = ClassifiedMeasures::default();

    for name in metrics {
        let measure = engine.parse(name)?;
        let bucket = match measure.family() {
            RelevanceFamily::Binary => &mut classified.binary,
            RelevanceFamily::Graded => &mut classified.graded,
        };
        if !bucket.contains(&measure) {
            bucket.push(measure);
        }
    }

    Ok(classified)
}

fn entries<'a>(
    collection: &'a [QueryAssociatedItems],
) -> impl Iterator<Item = Result<(&'a str, &'a QueryAssociatedItems)>> + 'a {
    collection.iter().map(|entry| {
        entry
            .query_id()
            .map(|query_id| (query_id, entry))
            .ok_or(EvalError::MissingQueryId)
    })
}

fn scored_map<T>(
    collection: &[QueryAssociatedItems],
    convert: impl Fn(f64) -> T,
) -> Result<HashMap<String, HashMap<String, T>>> {
    let mut map = HashMap::with_capacity(collection.len());

    for entry in entries(collection) {
        let (query_id, entry) = entry?;
        let scored = entry
            .scored_items()
            .ok_or_else(|| EvalError::MissingScores(query_id.to_string()))?;

        let mut items = HashMap::new();
        for (item, score) in scored {
            let item_id = item
                .id()
                .ok_or_else(|| EvalError::MissingItemId(query_id.to_string()))?;
            items.insert(item_id.to_string(), convert(score));
        }
        map.insert(query_id.to_string(), items);
    }

    Ok(map)
}

/// Labels are truncated to integers.
pub fn qrel_map(qrels: &[QueryAssociatedItems]) -> Result<QrelMap> {
    scored_map(qrels, |label| label as i64)
}

pub fn run_map(run: &[QueryAssociatedItems]) -> Result<RunMap> {
    scored_map(run, |score| score)
}

/// Computes binary-relevance measures (precision, recall, reciprocal rank)
/// against `binary_qrels` and graded measures (nDCG) against `qrels`, and
/// merges the results.
pub fn compute_metrics(
    engine: &dyn MetricEngine,
    run: &[QueryAssociatedItems],
    qrels: &[QueryAssociatedItems],
    binary_qrels: &[QueryAssociatedItems],
    metrics: &[String],
) -> Result<BTreeMap<String, f64>> {
    let classified = classify_metrics(engine, metrics)?;

    let run_dict = run_map(run)?;
    let qrel_dict = qrel_map(qrels)?;
    let binary_qrel_dict = qrel_map(binary_qrels)?;

    let mut results = BTreeMap::new();

    if !classified.binary.is_empty() {
        debug!(
            "Computing {} binary measures over {} judged queries",
            classified.binary.len(),
            binary_qrel_dict.len()
        );
        results.extend(engine.aggregate(&classified.binary, &binary_qrel_dict, &run_dict)?);
    }

    if !classified.graded.is_empty() {
        debug!(
            "Computing {} graded measures over {} judged queries",
            classified.graded.len(),
            qrel_dict.len()
        );
        results.extend(engine.aggregate(&classified.graded, &qrel_dict, &run_dict)?);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::metrics::{MeasureKind, RankingMetrics};
    use shared::Item;
    use std::sync::Mutex;

    fn entry(query_id: &str, items: &[(&str, f64)]) -> QueryAssociatedItems {
        QueryAssociatedItems::from_scored_pairs(
            Item::with_id(query_id),
            items
                .iter()
                .map(|(id, score)| (Item::with_id(*id), *score))
                .collect(),
        )
    }

    fn names(metrics: &[&str]) -> Vec<String> {
        metrics.iter().map(|m| m.to_string()).collect()
    }

    /// Records which qrels each family was evaluated against.
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<(Vec<String>, QrelMap)>>,
    }

    impl MetricEngine for RecordingEngine {
        fn parse(&self, name: &str) -> Result<Measure> {
            RankingMetrics.parse(name)
        }

        fn aggregate(
            &self,
            measures: &[Measure],
            qrels: &QrelMap,
            run: &RunMap,
        ) -> Result<BTreeMap<String, f64>> {
            self.calls.lock().unwrap().push((
                measures.iter().map(|m| m.to_string()).collect(),
                qrels.clone(),
            ));
            RankingMetrics.aggregate(measures, qrels, run)
        }
    }

    #[test]
    fn test_classify_metrics() {
        let classified = classify_metrics(
            &RankingMetrics,
            &names(&["nDCG@10", "P@10", "MRR", "RR", "R@100", "ndcg_cut_10"]),
        )
        .unwrap();

        assert_eq!(
            classified.graded,
            vec![Measure::new(MeasureKind::Ndcg, Some(10))]
        );
        assert_eq!(
            classified.binary,
            vec![
                Measure::new(MeasureKind::Precision, Some(10)),
                Measure::new(MeasureKind::ReciprocalRank, None),
                Measure::new(MeasureKind::Recall, Some(100)),
            ]
        );
    }

    #[test]
    fn test_unknown_metric_fails_loudly() {
        let result = classify_metrics(&RankingMetrics, &names(&["P@10", "map"]));
        assert!(matches!(result, Err(EvalError::UnknownMetric(name)) if name == "map"));
    }

    #[test]
    fn test_families_use_their_own_qrels() {
        let run = vec![entry("q1", &[("d1", 3.0), ("d2", 2.0)])];
        // Graded qrels judge d2 highly, binary qrels only accept d1
        let qrels = vec![entry("q1", &[("d1", 0.0), ("d2", 2.0)])];
        let binary_qrels = vec![entry("q1", &[("d1", 1.0), ("d2", 0.0)])];

        let engine = RecordingEngine::default();
        let results = compute_metrics(
            &engine,
            &run,
            &qrels,
            &binary_qrels,
            &names(&["P@10", "nDCG@10"]),
        )
        .unwrap();

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, vec!["P@10".to_string()]);
        assert_eq!(calls[0].1, qrel_map(&binary_qrels).unwrap());
        assert_eq!(calls[1].0, vec!["nDCG@10".to_string()]);
        assert_eq!(calls[1].1, qrel_map(&qrels).unwrap());

        assert_eq!(results.len(), 2);
        assert!((results["P@10"] - 0.1).abs() < 1e-9);
        let expected_ndcg = (2.0 / 3f64.log2()) / 2.0;
        assert!((results["nDCG@10"] - expected_ndcg).abs() < 1e-9);
    }

    #[test]
    fn test_family_without_measures_is_not_evaluated() {
        let run = vec![entry("q1", &[("d1", 1.0)])];
        let qrels = vec![entry("q1", &[("d1", 1.0)])];

        let engine = RecordingEngine::default();
        let results = compute_metrics(&engine, &run, &qrels, &qrels, &names(&["nDCG@5"])).unwrap();

        assert_eq!(engine.calls.lock().unwrap().len(), 1);
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["nDCG@5"]);
    }

    #[test]
    fn test_qrel_labels_are_truncated() {
        let qrels = vec![entry("q1", &[("d1", 2.7), ("d2", -0.5)])];
        let map = qrel_map(&qrels).unwrap();

        assert_eq!(map["q1"]["d1"], 2);
        assert_eq!(map["q1"]["d2"], 0);
    }

    #[test]
    fn test_unscored_run_is_rejected() {
        let run = vec![QueryAssociatedItems::new(
            Item::with_id("q3"),
            vec![Item::with_id("d1")],
        )];

        assert!(matches!(run_map(&run), Err(EvalError::MissingScores(id)) if id == "q3"));
    }

    #[test]
    fn test_entry_without_query_id_is_rejected() {
        let run = vec![QueryAssociatedItems::from_scored_pairs(
            Item::default(),
            vec![(Item::with_id("d1"), 1.0)],
        )];

        assert!(matches!(run_map(&run), Err(EvalError::MissingQueryId)));
    }
}
