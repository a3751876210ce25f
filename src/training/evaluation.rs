// src/training/evaluation.rs
//
// Ranking quality per appraisal on the held-out partition

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TrainingRow;
use crate::features::FeatureRow;
use crate::model::ModelError;
use crate::models::AppraisalId;
use crate::ranking::{top_k_indices, CompRecommender};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub k: usize,
    pub appraisals_evaluated: usize,
    /// Mean fraction of recommended candidates that were real comps.
    pub precision_at_k: f64,
    /// Mean fraction of real comps recovered in the top k, over appraisals
    /// that had at least one real comp among their candidates.
    pub recall_at_k: f64,
    pub appraisals_with_comps: usize,
}

/// Precision@k and, when the appraisal has any positives, recall@k.
pub fn appraisal_metrics(scores: &[f64], labels: &[bool], k: usize) -> (f64, Option<f64>) {
    let top = top_k_indices(scores, k);
    if top.is_empty() {
        return (0.0, None);
    }

    let hits = top.iter().filter(|&&i| labels[i]).count() as f64;
    let positives = labels.iter().filter(|&&l| l).count();

    let precision = hits / top.len() as f64;
    let recall = (positives > 0).then(|| hits / positives as f64);
    (precision, recall)
}

/// Scores each appraisal's rows with `recommender` and averages the metrics.
///
/// Rows are grouped by appraisal id, matching how `split_by_appraisal`
/// partitions them. Input order does not matter.
pub fn evaluate(
    rows: &[&TrainingRow],
    recommender: &CompRecommender,
) -> Result<ValidationReport, ModelError> {
    let k = recommender.top_k();
    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut evaluated = 0;
    let mut with_comps = 0;

    let mut groups: BTreeMap<&AppraisalId, Vec<&TrainingRow>> = BTreeMap::new();
    for &row in rows {
        groups.entry(&row.appraisal_id).or_default().push(row);
    }

    for group in groups.values() {
        let features: Vec<FeatureRow> = group.iter().map(|r| r.features.to_row()).collect();
        let labels: Vec<bool> = group.iter().map(|r| r.label).collect();
        let scores = recommender.score(&features)?;

        let (precision, recall) = appraisal_metrics(&scores, &labels, k);
        precision_sum += precision;
        evaluated += 1;
        if let Some(recall) = recall {
            recall_sum += recall;
            with_comps += 1;
        }
    }

    let mean = |sum: f64, n: usize| if n == 0 { 0.0 } else { sum / n as f64 };

    Ok(ValidationReport {
        k,
        appraisals_evaluated: evaluated,
        precision_at_k: mean(precision_sum, evaluated),
        recall_at_k: mean(recall_sum, with_comps),
        appraisals_with_comps: with_comps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::model::{Classifier, FeatureScaler};
    use std::sync::Arc;

    struct InverseGla;

    impl Classifier for InverseGla {
        fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
            Ok(rows.iter().map(|r| 1.0 / (1.0 + r[0])).collect())
        }

        fn name(&self) -> &str {
            "inverse_gla"
        }
    }

    fn row(appraisal: &str, gla_diff: f64, label: bool) -> TrainingRow {
        TrainingRow {
            appraisal_id: AppraisalId(appraisal.to_string()),
            candidate_index: 0,
            features: FeatureVector {
                gla_diff,
                lot_diff: 0.0,
                month_diff: 0.0,
                distance: 0.0,
            },
            label,
        }
    }

    #[test]
    fn test_appraisal_metrics() {
        let scores = [0.9, 0.8, 0.7, 0.6, 0.5];
        let labels = [true, false, true, true, false];
        let (precision, recall) = appraisal_metrics(&scores, &labels, 3);
        assert!((precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall.unwrap() - 2.0 / 3.0).abs() < 1e-12);

        // Fewer candidates than k
        let (precision, recall) = appraisal_metrics(&[0.1, 0.2], &[true, false], 3);
        assert_eq!(precision, 0.5);
        assert_eq!(recall, Some(1.0));

        let (_, recall) = appraisal_metrics(&[0.1], &[false], 3);
        assert_eq!(recall, None);
    }

    #[test]
    fn test_evaluate_averages_per_appraisal() {
        let rows = vec![
            // Appraisal a: the comp ranks first
            row("a", 0.0, true),
            row("a", 50.0, false),
            row("a", 100.0, false),
            row("a", 500.0, false),
            // Appraisal b: the comp ranks last, outside the top 3
            row("b", 900.0, true),
            row("b", 1.0, false),
            row("b", 2.0, false),
            row("b", 3.0, false),
            // Appraisal c: no comps among the candidates
            row("c", 1.0, false),
        ];
        let refs: Vec<&TrainingRow> = rows.iter().collect();
        let recommender = CompRecommender::new(FeatureScaler::identity(), Arc::new(InverseGla));

        let report = evaluate(&refs, &recommender).unwrap();
        assert_eq!(report.k, 3);
        assert_eq!(report.appraisals_evaluated, 3);
        assert_eq!(report.appraisals_with_comps, 2);
        assert!((report.precision_at_k - (1.0 / 3.0) / 3.0).abs() < 1e-12);
        assert!((report.recall_at_k - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_groups_interleaved_rows_by_id() {
        let rows = vec![
            row("a", 0.0, true),
            row("b", 900.0, true),
            row("a", 50.0, false),
            row("b", 1.0, false),
            row("a", 100.0, false),
            row("b", 2.0, false),
            row("a", 500.0, false),
            row("b", 3.0, false),
        ];
        let refs: Vec<&TrainingRow> = rows.iter().collect();
        let recommender = CompRecommender::new(FeatureScaler::identity(), Arc::new(InverseGla));

        let report = evaluate(&refs, &recommender).unwrap();
        assert_eq!(report.appraisals_evaluated, 2);
        assert_eq!(report.appraisals_with_comps, 2);
        assert!((report.recall_at_k - 0.5).abs() < 1e-12);
    }
}
