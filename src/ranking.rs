// src/ranking.rs

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::TOP_K;
use crate::features::{extract_candidate_features, FeatureRow, FeatureVector};
use crate::model::{Classifier, FeatureScaler, ModelError};
use crate::models::PropertyRecord;

/// Indices of the `k` highest scores, best first.
///
/// The sort is stable, so equal scores keep their input order.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(k);
    order
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredComp {
    /// Position of the candidate in the request.
    pub index: usize,
    pub score: f64,
    pub features: FeatureVector,
    pub record: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Recommendation {
    pub comps: Vec<ScoredComp>,
    pub candidates_scored: usize,
    pub candidates_skipped: usize,
}

/// Scores candidates against a subject with an injected scaler and classifier.
///
/// Holds no mutable state; one instance is shared by every request.
pub struct CompRecommender {
    scaler: FeatureScaler,
    classifier: Arc<dyn Classifier>,
    top_k: usize,
}

impl CompRecommender {
    pub fn new(scaler: FeatureScaler, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            scaler,
            classifier,
            top_k: TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Standardizes raw rows and returns one match probability per row.
    pub fn score(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let scaled = self.scaler.transform(rows);
        let scores = self.classifier.predict_proba(&scaled)?;
        if scores.len() != rows.len() {
            return Err(ModelError::LengthMismatch {
                expected: rows.len(),
                got: scores.len(),
            });
        }
        Ok(scores)
    }

    /// Top comps for `subject` among `candidates`.
    ///
    /// Candidates whose features cannot be built are skipped; an empty result
    /// is a valid answer.
    pub fn recommend(
        &self,
        subject: &PropertyRecord,
        candidates: &[Value],
    ) -> Result<Recommendation, ModelError> {
        let extracted = extract_candidate_features(subject, candidates);
        for (index, err) in &extracted.rejected {
            debug!("Skipping candidate {}: {}", index, err);
        }

        let rows: Vec<FeatureRow> = extracted
            .accepted
            .iter()
            .map(|(_, features)| features.to_row())
            .collect();
        let scores = self.score(&rows)?;

        let comps = top_k_indices(&scores, self.top_k)
            .into_iter()
            .map(|pos| {
                let (index, features) = extracted.accepted[pos];
                ScoredComp {
                    index,
                    score: scores[pos],
                    features,
                    record: candidates[index].clone(),
                }
            })
            .collect();

        Ok(Recommendation {
            comps,
            candidates_scored: extracted.accepted.len(),
            candidates_skipped: extracted.rejected.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::config::DEFAULT_LOOKBACK_MONTHS;

    /// Scores by closeness in living area: 1 / (1 + |gla_diff|).
    struct GlaScorer;

    impl Classifier for GlaScorer {
        fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
            Ok(rows.iter().map(|r| 1.0 / (1.0 + r[0].abs())).collect())
        }

        fn name(&self) -> &str {
            "gla_scorer"
        }
    }

    struct ConstantScorer;

    impl Classifier for ConstantScorer {
        fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
            Ok(vec![0.5; rows.len()])
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    fn recommender(classifier: Arc<dyn Classifier>) -> CompRecommender {
        CompRecommender::new(FeatureScaler::identity(), classifier)
    }

    fn subject() -> PropertyRecord {
        PropertyRecord::from_value(&json!({
            "gla": 2000,
            "lot_size": 5000,
            "latitude": 40.0,
            "longitude": -75.0,
            "effective_date": "Apr/01/2025"
        }))
        .unwrap()
    }

    fn candidate(address: &str, gla: f64) -> Value {
        json!({
            "address": address,
            "gla": gla,
            "lot_size_sf": 5000,
            "latitude": 40.0,
            "longitude": -75.0,
            "close_date": "2025-02-01"
        })
    }

    #[test]
    fn test_top_k_indices_is_stable() {
        assert_eq!(top_k_indices(&[0.2, 0.9, 0.5, 0.9], 3), vec![1, 3, 2]);
        assert_eq!(top_k_indices(&[0.1], 3), vec![0]);
        assert!(top_k_indices(&[], 3).is_empty());
    }

    #[test]
    fn test_recommend_orders_by_score() {
        let candidates = vec![
            candidate("far", 3000.0),
            candidate("exact", 2000.0),
            candidate("near", 2100.0),
            candidate("close", 2010.0),
        ];

        let result = recommender(Arc::new(GlaScorer))
            .recommend(&subject(), &candidates)
            .unwrap();

        let addresses: Vec<&str> = result
            .comps
            .iter()
            .map(|c| c.record["address"].as_str().unwrap())
            .collect();
        assert_eq!(addresses, vec!["exact", "close", "near"]);
        assert_eq!(result.comps[0].index, 1);
        assert_eq!(result.comps[0].score, 1.0);
        assert_eq!(result.candidates_scored, 4);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let candidates: Vec<Value> = (0..5)
            .map(|i| candidate(&format!("c{}", i), 2000.0 + i as f64))
            .collect();

        let result = recommender(Arc::new(ConstantScorer))
            .recommend(&subject(), &candidates)
            .unwrap();
        let indices: Vec<usize> = result.comps.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_malformed_candidates_are_dropped() {
        let candidates = vec![
            json!({"address": "no coords", "gla": 2000, "close_date": "2025-04-01"}),
            candidate("ok", 2500.0),
            json!(42),
            json!({"address": "bad date", "gla": 2000, "latitude": 40.0,
                   "longitude": -75.0, "close_date": "tomorrow"}),
        ];

        let result = recommender(Arc::new(GlaScorer))
            .recommend(&subject(), &candidates)
            .unwrap();
        assert_eq!(result.comps.len(), 1);
        assert_eq!(result.comps[0].record["address"], "ok");
        assert_eq!(result.candidates_skipped, 3);
    }

    #[test]
    fn test_undated_subject_still_gets_comps() {
        let subject = PropertyRecord::from_value(&json!({
            "gla": 2000,
            "lot_size": 5000,
            "latitude": 40.0,
            "longitude": -75.0
        }))
        .unwrap();
        let candidates = vec![candidate("a", 2400.0), candidate("b", 2100.0)];

        let result = recommender(Arc::new(GlaScorer))
            .recommend(&subject, &candidates)
            .unwrap();
        let indices: Vec<usize> = result.comps.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 0]);
        assert_eq!(result.candidates_skipped, 0);
        assert_eq!(result.comps[0].features.month_diff, DEFAULT_LOOKBACK_MONTHS);
    }

    #[test]
    fn test_no_survivors_is_empty_not_error() {
        let result = recommender(Arc::new(GlaScorer))
            .recommend(&subject(), &[json!("x"), json!(null)])
            .unwrap();
        assert!(result.comps.is_empty());

        let result = recommender(Arc::new(GlaScorer))
            .recommend(&subject(), &[])
            .unwrap();
        assert!(result.comps.is_empty());
    }

    #[test]
    fn test_result_length_is_min_of_k_and_survivors() {
        let rec = recommender(Arc::new(GlaScorer));
        for n in 0..6 {
            let candidates: Vec<Value> = (0..n)
                .map(|i| candidate(&format!("c{}", i), 1900.0 + i as f64 * 10.0))
                .collect();
            let result = rec.recommend(&subject(), &candidates).unwrap();
            assert_eq!(result.comps.len(), n.min(TOP_K));
        }
    }

    #[test]
    fn test_scaler_is_applied_before_classifier() {
        // Shifting gla_diff by its mean makes the exact match (diff 0) score
        // as if it were 100 sqft off.
        let scaler = FeatureScaler::from_stats([-100.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]);
        let rec = CompRecommender::new(scaler, Arc::new(GlaScorer));
        let scores = rec.score(&[[0.0, 0.0, 0.0, 0.0]]).unwrap();
        assert!((scores[0] - 1.0 / 101.0).abs() < 1e-12);
    }
}
