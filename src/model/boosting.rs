// src/model/boosting.rs
//
// Binary gradient boosting with logistic loss. Each round fits a SmartCore
// regression tree to the current residuals (label - probability).

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;

use super::{Classifier, ModelError};
use crate::config::{BOOSTING_LEARNING_RATE, BOOSTING_MAX_DEPTH, BOOSTING_ROUNDS};
use crate::features::FeatureRow;

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

// Keeps the base log-odds finite when the training set has a single class
const PRIOR_CLAMP: f64 = 1e-6;
// Stop early once residuals are this small
const RESIDUAL_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParameters {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for BoostingParameters {
    fn default() -> Self {
        Self {
            n_rounds: BOOSTING_ROUNDS,
            learning_rate: BOOSTING_LEARNING_RATE,
            max_depth: BOOSTING_MAX_DEPTH,
            min_samples_leaf: 1,
            min_samples_split: 2,
        }
    }
}

impl BoostingParameters {
    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.max_depth)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(self.min_samples_split)
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

fn to_matrix(rows: &[FeatureRow]) -> DenseMatrix<f64> {
    let rows_2d: Vec<Vec<f64>> = rows.iter().map(|row| row.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows_2d)
}

fn log_loss(labels: &[f64], margins: &[f64]) -> f64 {
    let total: f64 = labels
        .iter()
        .zip(margins.iter())
        .map(|(y, m)| {
            let p = sigmoid(*m).clamp(PRIOR_CLAMP, 1.0 - PRIOR_CLAMP);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}

/// Gradient-boosted tree ensemble producing P(candidate is a comp).
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    params: BoostingParameters,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl fmt::Debug for GradientBoostedClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientBoostedClassifier")
            .field("params", &self.params)
            .field("base_score", &self.base_score)
            .field("trees", &self.trees.len())
            .finish()
    }
}

impl GradientBoostedClassifier {
    pub fn fit(
        rows: &[FeatureRow],
        labels: &[bool],
        params: BoostingParameters,
    ) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if rows.len() != labels.len() {
            return Err(ModelError::LengthMismatch {
                expected: rows.len(),
                got: labels.len(),
            });
        }

        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let positives = y.iter().sum::<f64>();
        if positives == 0.0 || positives == y.len() as f64 {
            warn!(
                "Training set has a single class ({} rows, {} positive); scores will be flat",
                y.len(),
                positives
            );
        }

        let prior = (positives / y.len() as f64).clamp(PRIOR_CLAMP, 1.0 - PRIOR_CLAMP);
        let base_score = (prior / (1.0 - prior)).ln();

        let x = to_matrix(rows);
        let tree_params = params.tree_parameters();
        let mut margins = vec![base_score; rows.len()];
        let mut trees = Vec::with_capacity(params.n_rounds);

        info!(
            "Fitting gradient boosting: {} rows, {} positive, {} rounds, lr {}, depth {}",
            rows.len(),
            positives,
            params.n_rounds,
            params.learning_rate,
            params.max_depth
        );

        for round in 0..params.n_rounds {
            let residuals: Vec<f64> = y
                .iter()
                .zip(margins.iter())
                .map(|(target, margin)| target - sigmoid(*margin))
                .collect();

            if residuals.iter().all(|r| r.abs() < RESIDUAL_TOLERANCE) {
                debug!("Residuals vanished after {} rounds", round);
                break;
            }

            let tree = RegressionTree::fit(&x, &residuals, tree_params.clone())
                .map_err(|e| ModelError::Fit(e.to_string()))?;
            let step = tree
                .predict(&x)
                .map_err(|e| ModelError::Fit(e.to_string()))?;

            for (margin, delta) in margins.iter_mut().zip(step.iter()) {
                *margin += params.learning_rate * delta;
            }
            trees.push(tree);

            if (round + 1) % 25 == 0 {
                debug!(
                    "Round {}: training log-loss {:.5}",
                    round + 1,
                    log_loss(&y, &margins)
                );
            }
        }

        info!(
            "Gradient boosting complete: {} trees, final training log-loss {:.5}",
            trees.len(),
            log_loss(&y, &margins)
        );

        Ok(Self {
            params,
            base_score,
            trees,
        })
    }

    pub fn params(&self) -> &BoostingParameters {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for GradientBoostedClassifier {
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let x = to_matrix(rows);
        let mut margins = vec![self.base_score; rows.len()];
        for tree in &self.trees {
            let step = tree
                .predict(&x)
                .map_err(|e| ModelError::Predict(e.to_string()))?;
            for (margin, delta) in margins.iter_mut().zip(step.iter()) {
                *margin += self.params.learning_rate * delta;
            }
        }

        Ok(margins.into_iter().map(sigmoid).collect())
    }

    fn name(&self) -> &str {
        "gradient_boosted_trees"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small gla_diff means comp; everything else is noise-free
    fn separable() -> (Vec<FeatureRow>, Vec<bool>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let gla_diff = i as f64 * 50.0;
            rows.push([gla_diff, 100.0, 1.0, 0.5]);
            labels.push(i < 5);
        }
        (rows, labels)
    }

    #[test]
    fn test_fit_separates_classes() {
        let (rows, labels) = separable();
        let params = BoostingParameters {
            n_rounds: 20,
            ..Default::default()
        };
        let model = GradientBoostedClassifier::fit(&rows, &labels, params).unwrap();
        let probs = model.predict_proba(&rows).unwrap();

        assert_eq!(probs.len(), rows.len());
        for (p, label) in probs.iter().zip(labels.iter()) {
            assert!((0.0..=1.0).contains(p));
            if *label {
                assert!(*p > 0.5, "positive scored {}", p);
            } else {
                assert!(*p < 0.5, "negative scored {}", p);
            }
        }
    }

    #[test]
    fn test_predictions_are_deterministic() {
        let (rows, labels) = separable();
        let params = BoostingParameters {
            n_rounds: 10,
            ..Default::default()
        };
        let model = GradientBoostedClassifier::fit(&rows, &labels, params).unwrap();
        assert_eq!(
            model.predict_proba(&rows).unwrap(),
            model.predict_proba(&rows).unwrap()
        );
    }

    #[test]
    fn test_single_class_gives_flat_low_scores() {
        let rows = vec![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let model = GradientBoostedClassifier::fit(
            &rows,
            &[false, false],
            BoostingParameters::default(),
        )
        .unwrap();

        let probs = model.predict_proba(&rows).unwrap();
        assert!(probs.iter().all(|p| *p < 0.01));
    }

    #[test]
    fn test_empty_input() {
        let model = GradientBoostedClassifier::fit(
            &[[0.0; 4], [1.0; 4]],
            &[false, true],
            BoostingParameters::default(),
        )
        .unwrap();
        assert!(model.predict_proba(&[]).unwrap().is_empty());

        assert!(matches!(
            GradientBoostedClassifier::fit(&[], &[], BoostingParameters::default()),
            Err(ModelError::EmptyTrainingSet)
        ));
        assert!(matches!(
            GradientBoostedClassifier::fit(&[[0.0; 4]], &[], BoostingParameters::default()),
            Err(ModelError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_serde_round_trip_preserves_scores() {
        let (rows, labels) = separable();
        let params = BoostingParameters {
            n_rounds: 5,
            ..Default::default()
        };
        let model = GradientBoostedClassifier::fit(&rows, &labels, params).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostedClassifier = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.n_trees(), model.n_trees());
        let before = model.predict_proba(&rows).unwrap();
        let after = restored.predict_proba(&rows).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
