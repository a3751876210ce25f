// src/training/mod.rs
//
// Offline training: label every subject/candidate pair, split by appraisal,
// fit the scaler and classifier on the training side, report on the rest.

pub mod evaluation;
pub mod split;

use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{SPLIT_SEED, VALIDATION_FRACTION};
use crate::features::{extract_candidate_features, FeatureRow, FeatureVector};
use crate::model::{BoostingParameters, FeatureScaler, GradientBoostedClassifier, ModelBundle};
use crate::models::{Appraisal, AppraisalId, PropertyRecord};
use crate::ranking::CompRecommender;

pub use evaluation::ValidationReport;
pub use split::{split_by_appraisal, GroupSplit};

/// One labeled subject/candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub appraisal_id: AppraisalId,
    pub candidate_index: usize,
    pub features: FeatureVector,
    /// Whether the appraiser picked this candidate as a comp.
    pub label: bool,
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub boosting: BoostingParameters,
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            boosting: BoostingParameters::default(),
            validation_fraction: VALIDATION_FRACTION,
            seed: SPLIT_SEED,
        }
    }
}

/// Builds labeled rows for every appraisal, grouped by appraisal in input order.
/// Candidates whose features fail are skipped.
pub fn build_training_rows(appraisals: &[Appraisal]) -> Vec<TrainingRow> {
    let mut rows = Vec::new();
    let mut skipped = 0;

    for appraisal in appraisals {
        let comp_addresses: HashSet<String> = appraisal.comp_addresses().into_iter().collect();
        let extracted = extract_candidate_features(&appraisal.subject, &appraisal.candidates);

        for (index, err) in &extracted.rejected {
            warn!(
                "Skipping candidate {} of appraisal {}: {}",
                index, appraisal.order_id, err
            );
        }
        skipped += extracted.rejected.len();

        for (index, features) in extracted.accepted {
            let label = PropertyRecord::from_value(&appraisal.candidates[index])
                .and_then(|candidate| candidate.normalized_address())
                .is_some_and(|address| comp_addresses.contains(&address));

            rows.push(TrainingRow {
                appraisal_id: appraisal.order_id.clone(),
                candidate_index: index,
                features,
                label,
            });
        }
    }

    info!(
        "Built {} training rows from {} appraisals ({} candidates skipped, {} positive)",
        rows.len(),
        appraisals.len(),
        skipped,
        rows.iter().filter(|r| r.label).count()
    );
    rows
}

/// Trains a scaler/classifier pair and evaluates it on held-out appraisals.
pub fn train_model(appraisals: &[Appraisal], options: &TrainingOptions) -> Result<ModelBundle> {
    let rows = build_training_rows(appraisals);
    if rows.is_empty() {
        anyhow::bail!("No valid data processed - check dataset formatting");
    }

    let split = split_by_appraisal(&rows, options.validation_fraction, options.seed);
    let (train_rows, validation_rows) = split.partition(&rows);
    info!(
        "Split {} appraisals: {} train ({} rows), {} validation ({} rows)",
        split.train_ids.len() + split.validation_ids.len(),
        split.train_ids.len(),
        train_rows.len(),
        split.validation_ids.len(),
        validation_rows.len()
    );

    let train_features: Vec<FeatureRow> =
        train_rows.iter().map(|r| r.features.to_row()).collect();
    let train_labels: Vec<bool> = train_rows.iter().map(|r| r.label).collect();

    let scaler = FeatureScaler::fit(&train_features).context("Failed to fit feature scaler")?;
    let scaled = scaler.transform(&train_features);
    let classifier = GradientBoostedClassifier::fit(&scaled, &train_labels, options.boosting)
        .context("Failed to train classifier")?;

    let classifier = Arc::new(classifier);
    let recommender = CompRecommender::new(scaler.clone(), classifier.clone());

    let validation = if validation_rows.is_empty() {
        warn!("No validation appraisals; skipping evaluation");
        None
    } else {
        let report = evaluation::evaluate(&validation_rows, &recommender)
            .context("Failed to evaluate on validation appraisals")?;
        info!(
            "Validation over {} appraisals: precision@{} = {:.3}, recall@{} = {:.3}",
            report.appraisals_evaluated,
            report.k,
            report.precision_at_k,
            report.k,
            report.recall_at_k
        );
        Some(report)
    };

    drop(recommender);
    let classifier = Arc::try_unwrap(classifier)
        .map_err(|_| anyhow::anyhow!("Classifier still shared after evaluation"))?;

    Ok(ModelBundle::new(scaler, classifier, validation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dataset;
    use serde_json::json;

    fn appraisal(order_id: &str) -> serde_json::Value {
        json!({
            "orderID": order_id,
            "subject": {
                "gla": 1800,
                "lot_size": 6000,
                "latitude": 45.0,
                "longitude": -63.0,
                "effective_date": "Mar/01/2025"
            },
            "properties": [
                {"address": "10 Comp Rd", "gla": 1810, "lot_size_sf": 6100,
                 "latitude": 45.001, "longitude": -63.0, "close_date": "2025-02-01"},
                {"address": "20 Far Ave", "gla": 3200, "lot_size_sf": 20000,
                 "latitude": 45.5, "longitude": -63.4, "close_date": "2023-06-01"},
                {"address": "30 Broken St", "gla": 1800, "latitude": 45.0,
                 "longitude": -63.0, "close_date": "unknown"},
                {"address": "40 Mid Ln", "gla": 2400, "lot_size_sf": 9000,
                 "latitude": 45.1, "longitude": -63.1, "close_date": "2024-09-01"}
            ],
            "comps": [{"address": "  10 COMP RD "}]
        })
    }

    fn dataset(n: usize) -> Dataset {
        let appraisals: Vec<serde_json::Value> =
            (0..n).map(|i| appraisal(&format!("{}", 1000 + i))).collect();
        serde_json::from_value(json!({ "appraisals": appraisals })).unwrap()
    }

    #[test]
    fn test_build_training_rows_labels_by_address() {
        let rows = build_training_rows(&dataset(1).appraisals);

        assert_eq!(rows.len(), 3);
        let labels: Vec<(usize, bool)> = rows.iter().map(|r| (r.candidate_index, r.label)).collect();
        assert_eq!(labels, vec![(0, true), (1, false), (3, false)]);
        assert_eq!(rows[0].features.gla_diff, 10.0);
    }

    #[test]
    fn test_train_model_end_to_end() {
        let options = TrainingOptions {
            boosting: BoostingParameters {
                n_rounds: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let bundle = train_model(&dataset(10).appraisals, &options).unwrap();

        let report = bundle.validation.clone().unwrap();
        assert_eq!(report.appraisals_evaluated, 2);
        assert_eq!(report.precision_at_k, 1.0 / 3.0);
        assert_eq!(report.recall_at_k, 1.0);
        assert_eq!(bundle.feature_names.len(), 4);
    }

    #[test]
    fn test_train_model_without_rows_fails() {
        let mut data = dataset(2);
        for appraisal in data.appraisals.iter_mut() {
            appraisal.candidates.clear();
        }
        assert!(train_model(&data.appraisals, &TrainingOptions::default()).is_err());
    }
}
