// src/model/scaler.rs

use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::config::NUM_FEATURES;
use crate::features::FeatureRow;

/// Per-feature standardization to zero mean and unit variance.
///
/// Statistics are fit once on the training partition and then only applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    means: [f64; NUM_FEATURES],
    scales: [f64; NUM_FEATURES],
}

impl FeatureScaler {
    /// Fits means and population standard deviations.
    /// A constant feature gets scale 1.0 so it maps to 0 instead of NaN.
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let n = rows.len() as f64;
        let mut means = [0.0; NUM_FEATURES];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row.iter()) {
                *mean += value;
            }
        }
        for mean in means.iter_mut() {
            *mean /= n;
        }

        let mut scales = [0.0; NUM_FEATURES];
        for row in rows {
            for j in 0..NUM_FEATURES {
                scales[j] += (row[j] - means[j]).powi(2);
            }
        }
        for scale in scales.iter_mut() {
            let std = (*scale / n).sqrt();
            *scale = if std > f64::EPSILON && std.is_finite() {
                std
            } else {
                1.0
            };
        }

        Ok(Self { means, scales })
    }

    pub fn from_stats(means: [f64; NUM_FEATURES], scales: [f64; NUM_FEATURES]) -> Self {
        let scales = scales.map(|s| if s.abs() > f64::EPSILON { s } else { 1.0 });
        Self { means, scales }
    }

    /// Leaves rows untouched. Handy when a classifier expects raw features.
    pub fn identity() -> Self {
        Self {
            means: [0.0; NUM_FEATURES],
            scales: [1.0; NUM_FEATURES],
        }
    }

    pub fn transform_row(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = [0.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            out[j] = (row[j] - self.means[j]) / self.scales[j];
        }
        out
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Vec<FeatureRow> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn means(&self) -> &[f64; NUM_FEATURES] {
        &self.means
    }

    pub fn scales(&self) -> &[f64; NUM_FEATURES] {
        &self.scales
    }
}
