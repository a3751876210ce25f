// src/model/mod.rs
//
// Scoring dependencies for the recommender: the feature scaler, the classifier
// seam and the serializable bundle that holds a trained pair of both.

mod boosting;
mod scaler;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use boosting::{BoostingParameters, GradientBoostedClassifier};
pub use scaler::FeatureScaler;

use crate::config::FEATURE_NAMES;
use crate::features::FeatureRow;
use crate::ranking::CompRecommender;
use crate::training::evaluation::ValidationReport;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no training rows available")]
    EmptyTrainingSet,
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("model fit failed: {0}")]
    Fit(String),
    #[error("prediction failed: {0}")]
    Predict(String),
}

/// Anything that can turn standardized feature rows into match probabilities.
///
/// The recommender only sees this trait, so tests can swap in fixed scorers
/// without training a model.
pub trait Classifier: Send + Sync {
    /// One probability in `[0, 1]` per input row, in input order.
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError>;

    fn name(&self) -> &str;
}

/// A trained scaler/classifier pair plus the metadata needed to serve it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelBundle {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub scaler: FeatureScaler,
    pub classifier: GradientBoostedClassifier,
    pub validation: Option<ValidationReport>,
}

impl ModelBundle {
    pub fn new(
        scaler: FeatureScaler,
        classifier: GradientBoostedClassifier,
        validation: Option<ValidationReport>,
    ) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler,
            classifier,
            validation,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self).context("Failed to serialize model bundle")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model bundle to {}", path.display()))?;
        info!("Saved model {} to {}", self.model_id, path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model bundle {}", path.display()))?;
        let bundle: ModelBundle = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model bundle in {}", path.display()))?;

        if bundle.feature_names != FEATURE_NAMES {
            anyhow::bail!(
                "Model bundle {} was trained on features {:?}, expected {:?}",
                path.display(),
                bundle.feature_names,
                FEATURE_NAMES
            );
        }

        info!(
            "Loaded model {} (trained {}) from {}",
            bundle.model_id,
            bundle.trained_at,
            path.display()
        );
        Ok(bundle)
    }

    /// Splits the bundle into a recommender and the metadata describing it.
    pub fn into_recommender(self) -> (CompRecommender, ModelInfo) {
        let info = ModelInfo {
            model_id: Some(self.model_id),
            trained_at: Some(self.trained_at),
            classifier: self.classifier.name().to_string(),
            feature_names: self.feature_names,
            scaler_means: self.scaler.means().to_vec(),
            scaler_scales: self.scaler.scales().to_vec(),
            validation: self.validation,
        };
        let recommender = CompRecommender::new(self.scaler, Arc::new(self.classifier));
        (recommender, info)
    }
}

/// Read-only description of the model being served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    pub classifier: String,
    pub feature_names: Vec<String>,
    pub scaler_means: Vec<f64>,
    pub scaler_scales: Vec<f64>,
    pub validation: Option<ValidationReport>,
}

impl ModelInfo {
    /// Metadata for a recommender assembled without a bundle (e.g. injected stubs).
    pub fn describe(recommender: &CompRecommender) -> Self {
        Self {
            model_id: None,
            trained_at: None,
            classifier: recommender.classifier_name().to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler_means: recommender.scaler().means().to_vec(),
            scaler_scales: recommender.scaler().scales().to_vec(),
            validation: None,
        }
    }
}
