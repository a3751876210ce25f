// src/lib.rs
pub mod api;
pub mod cleaning;
pub mod config;
pub mod features;
pub mod model;
pub mod models;
pub mod ranking;
pub mod training;

// Re-export common types for easier access
pub use features::{build_features, FeatureError, FeatureVector};
pub use model::{Classifier, FeatureScaler, GradientBoostedClassifier, ModelBundle, ModelInfo};
pub use models::{Appraisal, AppraisalId, Dataset, PropertyRecord};
pub use ranking::{CompRecommender, Recommendation, ScoredComp};
pub use training::{train_model, TrainingOptions, ValidationReport};
