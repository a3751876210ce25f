// src/bin/train_model.rs
//
// Usage: train_model [DATASET_PATH] [OUTPUT_PATH]
// Arguments fall back to DATASET_PATH / MODEL_PATH from the environment.

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use comps_lib::config::{self, AppConfig};
use comps_lib::models::Dataset;
use comps_lib::training::{train_model, TrainingOptions};

const DEFAULT_MODEL_PATH: &str = "comp_model.json";

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    config::load_env();
    let config = AppConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    let dataset_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or(config.dataset_path);
    let output_path = args
        .next()
        .map(PathBuf::from)
        .or(config.model_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

    let start = Instant::now();
    let dataset = Dataset::load(&dataset_path)?;
    let bundle = train_model(&dataset.appraisals, &TrainingOptions::default())
        .context("Training failed")?;

    match &bundle.validation {
        Some(report) => info!(
            "Precision@{}: {:.3} over {} appraisals, Recall@{}: {:.3} over {} appraisals with comps",
            report.k,
            report.precision_at_k,
            report.appraisals_evaluated,
            report.k,
            report.recall_at_k,
            report.appraisals_with_comps
        ),
        None => info!("No validation appraisals were held out"),
    }

    bundle.save(&output_path)?;
    info!(
        "Model {} trained in {:.2?}",
        bundle.model_id,
        start.elapsed()
    );
    Ok(())
}
