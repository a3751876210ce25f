// src/bin/clean_dataset.rs
//
// Usage: clean_dataset [INPUT] [OUTPUT]
// Normalizes numbers, dates and coordinates in a raw appraisal dataset.

use anyhow::{Context, Result};
use log::info;
use serde_json::Value;

use comps_lib::cleaning::clean_dataset;
use comps_lib::config::DEFAULT_DATASET_PATH;

const DEFAULT_INPUT_PATH: &str = "appraisals_dataset.json";

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let mut args = std::env::args().skip(1);
    let input = args.next().unwrap_or_else(|| DEFAULT_INPUT_PATH.to_string());
    let output = args
        .next()
        .unwrap_or_else(|| DEFAULT_DATASET_PATH.to_string());

    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read raw dataset {}", input))?;
    let mut data: Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", input))?;

    let stats = clean_dataset(&mut data);
    info!(
        "Cleaned {} appraisals, {} candidates, {} comps ({} dates could not be parsed)",
        stats.appraisals, stats.candidates, stats.comps, stats.unparsed_dates
    );

    let pretty = serde_json::to_string_pretty(&data).context("Failed to serialize dataset")?;
    std::fs::write(&output, pretty)
        .with_context(|| format!("Failed to write cleaned dataset to {}", output))?;
    info!("Cleaned data saved to {}", output);

    Ok(())
}
