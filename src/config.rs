// src/config.rs

use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

// Number of comps returned per request
pub const TOP_K: usize = 3;

// Feature layout, in vector order
pub const FEATURE_NAMES: [&str; 4] = ["gla_diff", "lot_diff", "month_diff", "distance"];
pub const NUM_FEATURES: usize = FEATURE_NAMES.len();

// Haversine constants
pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const MILES_PER_KM: f64 = 0.621371;

// Days per month bucket for the sale date difference
pub const DAYS_PER_MONTH: i64 = 30;

// month_diff used when either sale date is absent
pub const DEFAULT_LOOKBACK_MONTHS: f64 = 120.0;

// Gradient boosting defaults (mirrors the usual XGBoost defaults)
pub const BOOSTING_ROUNDS: usize = 100;
pub const BOOSTING_LEARNING_RATE: f64 = 0.3;
pub const BOOSTING_MAX_DEPTH: u16 = 6;

// Train/validation split by appraisal
pub const VALIDATION_FRACTION: f64 = 0.2;
pub const SPLIT_SEED: u64 = 42;

pub const DEFAULT_DATASET_PATH: &str = "cleaned_appraisals.json";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Runtime settings for the server and the offline binaries.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dataset_path: PathBuf,
    /// Saved model bundle. When unset the server trains at startup.
    pub model_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let dataset_path: PathBuf = std::env::var("DATASET_PATH")
            .unwrap_or_else(|_| DEFAULT_DATASET_PATH.to_string())
            .into();
        let model_path = std::env::var("MODEL_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT value: {}", raw))?,
            Err(_) => DEFAULT_PORT,
        };
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string());

        Ok(Self {
            dataset_path,
            model_path,
            host,
            port,
            cors_origin,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads the first `.env` file found, falling back to the process environment.
pub fn load_env() {
    let env_paths = [".env", ".env.local", "../.env"];

    for path in env_paths.iter() {
        if Path::new(path).exists() && dotenv::from_path(path).is_ok() {
            info!("Loaded environment variables from {}", path);
            return;
        }
    }

    info!("No .env file found, using environment variables from system");
}
