// src/main.rs
use anyhow::{Context, Result};
use axum::http::HeaderValue;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use comps_lib::{
    api::{create_api_routes, AppState},
    config::{self, AppConfig},
    model::ModelBundle,
    models::Dataset,
    training::{train_model, TrainingOptions},
};

// Loads the saved bundle when there is one, otherwise trains from the dataset
// (and saves the result when MODEL_PATH points at a file that does not exist yet).
fn load_or_train(config: &AppConfig) -> Result<ModelBundle> {
    if let Some(model_path) = &config.model_path {
        if model_path.exists() {
            return ModelBundle::load(model_path);
        }
        warn!(
            "MODEL_PATH {} does not exist; training a new model",
            model_path.display()
        );
    }

    let start = Instant::now();
    let dataset = Dataset::load(&config.dataset_path)?;
    let bundle = train_model(&dataset.appraisals, &TrainingOptions::default())
        .context("Failed to train model at startup")?;
    info!("Trained model {} in {:.2?}", bundle.model_id, start.elapsed());

    if let Some(model_path) = &config.model_path {
        if let Err(e) = bundle.save(model_path) {
            warn!("Could not save trained model: {:#}", e);
        }
    }

    Ok(bundle)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting comparable-property recommendation service");
    config::load_env();
    let config = AppConfig::from_env()?;

    let bundle = load_or_train(&config)?;
    let (recommender, model_info) = bundle.into_recommender();
    let app_state = Arc::new(AppState {
        recommender,
        model_info,
    });

    let origin = HeaderValue::from_str(&config.cors_origin)
        .with_context(|| format!("Invalid CORS_ORIGIN: {}", config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_api_routes(app_state).layer(cors);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await?;

    info!("Recommendation service shutting down");
    Ok(())
}
