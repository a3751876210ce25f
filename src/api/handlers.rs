// src/api/handlers.rs

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::response::{api_success, ApiError, ApiResult};
use crate::features::FeatureVector;
use crate::model::ModelInfo;
use crate::models::PropertyRecord;
use crate::ranking::CompRecommender;

// Keys a request may use for the embedded candidate list
const CANDIDATE_KEYS: &[&str] = &["candidates", "properties"];

// Application state
pub struct AppState {
    pub recommender: CompRecommender,
    pub model_info: ModelInfo,
}

#[derive(Debug, Serialize)]
pub struct CompExplanation {
    pub index: usize,
    pub score: f64,
    pub features: FeatureVector,
}

#[derive(Debug, Serialize)]
pub struct CompsResponse {
    pub comps: Vec<Value>,
    pub explanations: Vec<CompExplanation>,
}

// Create API routes for the recommender
pub fn create_api_routes(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/get_comps", post(get_comps))
        .route("/api/model", get(get_model_info))
        .with_state(app_state)
}

async fn health_check() -> &'static str {
    "OK"
}

// Score the candidates embedded in a subject record and return the best comps
async fn get_comps(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CompsResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::bad_request(rejection.body_text())
    })?;
    let Value::Object(mut subject) = body else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };

    let candidates = match CANDIDATE_KEYS.iter().find_map(|key| subject.remove(*key)) {
        Some(Value::Array(candidates)) => candidates,
        Some(_) => return Err(ApiError::bad_request("'candidates' must be an array")),
        None => return Err(ApiError::bad_request("Missing 'candidates' array")),
    };
    let subject = PropertyRecord(subject);

    let recommendation = state
        .recommender
        .recommend(&subject, &candidates)
        .map_err(|e| {
            error!("Scoring failed: {}", e);
            ApiError::internal(e.to_string())
        })?;

    debug!(
        "Scored {} candidates ({} skipped), returning {} comps",
        recommendation.candidates_scored,
        recommendation.candidates_skipped,
        recommendation.comps.len()
    );

    let explanations = recommendation
        .comps
        .iter()
        .map(|comp| CompExplanation {
            index: comp.index,
            score: comp.score,
            features: comp.features,
        })
        .collect();
    let comps = recommendation
        .comps
        .into_iter()
        .map(|comp| comp.record)
        .collect();

    Ok(Json(CompsResponse {
        comps,
        explanations,
    }))
}

// Describe the model currently being served
async fn get_model_info(State(state): State<Arc<AppState>>) -> ApiResult<ModelInfo> {
    api_success(state.model_info.clone())
}
