// src/api/response.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{success, data, error}` envelope used by the JSON API.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Status code plus message, rendered inside the envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::failed(self.message))).into_response()
    }
}

/// Enveloped handler result: `data` on success, `error` otherwise.
pub enum ApiResult<T: Serialize> {
    Success(T),
    Error(ApiError),
}

impl<T: Serialize> IntoResponse for ApiResult<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResult::Success(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
            ApiResult::Error(err) => err.into_response(),
        }
    }
}

impl<T: Serialize> From<ApiError> for ApiResult<T> {
    fn from(err: ApiError) -> Self {
        ApiResult::Error(err)
    }
}

pub fn api_success<T: Serialize>(data: T) -> ApiResult<T> {
    ApiResult::Success(data)
}
