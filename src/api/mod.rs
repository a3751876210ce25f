// src/api/mod.rs
pub mod handlers;
pub mod response;

pub use handlers::{create_api_routes, AppState, CompExplanation, CompsResponse};
pub use response::{api_success, ApiError, ApiResponse, ApiResult};
