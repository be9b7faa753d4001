use axum::{http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
  /// Human-readable error message
  pub error: String,
  /// Machine-readable error type code
  pub error_type: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>, error_type: &str) -> ApiError {
  (
    status,
    Json(ErrorResponse {
      error: error.into(),
      error_type: error_type.to_string(),
    }),
  )
}

pub fn internal_error(error: impl Into<String>) -> ApiError {
  api_error(StatusCode::INTERNAL_SERVER_ERROR, error, "INTERNAL_ERROR")
}

pub fn unauthorized(error: impl Into<String>) -> ApiError {
  api_error(StatusCode::UNAUTHORIZED, error, "UNAUTHORIZED")
}
