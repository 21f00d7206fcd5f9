//! API error type with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::CoordinatorError;
use saga_store::SagaStoreError;

/// Operational-endpoint error.
#[derive(Debug)]
pub enum ApiError {
    /// A dependency (store, broker) failed.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Internal(message) = self;
        tracing::error!(error = %message, "internal server error");
        let body = serde_json::json!({ "error": message });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}

impl From<SagaStoreError> for ApiError {
    fn from(err: SagaStoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
