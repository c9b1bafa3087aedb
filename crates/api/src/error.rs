//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::PolicyStoreError;
use settlement::SettlementError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Settlement saga error.
    Settlement(SettlementError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Settlement(err) => settlement_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn settlement_error_to_response(err: SettlementError) -> (StatusCode, String) {
    match &err {
        SettlementError::Validation(_)
        | SettlementError::UnknownPremium(_)
        | SettlementError::Precondition(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        SettlementError::PolicyNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SettlementError::SagaInFlight(_) => (StatusCode::CONFLICT, err.to_string()),
        SettlementError::Store(PolicyStoreError::Conflict(_)) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        SettlementError::Store(PolicyStoreError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}
