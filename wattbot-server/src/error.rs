//! HTTP error mapping
//!
//! The only place where the domain taxonomy becomes status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Domain error, mapped by variant
    #[error(transparent)]
    Common(#[from] wattbot_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        use wattbot_common::Error as E;

        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Common(err) => match err {
                E::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                E::NoNumberDetected => (StatusCode::UNPROCESSABLE_ENTITY, "NO_NUMBER_DETECTED"),
                E::DuplicatePeriod(_) => (StatusCode::CONFLICT, "DUPLICATE_PERIOD"),
                E::NoPriceFound(_) => (StatusCode::UNPROCESSABLE_ENTITY, "NO_PRICE_FOUND"),
                E::UnreadableImage(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNREADABLE_IMAGE"),
                E::Detector(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DETECTOR_ERROR"),
                E::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = match &self {
            ApiError::Common(wattbot_common::Error::NotFound(msg)) => msg.clone(),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!(code = error_code, error = %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
