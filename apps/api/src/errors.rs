use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::apply::repository::StoreError;

/// Message returned for any submission missing a field or the CV.
pub const MISSING_FIELDS_MESSAGE: &str = "All fields are required, including the CV.";

/// Message returned when the application could not be stored.
pub const PERSISTENCE_FAILED_MESSAGE: &str = "Error submitting application";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed request body: {message}")]
    MalformedBody { status: StatusCode, message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl AppError {
    pub fn missing_fields() -> Self {
        AppError::Validation(MISSING_FIELDS_MESSAGE.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::MalformedBody {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::MalformedBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::MalformedBody { status, message } => {
                tracing::warn!("Rejected malformed multipart body: {message}");
                (status, message)
            }
            AppError::Persistence(e) => {
                tracing::error!("Error saving application: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PERSISTENCE_FAILED_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
