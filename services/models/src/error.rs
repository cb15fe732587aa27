use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::upload::SUPPORTED_FORMATS;

/// Errors surfaced by model and animation operations
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unsupported file format '{extension}'. Supported: {}", SUPPORTED_FORMATS.join(", "))]
    UnsupportedFormat { extension: String },

    #[error("Model not found")]
    NotFound(String),

    #[error("File not found on disk")]
    FileMissing(String),

    #[error("Unknown animation '{name}'. Available: {}", .available.join(", "))]
    UnknownAnimation {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("Failed to save file: {0}")]
    StorageWrite(#[source] std::io::Error),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model id {0} is already registered")]
    DuplicateId(String),
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

impl ModelError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ModelError::UnsupportedFormat { .. }
            | ModelError::UnknownAnimation { .. }
            | ModelError::InvalidUpload(_)
            | ModelError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ModelError::NotFound(_) | ModelError::FileMissing(_) => StatusCode::NOT_FOUND,
            ModelError::StorageWrite(_) | ModelError::DuplicateId(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code sent alongside the detail message
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ModelError::NotFound(_) => "NOT_FOUND",
            ModelError::FileMissing(_) => "FILE_MISSING",
            ModelError::UnknownAnimation { .. } => "UNKNOWN_ANIMATION",
            ModelError::StorageWrite(_) => "STORAGE_WRITE_ERROR",
            ModelError::InvalidUpload(_) => "INVALID_UPLOAD",
            ModelError::InvalidRequest(_) => "INVALID_REQUEST",
            ModelError::DuplicateId(_) => "DUPLICATE_ID",
        }
    }
}

impl IntoResponse for ModelError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "Request failed");
        }

        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
