//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients get a JSON body
//! `{"success": false, "error": "..."}` without internal details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{DocumentError, ServiceError};
use crate::store::StoreError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Document rendering failed.
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Form(e) => Self::BadRequest(e.to_string()),
            ServiceError::Record(e) => Self::Internal(e.to_string()),
            ServiceError::Store(e) => Self::Store(e),
            ServiceError::Document(e) => Self::Document(e),
            ServiceError::NotFound(what) => Self::NotFound(what),
        }
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::CustomerNotFound(_)) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(StoreError::Backend(_)) => StatusCode::BAD_GATEWAY,
            Self::Store(StoreError::Corrupt { .. }) | Self::Document(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(StoreError::Conflict(_)) => {
                "The submission was modified concurrently, please retry".to_string()
            }
            Self::Store(StoreError::CustomerNotFound(_)) => "Customer not found".to_string(),
            Self::Store(StoreError::Backend(_)) => "External service error".to_string(),
            Self::Store(StoreError::Corrupt { .. }) | Self::Document(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
