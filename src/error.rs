// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.
//!
//! Error kinds are non-overlapping: each failure surfaces exactly one kind
//! plus a message localizable via [`crate::locale`]. `Transient` is the only
//! kind callers are expected to retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Caller not authorized: {0}")]
    Permission(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("QR token does not match activity")]
    InvalidToken,

    #[error("Activity is not open for validation today")]
    OutOfWindow,

    #[error("Activity already validated by this member")]
    AlreadyValidated,

    #[error("Badge already held: {0}")]
    AlreadyHeld(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Temporary failure, retry: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind string for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::Permission(_) => "permission",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidToken => "invalid_token",
            AppError::OutOfWindow => "out_of_window",
            AppError::AlreadyValidated => "already_validated",
            AppError::AlreadyHeld(_) => "already_held",
            AppError::Precondition(_) => "precondition",
            AppError::Transient(_) => "transient",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller should retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, None),
            AppError::Permission(msg) => (StatusCode::FORBIDDEN, Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone())),
            AppError::InvalidToken => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::OutOfWindow => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::AlreadyValidated => (StatusCode::CONFLICT, None),
            AppError::AlreadyHeld(msg) => (StatusCode::CONFLICT, Some(msg.clone())),
            AppError::Precondition(msg) => (StatusCode::PRECONDITION_FAILED, Some(msg.clone())),
            AppError::Transient(msg) => {
                tracing::warn!(error = %msg, "Transient failure returned to caller");
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: self.kind().to_string(),
            details,
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
