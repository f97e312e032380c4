//! REST error mapping.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::registry::error::{RegistryError, Violation};

/// Errors returned by the REST surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Validation error: {message}")]
    Validation { message: String, violations: Vec<Violation> },

    #[error("Upstream unavailable: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "ALREADY_EXISTS",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Validation { .. } => "VALIDATION_FAILED",
            ApiError::Upstream(_) => "UPSTREAM_UNAVAILABLE",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Upstream(msg) => msg.clone(),
            ApiError::Validation { message, .. } => message.clone(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// Per-key violations; empty unless validation failed.
    pub details: Vec<Violation>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: &ApiError) -> Self {
        let details = match error {
            ApiError::Validation { violations, .. } => violations.clone(),
            _ => Vec::new(),
        };
        Self {
            code: error.error_code().to_string(),
            message: error.message(),
            details,
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::warn!(code = self.error_code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "Request rejected");
        }
        (status_code, Json(ErrorResponse::new(&self))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::ServiceNotFound(_)
            | RegistryError::ReplicaNotFound { .. }
            | RegistryError::VariableNotFound { .. } => ApiError::NotFound(message),
            RegistryError::AlreadyExists(_) => ApiError::Conflict(message),
            RegistryError::ValidationFailed(_) | RegistryError::DefinitionMissing(_) => ApiError::Validation {
                violations: err.violations(),
                message,
            },
            RegistryError::UpstreamUnavailable { .. } => ApiError::Upstream(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
