//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Catalog failures map to HTTP status codes with a JSON body of error code,
//! message and optional details. Internal error details are never returned
//! to clients.
//!
//! Import endpoints do not use this type for their outcome payload; see
//! [`crate::routes::frameworks::ImportResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::catalog::CatalogError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "SCOPE_MISMATCH").
    pub code: String,
    pub message: String,
    /// Additional context for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Structural validation failed (422). Carries every violation.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Body could not be parsed or holds invalid values (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Tenant is not on the configured allow-list (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Framework and project scopes differ (422).
    #[error("{0}")]
    ScopeMismatch(String),

    /// Detach would leave the project with no framework (409).
    #[error("{0}")]
    LastFrameworkInvariant(String),

    /// Conflict with current state (409).
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// 500. Logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),

    /// 503.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::ScopeMismatch(_) => (StatusCode::UNPROCESSABLE_ENTITY, "SCOPE_MISMATCH"),
            Self::LastFrameworkInvariant(_) => (StatusCode::CONFLICT, "LAST_FRAMEWORK_INVARIANT"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let details = match self {
            Self::Validation { details, .. } | Self::Conflict { details, .. } => details,
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::FrameworkNotFound(_)
            | CatalogError::ProjectNotFound(_)
            | CatalogError::ImplementationNotFound(_)
            | CatalogError::NotAttached { .. } => Self::NotFound(err.to_string()),
            CatalogError::Invalid(ref issues) => Self::Validation {
                message: err.to_string(),
                details: serde_json::to_value(issues).ok(),
            },
            CatalogError::ScopeMismatch { .. } => Self::ScopeMismatch(err.to_string()),
            CatalogError::LastFramework(_) => Self::LastFrameworkInvariant(err.to_string()),
            CatalogError::InUse { ref projects, .. } => Self::Conflict {
                details: Some(serde_json::json!({ "projectIds": projects })),
                message: err.to_string(),
            },
            CatalogError::Conflict(message) => Self::conflict(message),
            CatalogError::BadRequest(message) => Self::BadRequest(message),
            CatalogError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}
