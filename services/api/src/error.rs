//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! to HTTP responses. Every handler returns `Result<_, ApiError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quillwright_core::{AccessDenied, BookError, ExportError, PortError, QuotaExceeded};
use serde_json::json;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Book(#[from] BookError),

    #[error(transparent)]
    Access(#[from] AccessDenied),

    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The model answered with nothing usable.
    #[error("AI returned an empty response, please retry")]
    EmptyGeneration,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Port(PortError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Book(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Port(PortError::Conflict(_) | PortError::InvalidInput(_))
            | Self::Book(_)
            | Self::Export(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Access(AccessDenied::NotFound) => StatusCode::NOT_FOUND,
            Self::Access(AccessDenied::Forbidden) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Quota(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Config(_)
            | Self::Port(PortError::Unexpected(_))
            | Self::Database(_)
            | Self::Io(_)
            | Self::EmptyGeneration
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Server-side details are not exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Config(_)
            | Self::Port(PortError::Unexpected(_))
            | Self::Database(_)
            | Self::Io(_)
            | Self::Internal(_) => "Internal server error".to_string(),
            Self::Port(PortError::NotFound(what)) => what.clone(),
            Self::Port(PortError::Conflict(what) | PortError::InvalidInput(what)) => what.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({ "success": false, "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `ApiError`.
pub type ApiResult<T> = Result<T, ApiError>;
