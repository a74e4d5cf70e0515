use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failure of a single ingestion attempt.
///
/// None of these are fatal: the cache keeps its previous snapshot and the
/// error is surfaced through the status endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Network failure, timeout or non-success HTTP status while pulling.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The feed document was not well-formed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A pushed snapshot payload was structurally invalid.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IngestError::Fetch(format!("request timed out: {}", e))
        } else {
            IngestError::Fetch(e.to_string())
        }
    }
}

impl From<roxmltree::Error> for IngestError {
    fn from(e: roxmltree::Error) -> Self {
        IngestError::Parse(e.to_string())
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Ingestion failure.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Missing or wrong sync token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Push endpoint called while the service runs in another mode.
    #[error("Push sync is disabled: {0}")]
    PushDisabled(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Calibre database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Ingest(IngestError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Ingest(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PushDisabled(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
