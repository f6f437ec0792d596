//! Error types for the PDF Analyzer server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::ocr::OcrError;
use crate::render::RenderError;
use crate::session::SessionError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload exceeds the {max} byte limit")]
    PayloadTooLarge { max: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                self.to_string(),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Session(e) => {
                let status = e.status_code();
                let error_type = match e {
                    SessionError::NotFound(_) => "not_found",
                    SessionError::Expired(_) => "session_expired",
                    SessionError::Busy { .. } => "session_busy",
                    SessionError::NotReady { .. } => "session_not_ready",
                    SessionError::Io(_) => "io_error",
                };
                if status.is_server_error() {
                    tracing::error!("Session error: {}", e);
                    (status, error_type, "Session storage error".to_string())
                } else {
                    (status, error_type, e.to_string())
                }
            }
            AppError::Render(e) => {
                tracing::error!("Render error: {}", e);
                match e {
                    RenderError::InvalidDocument(_) | RenderError::ToolFailed { .. } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "render_error",
                        "Failed to render PDF pages".to_string(),
                    ),
                    RenderError::ToolUnavailable(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "renderer_unavailable",
                        "PDF renderer is not available".to_string(),
                    ),
                    RenderError::Io(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "io_error",
                        "IO error".to_string(),
                    ),
                }
            }
            AppError::Ocr(e) => {
                tracing::error!("OCR error: {}", e);
                (e.status_code(), "ocr_error", e.to_string())
            }
            AppError::Archive(e) => {
                tracing::error!("Archive error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "archive_error",
                    "Failed to build ZIP archive".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
