//! Analysis session endpoints
//!
//! Endpoints:
//! - POST /api/v1/sessions - Create a session
//! - GET /api/v1/sessions/:id - Session status and progress
//! - DELETE /api/v1/sessions/:id - Delete a session and its files
//! - POST /api/v1/sessions/:id/pdf - Upload the PDF (multipart field `file` or `pdf`)
//! - POST /api/v1/sessions/:id/convert - Render pages to images
//! - POST /api/v1/sessions/:id/detect - Detect medical pages and build the ZIP
//! - GET /api/v1/sessions/:id/download - Download the ZIP

use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::analysis;
use crate::detect::Detection;
use crate::error::{AppError, Result};
use crate::session::{SessionSummary, DOWNLOAD_FILE_NAME};
use crate::state::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub session: SessionSummary,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    pub images: usize,
    pub message: String,
    pub session: SessionSummary,
}

#[derive(Serialize)]
pub struct DetectResponse {
    pub detected: usize,
    pub scanned: usize,
    pub skipped: usize,
    pub message: String,
    pub detections: Vec<Detection>,
    pub session: SessionSummary,
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/:id", get(get_session).delete(delete_session))
        .route("/:id/pdf", post(upload_pdf))
        .route("/:id/convert", post(convert))
        .route("/:id/detect", post(detect))
        .route("/:id/download", get(download))
        .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)))
}

/// POST /api/v1/sessions
async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionSummary>)> {
    let session = state.sessions().create_session().await?;
    Ok((StatusCode::CREATED, Json(session.summary())))
}

/// GET /api/v1/sessions/:id
async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionSummary>> {
    let session = state.sessions().get_session(&id).await?;
    Ok(Json(session.summary()))
}

/// DELETE /api/v1/sessions/:id
async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.sessions().delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/pdf
async fn upload_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>> {
    let max = state.config().sessions.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, max, "Failed to read upload"))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != "file" && name != "pdf" {
            tracing::debug!("Ignoring multipart field '{}'", name);
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload.pdf".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| upload_error(e, max, "Failed to read file data"))?;

        let session = analysis::upload_pdf(&state, &id, &filename, &data).await?;

        return Ok(Json(MessageResponse {
            message: "PDF uploaded successfully".to_string(),
            session: session.summary(),
        }));
    }

    tracing::warn!(session_id = %id, "No file field found in multipart upload");
    Err(AppError::BadRequest(
        "No file provided. Use field name 'file' or 'pdf'".to_string(),
    ))
}

/// A body cut off by the request size limit is reported as 413
fn upload_error(err: MultipartError, max: usize, context: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(max, "Upload exceeded the body limit");
        AppError::PayloadTooLarge { max }
    } else {
        AppError::BadRequest(format!("{}: {}", context, err))
    }
}

/// POST /api/v1/sessions/:id/convert
async fn convert(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ConvertResponse>> {
    let session = analysis::convert(&state, &id).await?;
    let images = session.pages.len();

    Ok(Json(ConvertResponse {
        images,
        message: format!("{} images generated successfully", images),
        session: session.summary(),
    }))
}

/// POST /api/v1/sessions/:id/detect
async fn detect(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DetectResponse>> {
    let (session, summary) = analysis::detect(&state, &id).await?;
    let detected = summary.detections.len();

    Ok(Json(DetectResponse {
        detected,
        scanned: summary.scanned,
        skipped: summary.skipped,
        message: format!("{} medical images detected", detected),
        detections: summary.detections,
        session: session.summary(),
    }))
}

/// GET /api/v1/sessions/:id/download
async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let path = analysis::archive_path(&state, &id).await?;
    let data = tokio::fs::read(&path).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(response)
}
