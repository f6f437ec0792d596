//! Analysis session types

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::detect::Detection;

// ============================================================================
// Constants
// ============================================================================

/// Session ids are the leading characters of a v4 UUID
pub const SESSION_ID_LEN: usize = 8;

pub const UPLOADS_DIR: &str = "uploads";
pub const IMAGES_DIR: &str = "images";
pub const DETECTED_DIR: &str = "detected";

/// Stem of the archive written next to the detected pages
pub const ARCHIVE_STEM: &str = "medical_output";

/// File name offered to the client on download
pub const DOWNLOAD_FILE_NAME: &str = "output_images.zip";

// ============================================================================
// Stages
// ============================================================================

/// How far a session has progressed. Later stages imply earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Created,
    PdfUploaded,
    ImagesReady,
    Detected,
}

/// Long running work currently holding a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Uploading,
    Converting,
    Detecting,
}

impl JobKind {
    /// Stage the session must have reached before the job may start
    pub fn required_stage(self) -> SessionStage {
        match self {
            JobKind::Uploading => SessionStage::Created,
            JobKind::Converting => SessionStage::PdfUploaded,
            JobKind::Detecting => SessionStage::ImagesReady,
        }
    }
}

/// Fraction of the running job that is done, shared with the worker
#[derive(Debug, Clone, Default)]
pub struct JobProgress(Arc<Mutex<f64>>);

impl JobProgress {
    pub fn set(&self, fraction: f64) {
        *self.0.lock() = fraction.clamp(0.0, 1.0);
    }

    pub fn get(&self) -> f64 {
        *self.0.lock()
    }

    /// Whole percent, as shown in progress bars
    pub fn percent(&self) -> u8 {
        (self.get() * 100.0) as u8
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPdf {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    pub id: String,
    pub base_dir: PathBuf,
    pub stage: SessionStage,
    pub busy: Option<JobKind>,
    pub progress: JobProgress,
    pub pdf: Option<UploadedPdf>,
    pub pages: Vec<PathBuf>,
    pub detections: Vec<Detection>,
    pub archive: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AnalysisSession {
    pub fn new(id: String, workspace_root: &Path, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            base_dir: workspace_root.join(&id),
            id,
            stage: SessionStage::Created,
            busy: None,
            progress: JobProgress::default(),
            pdf: None,
            pages: Vec::new(),
            detections: Vec::new(),
            archive: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.base_dir.join(UPLOADS_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base_dir.join(IMAGES_DIR)
    }

    pub fn detected_dir(&self) -> PathBuf {
        self.base_dir.join(DETECTED_DIR)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Drop everything produced after `stage`
    pub fn rewind_to(&mut self, stage: SessionStage) {
        self.stage = self.stage.min(stage);
        if stage < SessionStage::PdfUploaded {
            self.pdf = None;
        }
        if stage < SessionStage::ImagesReady {
            self.pages.clear();
        }
        if stage < SessionStage::Detected {
            self.detections.clear();
            self.archive = None;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            stage: self.stage,
            busy: self.busy,
            progress: self.progress.percent(),
            pdf: self.pdf.clone(),
            page_count: self.pages.len(),
            detection_count: self.detections.len(),
            download_ready: self.archive.is_some(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Session status returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub stage: SessionStage,
    pub busy: Option<JobKind>,
    /// 0-100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<UploadedPdf>,
    pub page_count: usize,
    pub detection_count: usize,
    pub download_ready: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    Expired(String),

    #[error("Session {id} is busy {job:?}")]
    Busy { id: String, job: JobKind },

    #[error("Session {id} is not ready: {reason}")]
    NotReady { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Expired(_) => StatusCode::GONE,
            Self::Busy { .. } | Self::NotReady { .. } => StatusCode::CONFLICT,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
