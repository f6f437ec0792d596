//! Session Manager
//!
//! Keeps analysis sessions in memory and owns their working directories:
//! - Session creation with a fresh directory tree
//! - Stage gating and one job at a time per session
//! - Expiry cleanup that also removes files from disk

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{
    AnalysisSession, JobKind, SessionError, SessionStage, UploadedPdf, SESSION_ID_LEN,
};
use crate::detect::Detection;

/// Manages analysis sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    sessions: RwLock<HashMap<String, AnalysisSession>>,
    workspace_root: PathBuf,
    ttl: chrono::Duration,
}

impl SessionManager {
    pub fn new(workspace_root: impl Into<PathBuf>, ttl_minutes: i64) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: RwLock::new(HashMap::new()),
                workspace_root: workspace_root.into(),
                ttl: chrono::Duration::minutes(ttl_minutes.max(1)),
            }),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.inner.workspace_root
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a session and its uploads/images/detected directories
    pub async fn create_session(&self) -> Result<AnalysisSession, SessionError> {
        let session = {
            let mut sessions = self.inner.sessions.write().await;
            let id = loop {
                let candidate: String = Uuid::new_v4().simple().to_string()[..SESSION_ID_LEN].to_string();
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
            };
            let session = AnalysisSession::new(id, &self.inner.workspace_root, self.inner.ttl);
            sessions.insert(session.id.clone(), session.clone());
            session
        };

        for dir in [session.uploads_dir(), session.images_dir(), session.detected_dir()] {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                self.inner.sessions.write().await.remove(&session.id);
                return Err(e.into());
            }
        }

        tracing::info!(session_id = %session.id, dir = %session.base_dir.display(), "Created analysis session");

        Ok(session)
    }

    /// Get a session by id, extending its lifetime
    pub async fn get_session(&self, id: &str) -> Result<AnalysisSession, SessionError> {
        self.with_session(id, |_| Ok(())).await
    }

    /// Run `f` on the live session under the write lock and return a snapshot
    async fn with_session<F>(&self, id: &str, f: F) -> Result<AnalysisSession, SessionError>
    where
        F: FnOnce(&mut AnalysisSession) -> Result<(), SessionError>,
    {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        if session.is_expired() && session.busy.is_none() {
            return Err(SessionError::Expired(id.to_string()));
        }

        f(session)?;
        session.expires_at = Utc::now() + self.inner.ttl;
        Ok(session.clone())
    }

    /// Store a freshly uploaded PDF; everything derived from a previous PDF is dropped
    ///
    /// Releases an `Uploading` reservation taken with [`Self::begin_job`].
    pub async fn record_upload(&self, id: &str, pdf: UploadedPdf) -> Result<AnalysisSession, SessionError> {
        self.with_session(id, |session| {
            if session.busy != Some(JobKind::Uploading) {
                ensure_idle(session)?;
            }
            session.busy = None;
            session.rewind_to(SessionStage::Created);
            session.pdf = Some(pdf);
            session.stage = SessionStage::PdfUploaded;
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Mark the session busy with `job` if it is idle and far enough along
    pub async fn begin_job(&self, id: &str, job: JobKind) -> Result<AnalysisSession, SessionError> {
        self.with_session(id, |session| {
            ensure_idle(session)?;
            if session.stage < job.required_stage() {
                return Err(SessionError::NotReady {
                    id: session.id.clone(),
                    reason: match job {
                        JobKind::Uploading => "session cannot take an upload".to_string(),
                        JobKind::Converting => "no PDF uploaded".to_string(),
                        JobKind::Detecting => "pages have not been converted".to_string(),
                    },
                });
            }
            session.rewind_to(job.required_stage());
            session.busy = Some(job);
            session.progress.set(0.0);
            Ok(())
        })
        .await
    }

    /// Finish a conversion job with the rendered pages
    pub async fn finish_conversion(&self, id: &str, pages: Vec<PathBuf>) -> Result<AnalysisSession, SessionError> {
        self.with_session(id, |session| {
            session.busy = None;
            session.pages = pages;
            session.stage = SessionStage::ImagesReady;
            Ok(())
        })
        .await
    }

    /// Finish a detection job with its results and archive
    pub async fn finish_detection(
        &self,
        id: &str,
        detections: Vec<Detection>,
        archive: PathBuf,
    ) -> Result<AnalysisSession, SessionError> {
        self.with_session(id, |session| {
            session.busy = None;
            session.detections = detections;
            session.archive = Some(archive);
            session.stage = SessionStage::Detected;
            Ok(())
        })
        .await
    }

    /// Release a failed job. The output it was replacing is gone, so the
    /// session falls back to the stage the job started from.
    pub async fn abort_job(&self, id: &str) -> Result<AnalysisSession, SessionError> {
        self.with_session(id, |session| {
            if let Some(job) = session.busy.take() {
                session.rewind_to(job.required_stage());
                tracing::warn!(session_id = %session.id, job = ?job, "Job aborted");
            }
            Ok(())
        })
        .await
    }

    /// Delete a session and its files
    pub async fn delete_session(&self, id: &str) -> Result<AnalysisSession, SessionError> {
        let session = {
            let mut sessions = self.inner.sessions.write().await;
            let session = sessions
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            ensure_idle(session)?;
            sessions
                .remove(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?
        };

        remove_session_dir(&session.base_dir).await;

        tracing::info!(session_id = %session.id, "Analysis session deleted");

        Ok(session)
    }

    // ========================================================================
    // Query Methods
    // ========================================================================

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Remove expired idle sessions and their directories
    ///
    /// Returns the number of sessions cleaned up
    pub async fn cleanup_expired(&self) -> usize {
        let expired: Vec<AnalysisSession> = {
            let mut sessions = self.inner.sessions.write().await;
            let ids: Vec<String> = sessions
                .values()
                .filter(|s| s.is_expired() && s.busy.is_none())
                .map(|s| s.id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            remove_session_dir(&session.base_dir).await;
            tracing::debug!(session_id = %session.id, "Cleaned up expired session");
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Cleaned up expired analysis sessions");
        }

        expired.len()
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));

            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        })
    }

    #[cfg(test)]
    pub(crate) async fn expire_now(&self, id: &str) {
        if let Some(session) = self.inner.sessions.write().await.get_mut(id) {
            session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

fn ensure_idle(session: &AnalysisSession) -> Result<(), SessionError> {
    match session.busy {
        Some(job) => Err(SessionError::Busy {
            id: session.id.clone(),
            job,
        }),
        None => Ok(()),
    }
}

async fn remove_session_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove session directory");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
