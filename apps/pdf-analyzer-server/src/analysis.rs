//! Session workflow: upload, convert, detect, download
//!
//! Each step checks the session stage, replaces the output of any previous
//! run of the same step and records the result on the session.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::archive::create_zip;
use crate::detect::{detect_medical_pages, DetectionSummary};
use crate::error::{AppError, Result};
use crate::render::convert_pdf_to_images;
use crate::session::{
    AnalysisSession, JobKind, SessionError, SessionManager, SessionStage, UploadedPdf, ARCHIVE_STEM,
};
use crate::state::AppState;

/// PDF files start with this marker
const PDF_MAGIC: &[u8] = b"%PDF";

/// Validate and store an uploaded PDF in the session's uploads directory
pub async fn upload_pdf(
    state: &AppState,
    session_id: &str,
    file_name: &str,
    data: &[u8],
) -> Result<AnalysisSession> {
    let max = state.config().sessions.max_upload_bytes;
    if data.len() > max {
        tracing::warn!(session_id = %session_id, size = data.len(), max, "Upload too large");
        return Err(AppError::PayloadTooLarge { max });
    }

    let file_name = sanitize_file_name(file_name)
        .ok_or_else(|| AppError::BadRequest("Only .pdf files are accepted".to_string()))?;

    if !data.starts_with(PDF_MAGIC) {
        return Err(AppError::BadRequest(format!("{} is not a PDF document", file_name)));
    }

    let (guard, session) = JobGuard::begin(state, session_id, JobKind::Uploading).await?;

    let stored = async {
        let uploads_dir = session.uploads_dir();
        reset_dir(&uploads_dir).await?;
        let path = uploads_dir.join(&file_name);
        tokio::fs::write(&path, data).await?;
        Ok::<_, AppError>(path)
    }
    .await;

    let path = match stored {
        Ok(path) => path,
        Err(e) => {
            guard.abort().await;
            return Err(e);
        }
    };

    let pdf = UploadedPdf {
        file_name,
        path,
        size: data.len() as u64,
        sha256: hex::encode(Sha256::digest(data)),
        uploaded_at: Utc::now(),
    };

    tracing::info!(
        session_id = %session.id,
        file_name = %pdf.file_name,
        size = pdf.size,
        sha256 = %pdf.sha256,
        "PDF uploaded"
    );

    let recorded = state.sessions().record_upload(session_id, pdf).await;
    guard.disarm();
    Ok(recorded?)
}

/// Render every page of the session's PDF into its images directory
pub async fn convert(state: &AppState, session_id: &str) -> Result<AnalysisSession> {
    let (guard, session) = JobGuard::begin(state, session_id, JobKind::Converting).await?;

    let result = async {
        let pdf = session.pdf.as_ref().ok_or_else(|| SessionError::NotReady {
            id: session.id.clone(),
            reason: "no PDF uploaded".to_string(),
        })?;

        let images_dir = session.images_dir();
        reset_dir(&images_dir).await?;

        let progress = session.progress.clone();
        let pages = convert_pdf_to_images(
            state.rasterizer(),
            &pdf.path,
            &images_dir,
            state.config().render.dpi,
            &move |p: f64| progress.set(p),
        )
        .await?;

        Ok::<_, AppError>(pages)
    }
    .await;

    match result {
        Ok(pages) => {
            tracing::info!(session_id = %session.id, pages = pages.len(), "Images generated");
            let finished = state.sessions().finish_conversion(session_id, pages).await;
            guard.disarm();
            Ok(finished?)
        }
        Err(e) => {
            guard.abort().await;
            Err(e)
        }
    }
}

/// OCR and classify the rendered pages, then archive the matches
pub async fn detect(state: &AppState, session_id: &str) -> Result<(AnalysisSession, DetectionSummary)> {
    let (guard, session) = JobGuard::begin(state, session_id, JobKind::Detecting).await?;

    let result = async {
        let batch = state.ocr().start_batch().await?;

        let detected_dir = session.detected_dir();
        reset_dir(&detected_dir).await?;

        let progress = session.progress.clone();
        let summary = detect_medical_pages(
            &batch,
            &session.images_dir(),
            &detected_dir,
            &move |p: f64| progress.set(p),
        )
        .await?;

        let archive = create_zip(&detected_dir, ARCHIVE_STEM).await?;
        Ok::<_, AppError>((summary, archive))
    }
    .await;

    match result {
        Ok((summary, archive)) => {
            let finished = state
                .sessions()
                .finish_detection(session_id, summary.detections.clone(), archive)
                .await;
            guard.disarm();
            Ok((finished?, summary))
        }
        Err(e) => {
            guard.abort().await;
            Err(e)
        }
    }
}

/// Holds a session's job slot until the job finishes
///
/// If the owning request is dropped mid-job the slot is released from a
/// spawned task, so the session does not stay busy forever.
struct JobGuard {
    sessions: SessionManager,
    session_id: String,
    armed: bool,
}

impl JobGuard {
    async fn begin(state: &AppState, session_id: &str, job: JobKind) -> Result<(Self, AnalysisSession)> {
        let session = state.sessions().begin_job(session_id, job).await?;
        let guard = Self {
            sessions: state.sessions().clone(),
            session_id: session_id.to_string(),
            armed: true,
        };
        Ok((guard, session))
    }

    /// The job recorded its outcome; nothing to release
    fn disarm(mut self) {
        self.armed = false;
    }

    /// Release the slot after a failed job
    async fn abort(mut self) {
        if let Err(e) = self.sessions.abort_job(&self.session_id).await {
            tracing::warn!(session_id = %self.session_id, error = %e, "Failed to release job");
        }
        self.armed = false;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::error!(session_id = %self.session_id, "No runtime to release abandoned job");
                return;
            }
        };

        let sessions = self.sessions.clone();
        let session_id = std::mem::take(&mut self.session_id);
        tracing::warn!(session_id = %session_id, "Request dropped mid-job, releasing session");

        runtime.spawn(async move {
            if let Err(e) = sessions.abort_job(&session_id).await {
                tracing::debug!(session_id = %session_id, error = %e, "Abandoned job already gone");
            }
        });
    }
}

/// Path of the finished ZIP archive
pub async fn archive_path(state: &AppState, session_id: &str) -> Result<PathBuf> {
    let session = state.sessions().get_session(session_id).await?;

    match (&session.archive, session.stage) {
        (Some(path), SessionStage::Detected) if session.busy.is_none() => Ok(path.clone()),
        _ => Err(SessionError::NotReady {
            id: session.id,
            reason: "detection has not finished".to_string(),
        }
        .into()),
    }
}

/// Strip directories from a client supplied name and require a `.pdf` extension
pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let name = file_name.rsplit(['/', '\\']).next()?.trim();

    let is_pdf = Path::new(name)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf || name.len() <= ".pdf".len() {
        return None;
    }

    Some(name.to_string())
}

async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use crate::ocr::{MockProvider, OcrError};
    use crate::render::StalledRasterizer;
    use crate::test_support::{build_state, minimal_pdf, offline_provider, test_state};

    async fn wait_for_busy(state: &AppState, session_id: &str, busy: Option<JobKind>) {
        for _ in 0..200 {
            if state.sessions().get_session(session_id).await.unwrap().busy == busy {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session {} never reached busy state {:?}", session_id, busy);
    }

    fn spawn_convert(state: &AppState, session_id: &str) -> tokio::task::JoinHandle<Result<AnalysisSession>> {
        let state = state.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move { convert(&state, &session_id).await })
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.PDF"), Some("report.PDF".to_string()));
        assert_eq!(sanitize_file_name("../../etc/scan.pdf"), Some("scan.pdf".to_string()));
        assert_eq!(sanitize_file_name("C:\\docs\\scan.pdf"), Some("scan.pdf".to_string()));
        assert_eq!(sanitize_file_name("notes.txt"), None);
        assert_eq!(sanitize_file_name(".pdf"), None);
        assert_eq!(sanitize_file_name("dir/"), None);
    }

    #[tokio::test]
    async fn test_full_workflow() {
        let (state, _root) = test_state(
            3,
            MockProvider::with_texts(["Chest X-ray", "blank page", "ICU admission notes"]),
        );
        let session = state.sessions().create_session().await.unwrap();

        let uploaded = upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();
        assert_eq!(uploaded.stage, SessionStage::PdfUploaded);
        assert_eq!(uploaded.pdf.as_ref().unwrap().sha256.len(), 64);

        let converted = convert(&state, &session.id).await.unwrap();
        assert_eq!(converted.pages.len(), 3);
        assert_eq!(converted.progress.percent(), 100);
        assert!(converted.images_dir().join("page_3.png").exists());

        let (detected, summary) = detect(&state, &session.id).await.unwrap();
        assert_eq!(detected.stage, SessionStage::Detected);
        let categories: Vec<_> = summary.detections.iter().map(|d| d.category).collect();
        assert_eq!(categories, vec!["xray", "icu"]);

        let archive = archive_path(&state, &session.id).await.unwrap();
        assert_eq!(archive, detected.base_dir.join("medical_output.zip"));
        assert!(archive.exists());
    }

    #[tokio::test]
    async fn test_convert_before_upload_is_rejected() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();

        let result = convert(&state, &session.id).await;
        assert!(matches!(
            result,
            Err(AppError::Session(SessionError::NotReady { .. }))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_content() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();

        let result = upload_pdf(&state, &session.id, "scan.pdf", b"GIF89a").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let result = upload_pdf(&state, &session.id, "scan.png", &minimal_pdf()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_download_requires_detection() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();

        let result = archive_path(&state, &session.id).await;
        assert!(matches!(
            result,
            Err(AppError::Session(SessionError::NotReady { .. }))
        ));
    }

    #[tokio::test]
    async fn test_reconvert_clears_previous_images() {
        let (state, _root) = test_state(2, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();
        upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();
        convert(&state, &session.id).await.unwrap();

        let stray = session.images_dir().join("stray.png");
        tokio::fs::write(&stray, b"old").await.unwrap();

        let converted = convert(&state, &session.id).await.unwrap();
        assert_eq!(converted.pages.len(), 2);
        assert!(!stray.exists());
    }

    #[tokio::test]
    async fn test_cancelled_convert_releases_session() {
        let (state, _root) = build_state(
            Arc::new(StalledRasterizer),
            MockProvider::with_texts(Vec::<String>::new()),
            |_| {},
        );
        let session = state.sessions().create_session().await.unwrap();
        upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();

        let task = spawn_convert(&state, &session.id);
        wait_for_busy(&state, &session.id, Some(JobKind::Converting)).await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        wait_for_busy(&state, &session.id, None).await;

        let released = state.sessions().get_session(&session.id).await.unwrap();
        assert_eq!(released.stage, SessionStage::PdfUploaded);

        let reuploaded = upload_pdf(&state, &session.id, "again.pdf", &minimal_pdf()).await.unwrap();
        assert_eq!(reuploaded.pdf.unwrap().file_name, "again.pdf");

        state.sessions().expire_now(&session.id).await;
        assert_eq!(state.sessions().cleanup_expired().await, 1);
        assert!(!session.base_dir.exists());
    }

    #[tokio::test]
    async fn test_upload_during_conversion_keeps_pdf() {
        let (state, _root) = build_state(
            Arc::new(StalledRasterizer),
            MockProvider::with_texts(Vec::<String>::new()),
            |_| {},
        );
        let session = state.sessions().create_session().await.unwrap();
        let uploaded = upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();
        let pdf_path = uploaded.pdf.unwrap().path;

        let task = spawn_convert(&state, &session.id);
        wait_for_busy(&state, &session.id, Some(JobKind::Converting)).await;

        let result = upload_pdf(&state, &session.id, "other.pdf", &minimal_pdf()).await;
        assert!(matches!(
            result,
            Err(AppError::Session(SessionError::Busy { job: JobKind::Converting, .. }))
        ));
        assert!(pdf_path.exists());
        assert!(!session.uploads_dir().join("other.pdf").exists());

        let current = state.sessions().get_session(&session.id).await.unwrap();
        assert_eq!(current.pdf.unwrap().file_name, "scan.pdf");

        task.abort();
    }

    #[tokio::test]
    async fn test_reserved_session_rejects_upload() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();
        state.sessions().begin_job(&session.id, JobKind::Uploading).await.unwrap();

        let result = upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await;
        assert!(matches!(
            result,
            Err(AppError::Session(SessionError::Busy { job: JobKind::Uploading, .. }))
        ));
    }

    #[tokio::test]
    async fn test_detect_without_ocr_provider_fails() {
        let (state, _root) = test_state(2, offline_provider());
        let session = state.sessions().create_session().await.unwrap();
        upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();
        convert(&state, &session.id).await.unwrap();

        let result = detect(&state, &session.id).await;
        assert!(matches!(
            result,
            Err(AppError::Ocr(OcrError::ProviderNotAvailable(_)))
        ));

        let current = state.sessions().get_session(&session.id).await.unwrap();
        assert_eq!(current.stage, SessionStage::ImagesReady);
        assert_eq!(current.busy, None);
        assert!(current.archive.is_none());
        assert!(!current.base_dir.join("medical_output.zip").exists());
    }
}
