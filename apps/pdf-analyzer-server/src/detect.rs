//! Medical page detection pipeline
//!
//! OCRs every rendered page, classifies the text and copies matching pages
//! into the output directory under their category name.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::classify::{classify_text, clean_filename, normalize_text};
use crate::ocr::{OcrBatch, OcrError};

/// A page that matched a medical category
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Rendered page file the text came from
    pub source: String,
    /// File name inside the output directory
    pub output_name: String,
    #[serde(skip)]
    pub destination: PathBuf,
    pub category: &'static str,
    pub score: u32,
}

/// Outcome of one detection run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub detections: Vec<Detection>,
    pub scanned: usize,
    pub skipped: usize,
}

/// Run OCR and classification over every image in `image_dir`
///
/// Per-page OCR failures are logged and counted as skipped.
pub async fn detect_medical_pages(
    ocr: &OcrBatch,
    image_dir: &Path,
    output_dir: &Path,
    progress: &(dyn Fn(f64) + Send + Sync),
) -> std::io::Result<DetectionSummary> {
    tokio::fs::create_dir_all(output_dir).await?;

    let images = list_page_images(image_dir).await?;
    let total = images.len();
    let mut summary = DetectionSummary::default();

    tracing::debug!(pages = total, providers = ?ocr.providers(), "Detecting medical pages");

    for (i, image_path) in images.iter().enumerate() {
        let source = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match classify_page(ocr, image_path).await {
            Ok(Some(classification)) => {
                let base_name = clean_filename(classification.category);
                let destination = unique_destination(output_dir, &base_name).await?;
                tokio::fs::copy(image_path, &destination).await?;

                let output_name = destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                tracing::debug!(
                    page = %source,
                    category = classification.category,
                    score = classification.score,
                    output = %output_name,
                    "Medical page detected"
                );

                summary.detections.push(Detection {
                    source,
                    output_name,
                    destination,
                    category: classification.category,
                    score: classification.score,
                });
                summary.scanned += 1;
            }
            Ok(None) => summary.scanned += 1,
            Err(OcrError::ImageDecode(e)) => {
                tracing::debug!(page = %source, error = %e, "Skipping unreadable image");
                summary.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(page = %source, error = %e, "OCR failed, skipping page");
                summary.skipped += 1;
            }
        }

        progress((i + 1) as f64 / total as f64);
    }

    tracing::info!(
        scanned = summary.scanned,
        skipped = summary.skipped,
        detected = summary.detections.len(),
        "Detection finished"
    );

    Ok(summary)
}

async fn classify_page(
    ocr: &OcrBatch,
    image_path: &Path,
) -> Result<Option<crate::classify::Classification>, OcrError> {
    let data = tokio::fs::read(image_path)
        .await
        .map_err(|e| OcrError::ImageDecode(e.to_string()))?;

    let result = ocr.recognize_page(&data).await?;
    Ok(classify_text(&normalize_text(&result.text)))
}

/// Regular files of `dir` in page order (`page_2` before `page_10`)
pub async fn list_page_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort_by_cached_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (page_number(&name), name)
    });

    Ok(files)
}

/// Trailing page number of a `page_<n>.<ext>` style name
fn page_number(file_name: &str) -> Option<u64> {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// First free `<base>.png`, `<base>_1.png`, `<base>_2.png`, ...
pub async fn unique_destination(output_dir: &Path, base_name: &str) -> std::io::Result<PathBuf> {
    let mut candidate = output_dir.join(format!("{}.png", base_name));
    let mut counter = 1;

    while tokio::fs::try_exists(&candidate).await? {
        candidate = output_dir.join(format!("{}_{}.png", base_name, counter));
        counter += 1;
    }

    Ok(candidate)
}
