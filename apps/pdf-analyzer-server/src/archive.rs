//! ZIP packaging of detected pages

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Nothing to archive at {0}")]
    InvalidSource(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive task failed: {0}")]
    Task(String),
}

/// Pack every regular file of `src_dir` into `<parent>/<archive_stem>.zip`
///
/// Entries are stored flat and sorted by name. An existing archive is replaced.
pub async fn create_zip(src_dir: &Path, archive_stem: &str) -> Result<PathBuf, ArchiveError> {
    let src_dir = src_dir.to_path_buf();
    let archive_stem = archive_stem.to_string();

    tokio::task::spawn_blocking(move || write_zip(&src_dir, &archive_stem))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

fn write_zip(src_dir: &Path, archive_stem: &str) -> Result<PathBuf, ArchiveError> {
    if !src_dir.is_dir() {
        return Err(ArchiveError::InvalidSource(src_dir.display().to_string()));
    }

    let parent = src_dir
        .parent()
        .ok_or_else(|| ArchiveError::InvalidSource(src_dir.display().to_string()))?;
    let archive_path = parent.join(format!("{}.zip", archive_stem));

    let mut files = Vec::new();
    for entry in std::fs::read_dir(src_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    files.sort();

    let mut writer = ZipWriter::new(BufWriter::new(File::create(&archive_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in &files {
        writer.start_file(name.as_str(), options)?;
        let mut file = File::open(path)?;
        std::io::copy(&mut file, &mut writer)?;
    }

    writer.finish()?.flush()?;

    tracing::debug!(
        archive = %archive_path.display(),
        entries = files.len(),
        "ZIP archive written"
    );

    Ok(archive_path)
}
