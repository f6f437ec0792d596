//! PDF page rendering
//!
//! Rasterizes every page of an uploaded PDF into `page_<n>.png` files.
//! The actual rasterization is behind [`PageRasterizer`] so the pipeline
//! does not care which tool produces the pixels.

mod poppler;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use poppler::{parse_page_count, PopplerRasterizer};

/// PDF points per inch; zoom factor is `dpi / POINTS_PER_INCH`
pub const POINTS_PER_INCH: f64 = 72.0;

/// Render error types
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0} is not installed or not on PATH")]
    ToolUnavailable(String),

    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },

    #[error("Unreadable PDF: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns PDF pages into PNG files
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document
    async fn page_count(&self, pdf: &Path) -> Result<usize, RenderError>;

    /// Render one page (1-indexed) to `output` as PNG
    async fn render_page(&self, pdf: &Path, page: usize, dpi: u32, output: &Path) -> Result<(), RenderError>;
}

/// File name used for a rendered page
pub fn page_file_name(page: usize) -> String {
    format!("page_{}.png", page)
}

/// Render all pages of `pdf` into `output_dir`
///
/// Progress is reported as the fraction of pages done after each page.
pub async fn convert_pdf_to_images(
    rasterizer: &dyn PageRasterizer,
    pdf: &Path,
    output_dir: &Path,
    dpi: u32,
    progress: &(dyn Fn(f64) + Send + Sync),
) -> Result<Vec<PathBuf>, RenderError> {
    tokio::fs::create_dir_all(output_dir).await?;

    let total_pages = rasterizer.page_count(pdf).await?;
    let mut image_paths = Vec::with_capacity(total_pages);

    tracing::debug!(
        pdf = %pdf.display(),
        pages = total_pages,
        dpi = dpi,
        zoom = dpi as f64 / POINTS_PER_INCH,
        "Rendering PDF pages"
    );

    for page in 1..=total_pages {
        let output_path = output_dir.join(page_file_name(page));
        rasterizer.render_page(pdf, page, dpi, &output_path).await?;
        image_paths.push(output_path);

        progress(page as f64 / total_pages as f64);
    }

    Ok(image_paths)
}

/// Rasterizer for tests: writes a tiny PNG per page
#[cfg(test)]
pub struct FakeRasterizer {
    pub pages: usize,
}

#[cfg(test)]
#[async_trait]
impl PageRasterizer for FakeRasterizer {
    async fn page_count(&self, _pdf: &Path) -> Result<usize, RenderError> {
        Ok(self.pages)
    }

    async fn render_page(&self, _pdf: &Path, page: usize, _dpi: u32, output: &Path) -> Result<(), RenderError> {
        if page == 0 || page > self.pages {
            return Err(RenderError::InvalidDocument(format!("no page {}", page)));
        }
        tokio::fs::write(output, crate::test_support::sample_png()).await?;
        Ok(())
    }
}

/// Rasterizer whose pages never finish rendering
#[cfg(test)]
pub struct StalledRasterizer;

#[cfg(test)]
#[async_trait]
impl PageRasterizer for StalledRasterizer {
    async fn page_count(&self, _pdf: &Path) -> Result<usize, RenderError> {
        Ok(1)
    }

    async fn render_page(&self, _pdf: &Path, _page: usize, _dpi: u32, _output: &Path) -> Result<(), RenderError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
