//! Poppler-utils backed rasterizer (`pdfinfo` + `pdftoppm`)

use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use super::{PageRasterizer, RenderError};
use crate::config::RenderConfig;

pub struct PopplerRasterizer {
    pdftoppm: String,
    pdfinfo: String,
}

impl PopplerRasterizer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            pdftoppm: config.pdftoppm_bin.clone(),
            pdfinfo: config.pdfinfo_bin.clone(),
        }
    }

    async fn run(&self, tool: &str, command: &mut Command) -> Result<Output, RenderError> {
        let output = command.output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => RenderError::ToolUnavailable(tool.to_string()),
            _ => RenderError::Io(e),
        })?;

        if !output.status.success() {
            return Err(RenderError::ToolFailed {
                tool: tool.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl PageRasterizer for PopplerRasterizer {
    async fn page_count(&self, pdf: &Path) -> Result<usize, RenderError> {
        let output = self
            .run(&self.pdfinfo, Command::new(&self.pdfinfo).arg(pdf))
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_page_count(&stdout)
            .ok_or_else(|| RenderError::InvalidDocument("pdfinfo reported no page count".to_string()))
    }

    async fn render_page(&self, pdf: &Path, page: usize, dpi: u32, output: &Path) -> Result<(), RenderError> {
        // pdftoppm appends the extension itself
        let prefix = output.with_extension("");
        let page = page.to_string();

        self.run(
            &self.pdftoppm,
            Command::new(&self.pdftoppm)
                .arg("-png")
                .arg("-r")
                .arg(dpi.to_string())
                .args(["-f", page.as_str(), "-l", page.as_str()])
                .arg("-singlefile")
                .arg(pdf)
                .arg(&prefix),
        )
        .await?;

        if !tokio::fs::try_exists(output).await? {
            return Err(RenderError::ToolFailed {
                tool: self.pdftoppm.clone(),
                stderr: format!("expected output {} was not written", output.display()),
            });
        }

        Ok(())
    }
}

/// Extract the `Pages:` value from `pdfinfo` output
pub fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|rest| rest.trim().parse().ok())
    })
}
