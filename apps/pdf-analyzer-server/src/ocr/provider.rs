//! OCR Providers
//!
//! Defines the provider trait and implementations for different OCR backends.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{OcrError, OcrProvider, OcrResult};

/// OCR provider trait
#[async_trait]
pub trait OcrProviderTrait: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Perform OCR on a PNG encoded image
    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError>;
}

/// Tesseract OCR provider
///
/// Runs the `tesseract` binary on a temporary PNG and reads the text from stdout.
pub struct TesseractProvider {
    binary: String,
    default_language: String,
    oem: u8,
    psm: u8,
}

impl TesseractProvider {
    pub fn new(binary: &str, default_language: &str) -> Self {
        Self {
            binary: binary.to_string(),
            default_language: default_language.to_string(),
            oem: 3,
            psm: 6,
        }
    }

    /// Override engine and page segmentation modes
    pub fn with_modes(mut self, oem: u8, psm: u8) -> Self {
        self.oem = oem;
        self.psm = psm;
        self
    }

    fn args(&self, input: &std::path::Path, language: &str) -> Vec<String> {
        vec![
            input.display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
        ]
    }
}

#[async_trait]
impl OcrProviderTrait for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(&self.default_language);

        let input_path = std::env::temp_dir().join(format!("ocr_input_{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&input_path, image_data)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        let output = Command::new(&self.binary)
            .args(self.args(&input_path, lang))
            .output()
            .await;

        let _ = tokio::fs::remove_file(&input_path).await;

        let output = output
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(OcrResult {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            provider: OcrProvider::Tesseract,
        })
    }
}

/// Ollama vision model provider
pub struct OllamaProvider {
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OcrProviderTrait for OllamaProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        use base64::Engine;

        let url = format!("{}/api/generate", self.base_url);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let lang_hint = language
            .map(|l| format!(" The text is in language '{}'.", l))
            .unwrap_or_default();

        let prompt = format!(
            "Transcribe all text on this scanned document page exactly as written.{} Return only the text.",
            lang_hint
        );

        let request = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [image_base64],
            "stream": false
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = result["response"].as_str().unwrap_or("").to_string();

        Ok(OcrResult {
            text,
            provider: OcrProvider::Ollama,
        })
    }
}

/// Scripted provider for tests: returns queued texts in call order
#[cfg(test)]
pub struct MockProvider {
    pub kind: OcrProvider,
    pub available: bool,
    pub responses: parking_lot::Mutex<std::collections::VecDeque<Result<String, String>>>,
    pub availability_checks: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: OcrProvider::Tesseract,
            available: true,
            responses: parking_lot::Mutex::new(texts.into_iter().map(|t| Ok(t.into())).collect()),
            availability_checks: Default::default(),
        }
    }

    pub fn failing(kind: OcrProvider) -> Self {
        Self {
            kind,
            available: true,
            responses: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            availability_checks: Default::default(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl OcrProviderTrait for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.availability_checks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.available
    }

    async fn recognize(&self, _image_data: &[u8], _language: Option<&str>) -> Result<OcrResult, OcrError> {
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(OcrResult {
                text,
                provider: self.kind,
            }),
            Some(Err(message)) => Err(OcrError::ProcessingError(message)),
            None => Err(OcrError::ProcessingError("no scripted response".to_string())),
        }
    }
}
