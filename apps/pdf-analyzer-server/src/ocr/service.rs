//! OCR Service
//!
//! Orchestrates OCR providers and prepares page images for recognition.

use std::io::Cursor;
use std::sync::Arc;

use image::DynamicImage;

use super::{
    provider::{OcrProviderTrait, OllamaProvider, TesseractProvider},
    types::{OcrError, OcrProvider, OcrResult},
};
use crate::config::OcrConfig;

/// OCR service for recognizing rendered PDF pages
pub struct OcrService {
    language: String,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

impl OcrService {
    /// Create a new OCR service with providers in configured order
    pub fn new(config: &OcrConfig) -> Self {
        let mut providers: Vec<Arc<dyn OcrProviderTrait>> = Vec::new();

        for provider in &config.providers {
            if providers.iter().any(|p| p.provider_type() == *provider) {
                continue;
            }
            match provider {
                OcrProvider::Tesseract => providers.push(Arc::new(
                    TesseractProvider::new(&config.tesseract_bin, &config.language)
                        .with_modes(config.oem, config.psm),
                )),
                OcrProvider::Ollama => providers.push(Arc::new(OllamaProvider::new(
                    &config.ollama_url,
                    &config.ollama_model,
                ))),
            }
        }

        Self {
            language: config.language.clone(),
            providers,
        }
    }

    /// Create a service from explicit providers
    pub fn from_providers(providers: Vec<Arc<dyn OcrProviderTrait>>, language: &str) -> Self {
        Self {
            language: language.to_string(),
            providers,
        }
    }

    /// Providers in the order they will be tried
    pub fn configured_providers(&self) -> Vec<OcrProvider> {
        self.providers.iter().map(|p| p.provider_type()).collect()
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.provider_type());
            }
        }
        available
    }

    /// Check provider availability once and return the ones that answered
    ///
    /// Fails when no configured provider is reachable.
    pub async fn start_batch(&self) -> Result<OcrBatch, OcrError> {
        let mut ready = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                ready.push(Arc::clone(provider));
            } else {
                tracing::debug!(provider = %provider.provider_type(), "OCR provider not reachable");
            }
        }

        if ready.is_empty() {
            return Err(OcrError::ProviderNotAvailable(
                "No OCR providers available".to_string(),
            ));
        }

        Ok(OcrBatch {
            language: self.language.clone(),
            providers: ready,
        })
    }
}

/// Providers that were reachable when a detection run started
pub struct OcrBatch {
    language: String,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

impl OcrBatch {
    pub fn providers(&self) -> Vec<OcrProvider> {
        self.providers.iter().map(|p| p.provider_type()).collect()
    }

    /// Perform OCR on an image, falling back through providers in order
    pub async fn recognize(&self, image_data: &[u8]) -> Result<OcrResult, OcrError> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.recognize(image_data, Some(&self.language)).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.provider_type(),
                        error = %e,
                        "OCR provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            OcrError::ProviderNotAvailable("No OCR providers available".to_string())
        }))
    }

    /// Grayscale a page image and recognize its text
    pub async fn recognize_page(&self, image_data: &[u8]) -> Result<OcrResult, OcrError> {
        let data = image_data.to_vec();
        let gray = tokio::task::spawn_blocking(move || prepare_page_image(&data))
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Task join error: {}", e)))??;

        self.recognize(&gray).await
    }
}

/// Decode a page image and re-encode it as 8-bit grayscale PNG
pub fn prepare_page_image(image_data: &[u8]) -> Result<Vec<u8>, OcrError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| OcrError::ImageDecode(e.to_string()))?;

    let gray = DynamicImage::ImageLuma8(img.to_luma8());

    let mut buffer = Vec::new();
    gray.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to encode grayscale image: {}", e)))?;

    Ok(buffer)
}
