//! OCR Module
//!
//! Recognizes text on rendered PDF pages.
//!
//! Supports multiple backends:
//! - Tesseract (local binary, the default)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_analyzer_server::ocr::OcrService;
//!
//! let service = OcrService::new(&config.ocr);
//! let batch = service.start_batch().await?;
//! let result = batch.recognize_page(&png_bytes).await?;
//! println!("{}", result.text);
//! ```

mod provider;
mod service;
mod types;

pub use provider::{OcrProviderTrait, OllamaProvider, TesseractProvider};
pub use service::{prepare_page_image, OcrBatch, OcrService};
pub use types::{OcrError, OcrProvider, OcrResult};

#[cfg(test)]
pub(crate) use provider::MockProvider;
