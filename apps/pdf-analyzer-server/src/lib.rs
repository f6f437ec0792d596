//! PDF Analyzer Server Library
//!
//! Renders uploaded PDFs to page images, OCRs every page and collects the
//! pages that look like medical documents into a downloadable ZIP.
//! The server binary is in main.rs.
//!
//! # Modules
//!
//! - `session`: per-client working directories and stage tracking
//! - `render`: PDF page rasterization
//! - `ocr`: text recognition backends
//! - `classify`: keyword and pattern scoring of page text
//! - `detect`: the OCR + classification pipeline
//! - `archive`: ZIP packaging of results

pub mod analysis;
pub mod archive;
pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod ocr;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;
