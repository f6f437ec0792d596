//! Shared fixtures for unit tests

use std::io::Cursor;
use std::sync::Arc;

use image::DynamicImage;
use tempfile::TempDir;

use crate::config::Config;
use crate::ocr::{MockProvider, OcrService};
use crate::render::{FakeRasterizer, PageRasterizer};
use crate::state::AppState;

/// A small RGB PNG
pub fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .expect("encode sample png");
    buffer
}

/// Bytes that pass the PDF magic check
pub fn minimal_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n".to_vec()
}

/// App state rooted in a temp dir with a fake renderer and scripted OCR
pub fn test_state(pages: usize, ocr: MockProvider) -> (AppState, TempDir) {
    build_state(Arc::new(FakeRasterizer { pages }), ocr, |_| {})
}

/// App state with an explicit renderer and config tweaks
pub fn build_state(
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: MockProvider,
    configure: impl FnOnce(&mut Config),
) -> (AppState, TempDir) {
    let root = TempDir::new().expect("create workspace");
    let mut config = Config::default();
    config.workspace.root = root.path().to_path_buf();
    configure(&mut config);

    let state = AppState::with_components(
        config,
        rasterizer,
        OcrService::from_providers(vec![Arc::new(ocr)], "eng"),
    );

    (state, root)
}

/// A provider that never answers availability checks
pub fn offline_provider() -> MockProvider {
    let mut provider = MockProvider::with_texts(Vec::<String>::new());
    provider.available = false;
    provider
}
