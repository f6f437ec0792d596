//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::ocr::OcrService;
use crate::render::{PageRasterizer, PopplerRasterizer};
use crate::session::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionManager,
    ocr: OcrService,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl AppState {
    /// Create state backed by poppler and the configured OCR providers
    pub fn new(config: Config) -> Self {
        let rasterizer = Arc::new(PopplerRasterizer::new(&config.render));
        let ocr = OcrService::new(&config.ocr);
        Self::with_components(config, rasterizer, ocr)
    }

    /// Create state with explicit rendering and OCR backends
    pub fn with_components(config: Config, rasterizer: Arc<dyn PageRasterizer>, ocr: OcrService) -> Self {
        let sessions = SessionManager::new(config.workspace.root.clone(), config.sessions.ttl_minutes);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                ocr,
                rasterizer,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Get the OCR service
    pub fn ocr(&self) -> &OcrService {
        &self.inner.ocr
    }

    /// Get the page rasterizer
    pub fn rasterizer(&self) -> &dyn PageRasterizer {
        self.inner.rasterizer.as_ref()
    }
}
