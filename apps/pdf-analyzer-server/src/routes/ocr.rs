//! OCR provider status

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ocr::OcrProvider;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProvidersResponse {
    pub configured: Vec<OcrProvider>,
    pub available: Vec<OcrProvider>,
    pub language: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/providers", get(list_providers))
}

/// GET /api/v1/ocr/providers
async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        configured: state.ocr().configured_providers(),
        available: state.ocr().available_providers().await,
        language: state.config().ocr.language.clone(),
    })
}
