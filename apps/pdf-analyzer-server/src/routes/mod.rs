//! Route modules for PDF Analyzer Server

pub mod health;
pub mod ocr;
pub mod sessions;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload_bytes = state.config().sessions.max_upload_bytes;

    Router::new()
        .nest("/health", health::router())
        .nest("/api/v1/health", health::router())
        .nest("/api/v1/ocr", ocr::router())
        .nest("/api/v1/sessions", sessions::router(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum_test::TestServer;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::analysis;
    use crate::ocr::MockProvider;
    use crate::session::JobKind;
    use crate::test_support::{build_state, minimal_pdf, offline_provider, test_state};

    const BOUNDARY: &str = "analyzer-test-boundary";

    fn multipart_request(uri: &str, field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let server = TestServer::new(app(state)).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "pdf-analyzer-server");
    }

    #[tokio::test]
    async fn test_create_and_fetch_session() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let server = TestServer::new(app(state)).unwrap();

        let created = server.post("/api/v1/sessions").await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["sessionId"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 8);

        let fetched = server.get(&format!("/api/v1/sessions/{}", id)).await;
        fetched.assert_status_ok();
        let body = fetched.json::<Value>();
        assert_eq!(body["stage"], "created");
        assert_eq!(body["downloadReady"], false);

        server
            .get("/api/v1/sessions/unknown1")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_convert_detect_download() {
        let (state, _root) = test_state(
            2,
            MockProvider::with_texts(["Electrocardiogram 12 lead", "GCS 15/15"]),
        );
        let session = state.sessions().create_session().await.unwrap();
        let base = format!("/api/v1/sessions/{}", session.id);
        let router = app(state);

        let response = router
            .clone()
            .oneshot(post(&format!("{}/convert", base)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = router
            .clone()
            .oneshot(multipart_request(&format!("{}/pdf", base), "file", "scan.pdf", &minimal_pdf()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "PDF uploaded successfully");

        let response = router
            .clone()
            .oneshot(post(&format!("{}/convert", base)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["images"], 2);
        assert_eq!(body["message"], "2 images generated successfully");

        let response = router
            .clone()
            .oneshot(post(&format!("{}/detect", base)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "2 medical images detected");
        assert_eq!(body["detections"][0]["outputName"], "ecg.png");
        assert_eq!(body["detections"][1]["outputName"], "gcs.png");

        let response = router
            .clone()
            .oneshot(Request::builder().uri(format!("{}/download", base)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"output_images.zip\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_field_and_type() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();
        let uri = format!("/api/v1/sessions/{}/pdf", session.id);
        let router = app(state);

        let response = router
            .clone()
            .oneshot(multipart_request(&uri, "attachment", "scan.pdf", &minimal_pdf()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .clone()
            .oneshot(multipart_request(&uri, "pdf", "photo.jpg", b"\xff\xd8\xff"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_download_before_detection_conflicts() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();
        let server = TestServer::new(app(state)).unwrap();

        let response = server
            .get(&format!("/api/v1/sessions/{}/download", session.id))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"], "session_not_ready");
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();
        let server = TestServer::new(app(state)).unwrap();

        server
            .delete(&format!("/api/v1/sessions/{}", session.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert!(!session.base_dir.exists());
    }

    #[tokio::test]
    async fn test_oversized_uploads_are_413() {
        let (state, _root) = build_state(
            std::sync::Arc::new(crate::render::FakeRasterizer { pages: 1 }),
            MockProvider::with_texts(Vec::<String>::new()),
            |config| config.sessions.max_upload_bytes = 1024,
        );
        let session = state.sessions().create_session().await.unwrap();
        let uri = format!("/api/v1/sessions/{}/pdf", session.id);
        let router = app(state);

        for size in [2048, 200 * 1024] {
            let mut data = minimal_pdf();
            data.resize(size, b' ');

            let response = router
                .clone()
                .oneshot(multipart_request(&uri, "file", "big.pdf", &data))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE, "{} bytes", size);
            assert_eq!(json_body(response).await["error"], "payload_too_large");
        }
    }

    #[tokio::test]
    async fn test_busy_session_conflicts() {
        let (state, _root) = test_state(1, MockProvider::with_texts(Vec::<String>::new()));
        let session = state.sessions().create_session().await.unwrap();
        analysis::upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();
        state.sessions().begin_job(&session.id, JobKind::Converting).await.unwrap();
        let base = format!("/api/v1/sessions/{}", session.id);
        let router = app(state);

        let response = router
            .clone()
            .oneshot(post(&format!("{}/convert", base)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "session_busy");

        let response = router
            .clone()
            .oneshot(multipart_request(&format!("{}/pdf", base), "file", "scan.pdf", &minimal_pdf()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = router
            .clone()
            .oneshot(Request::builder().method("DELETE").uri(base.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = router
            .clone()
            .oneshot(Request::builder().uri(base.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(response).await["busy"], "converting");
    }

    #[tokio::test]
    async fn test_detect_without_ocr_is_unavailable() {
        let (state, _root) = test_state(2, offline_provider());
        let session = state.sessions().create_session().await.unwrap();
        analysis::upload_pdf(&state, &session.id, "scan.pdf", &minimal_pdf()).await.unwrap();
        analysis::convert(&state, &session.id).await.unwrap();
        let server = TestServer::new(app(state)).unwrap();

        let response = server
            .post(&format!("/api/v1/sessions/{}/detect", session.id))
            .await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<Value>()["error"], "ocr_error");

        let status = server.get(&format!("/api/v1/sessions/{}", session.id)).await;
        let body = status.json::<Value>();
        assert_eq!(body["stage"], "images_ready");
        assert_eq!(body["busy"], Value::Null);
        assert_eq!(body["downloadReady"], false);
    }
}
