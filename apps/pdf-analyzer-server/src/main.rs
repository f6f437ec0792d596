//! PDF Analyzer Server
//!
//! Upload a PDF, convert its pages to images, detect the medical pages and
//! download them as a ZIP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_analyzer_server::config::Config;
use pdf_analyzer_server::routes;
use pdf_analyzer_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdf_analyzer_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("Starting PDF Analyzer Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Workspace: {}", config.workspace.root.display());
    tracing::info!("Render DPI: {}", config.render.dpi);
    tracing::info!("OCR providers: {:?} ({})", config.ocr.providers, config.ocr.language);

    tokio::fs::create_dir_all(&config.workspace.root)
        .await
        .with_context(|| format!("creating workspace {}", config.workspace.root.display()))?;

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid SERVER_HOST '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let app_state = AppState::new(config);

    let available = app_state.ocr().available_providers().await;
    if available.is_empty() {
        tracing::warn!("No OCR provider is reachable; detection requests will fail");
    }

    let cleanup = app_state.sessions().clone().start_cleanup_task();

    let app = routes::app(app_state);

    tracing::info!("PDF Analyzer Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cleanup.abort();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
