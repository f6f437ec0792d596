//! Configuration management for PDF Analyzer Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ocr::OcrProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub render: RenderConfig,
    pub ocr: OcrConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Root under which every session gets its own directory
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub dpi: u32,
    pub pdftoppm_bin: String,
    pub pdfinfo_bin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Provider order; the first available one that succeeds wins
    pub providers: Vec<OcrProvider>,
    pub language: String,
    pub tesseract_bin: String,
    pub oem: u8,
    pub psm: u8,
    pub ollama_url: String,
    pub ollama_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_minutes: i64,
    pub max_upload_bytes: usize,
}

const DEFAULT_PORT: u16 = 8501;
const DEFAULT_DPI: u32 = 300;
const DEFAULT_TTL_MINUTES: i64 = 120;
const DEFAULT_MAX_UPLOAD_MB: usize = 200;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
            },
            workspace: WorkspaceConfig {
                root: PathBuf::from("temp"),
            },
            render: RenderConfig {
                dpi: DEFAULT_DPI,
                pdftoppm_bin: "pdftoppm".to_string(),
                pdfinfo_bin: "pdfinfo".to_string(),
            },
            ocr: OcrConfig {
                providers: vec![OcrProvider::Tesseract],
                language: "eng".to_string(),
                tesseract_bin: "tesseract".to_string(),
                oem: 3,
                psm: 6,
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
            },
            sessions: SessionConfig {
                ttl_minutes: DEFAULT_TTL_MINUTES,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
            },
            workspace: WorkspaceConfig {
                root: env::var("WORKSPACE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.workspace.root),
            },
            render: RenderConfig {
                dpi: parse_var("RENDER_DPI", defaults.render.dpi),
                pdftoppm_bin: env::var("PDFTOPPM_BIN").unwrap_or(defaults.render.pdftoppm_bin),
                pdfinfo_bin: env::var("PDFINFO_BIN").unwrap_or(defaults.render.pdfinfo_bin),
            },
            ocr: OcrConfig {
                providers: env::var("OCR_PROVIDERS")
                    .ok()
                    .map(|raw| parse_providers(&raw))
                    .filter(|list| !list.is_empty())
                    .unwrap_or(defaults.ocr.providers),
                language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                tesseract_bin: env::var("TESSERACT_BIN").unwrap_or(defaults.ocr.tesseract_bin),
                oem: parse_var("OCR_OEM", defaults.ocr.oem),
                psm: parse_var("OCR_PSM", defaults.ocr.psm),
                ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ocr.ollama_url),
                ollama_model: env::var("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
            },
            sessions: SessionConfig {
                ttl_minutes: parse_var("SESSION_TTL_MINUTES", defaults.sessions.ttl_minutes),
                max_upload_bytes: parse_var("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)
                    .saturating_mul(1024 * 1024),
            },
        }
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value '{}' for {}, using {}", raw, key, default);
            default
        }),
        Err(_) => default,
    }
}

/// Parse a comma separated provider list, ignoring unknown names
pub fn parse_providers(raw: &str) -> Vec<OcrProvider> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| match name.parse::<OcrProvider>() {
            Ok(provider) => Some(provider),
            Err(_) => {
                tracing::warn!("Ignoring unknown OCR provider '{}'", name);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_bind_all_interfaces() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.render.dpi, 300);
        assert_eq!(config.ocr.psm, 6);
        assert_eq!(config.ocr.oem, 3);
    }

    #[test]
    fn test_parse_providers() {
        assert_eq!(
            parse_providers("tesseract, ollama"),
            vec![OcrProvider::Tesseract, OcrProvider::Ollama]
        );
        assert_eq!(parse_providers("bogus,,OLLAMA"), vec![OcrProvider::Ollama]);
        assert!(parse_providers("").is_empty());
    }
}
