//! Concrete runtime settings resolved from an [`OcrGateConfig`].

use crate::defaults::*;
use crate::schema::OcrGateConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Fully resolved settings with no optional knobs left.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub max_upload_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub staging_dir: PathBuf,
    pub default_languages: String,
    pub engine_binary: String,
    pub model_dir: PathBuf,
    pub max_dimension: u32,
    pub use_accelerator: bool,
    pub idle_timeout: Duration,
    pub reclaim_interval: Duration,
    pub retention: Duration,
    pub shutdown_grace: Duration,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from(&OcrGateConfig::default())
    }
}

impl From<&OcrGateConfig> for Settings {
    fn from(cfg: &OcrGateConfig) -> Self {
        let server = cfg.server.clone().unwrap_or_default();
        let upload = cfg.upload.clone().unwrap_or_default();
        let engine = cfg.engine.clone().unwrap_or_default();
        let reclaim = cfg.reclaim.clone().unwrap_or_default();
        let logging = cfg.logging.clone().unwrap_or_default();

        Self {
            bind: server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: server.port.unwrap_or(DEFAULT_PORT),
            request_timeout: Duration::from_secs(
                server
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            max_upload_bytes: upload.max_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            allowed_extensions: upload
                .allowed_extensions
                .unwrap_or_else(|| {
                    DEFAULT_ALLOWED_EXTENSIONS
                        .iter()
                        .map(|e| e.to_string())
                        .collect()
                })
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
            staging_dir: PathBuf::from(
                upload
                    .staging_dir
                    .unwrap_or_else(|| DEFAULT_STAGING_DIR.to_string()),
            ),
            default_languages: upload
                .default_languages
                .unwrap_or_else(|| DEFAULT_LANGUAGES.to_string()),
            engine_binary: engine
                .binary
                .unwrap_or_else(|| DEFAULT_ENGINE_BINARY.to_string()),
            model_dir: PathBuf::from(
                engine
                    .model_dir
                    .unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string()),
            ),
            max_dimension: engine.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION),
            use_accelerator: engine.use_accelerator.unwrap_or(false),
            idle_timeout: Duration::from_secs(
                engine.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
            ),
            reclaim_interval: Duration::from_secs(
                reclaim
                    .interval_secs
                    .unwrap_or(DEFAULT_RECLAIM_INTERVAL_SECS),
            ),
            retention: Duration::from_secs(reclaim.retention_secs.unwrap_or(DEFAULT_RETENTION_SECS)),
            shutdown_grace: Duration::from_secs(
                reclaim
                    .shutdown_grace_secs
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
            log_level: logging
                .level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_dir: logging.dir.map(PathBuf::from),
        }
    }
}
