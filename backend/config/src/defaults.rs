//! Config defaults: fills every field the config file leaves unset.

use crate::schema::{
    EngineConfig, LoggingConfig, OcrGateConfig, ReclaimConfig, ServerConfig, UploadConfig,
};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// 10 MiB upload ceiling.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".tiff", ".bmp"];
pub const DEFAULT_STAGING_DIR: &str = "upload";
pub const DEFAULT_LANGUAGES: &str = "ch_sim,en";

pub const DEFAULT_ENGINE_BINARY: &str = "tesseract";
pub const DEFAULT_MODEL_DIR: &str = "model";
/// Largest width or height handed to the engine.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_RECLAIM_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RETENTION_SECS: u64 = 3600;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: OcrGateConfig) -> OcrGateConfig {
    let config = apply_server_defaults(config);
    let config = apply_upload_defaults(config);
    let config = apply_engine_defaults(config);
    let config = apply_reclaim_defaults(config);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: OcrGateConfig) -> OcrGateConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    server
        .request_timeout_secs
        .get_or_insert(DEFAULT_REQUEST_TIMEOUT_SECS);
    config
}

fn apply_upload_defaults(mut config: OcrGateConfig) -> OcrGateConfig {
    let upload = config.upload.get_or_insert_with(UploadConfig::default);
    upload.max_bytes.get_or_insert(DEFAULT_MAX_UPLOAD_BYTES);
    upload.allowed_extensions.get_or_insert_with(|| {
        DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    });
    upload
        .staging_dir
        .get_or_insert_with(|| DEFAULT_STAGING_DIR.to_string());
    upload
        .default_languages
        .get_or_insert_with(|| DEFAULT_LANGUAGES.to_string());
    config
}

fn apply_engine_defaults(mut config: OcrGateConfig) -> OcrGateConfig {
    let engine = config.engine.get_or_insert_with(EngineConfig::default);
    engine
        .binary
        .get_or_insert_with(|| DEFAULT_ENGINE_BINARY.to_string());
    engine
        .model_dir
        .get_or_insert_with(|| DEFAULT_MODEL_DIR.to_string());
    engine.max_dimension.get_or_insert(DEFAULT_MAX_DIMENSION);
    engine.use_accelerator.get_or_insert(false);
    engine.idle_timeout_secs.get_or_insert(DEFAULT_IDLE_TIMEOUT_SECS);
    config
}

fn apply_reclaim_defaults(mut config: OcrGateConfig) -> OcrGateConfig {
    let reclaim = config.reclaim.get_or_insert_with(ReclaimConfig::default);
    reclaim.interval_secs.get_or_insert(DEFAULT_RECLAIM_INTERVAL_SECS);
    reclaim.retention_secs.get_or_insert(DEFAULT_RETENTION_SECS);
    reclaim
        .shutdown_grace_secs
        .get_or_insert(DEFAULT_SHUTDOWN_GRACE_SECS);
    config
}

fn apply_logging_defaults(mut config: OcrGateConfig) -> OcrGateConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_empty_config() {
        let cfg = apply_all_defaults(OcrGateConfig::default());
        assert_eq!(cfg.server.unwrap().port, Some(DEFAULT_PORT));
        let upload = cfg.upload.unwrap();
        assert_eq!(upload.max_bytes, Some(DEFAULT_MAX_UPLOAD_BYTES));
        assert_eq!(upload.allowed_extensions.unwrap().len(), 5);
        assert_eq!(cfg.engine.unwrap().idle_timeout_secs, Some(300));
        assert!(cfg.logging.unwrap().dir.is_none());
    }

    #[test]
    fn does_not_override_user_values() {
        let mut cfg = OcrGateConfig::default();
        cfg.engine = Some(EngineConfig {
            max_dimension: Some(2048),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        let engine = cfg.engine.unwrap();
        assert_eq!(engine.max_dimension, Some(2048));
        assert_eq!(engine.binary.as_deref(), Some(DEFAULT_ENGINE_BINARY));
    }
}
