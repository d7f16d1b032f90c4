//! Config validation with dotted field paths in every message.

use crate::schema::OcrGateConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &OcrGateConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_upload(config, &mut report);
    validate_engine(config, &mut report);
    validate_reclaim(config, &mut report);
    report
}

fn validate_server(config: &OcrGateConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    if let Some(port) = server.port {
        if port < 1024 && port != 80 && port != 443 {
            report.warn(
                "server.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
    if server.request_timeout_secs == Some(0) {
        report.error("server.requestTimeoutSecs", "requestTimeoutSecs must be > 0");
    }
}

fn validate_upload(config: &OcrGateConfig, report: &mut ValidationReport) {
    let Some(upload) = &config.upload else { return };
    if upload.max_bytes == Some(0) {
        report.error("upload.maxBytes", "maxBytes must be > 0");
    }
    if let Some(exts) = &upload.allowed_extensions {
        if exts.is_empty() {
            report.error("upload.allowedExtensions", "At least one extension must be allowed");
        }
        for (i, ext) in exts.iter().enumerate() {
            if !ext.starts_with('.') || ext.len() < 2 {
                report.error(
                    format!("upload.allowedExtensions[{i}]"),
                    format!("Extension '{ext}' must start with '.', e.g. '.png'"),
                );
            }
        }
    }
    if let Some(langs) = &upload.default_languages {
        if langs.split(',').all(|code| code.trim().is_empty()) {
            report.error("upload.defaultLanguages", "Default language list cannot be empty");
        }
    }
}

fn validate_engine(config: &OcrGateConfig, report: &mut ValidationReport) {
    let Some(engine) = &config.engine else { return };
    if engine.max_dimension == Some(0) {
        report.error("engine.maxDimension", "maxDimension must be > 0");
    }
    if engine.binary.as_deref().map(str::trim) == Some("") {
        report.error("engine.binary", "Engine binary cannot be empty");
    }
}

fn validate_reclaim(config: &OcrGateConfig, report: &mut ValidationReport) {
    let Some(reclaim) = &config.reclaim else { return };
    let Some(interval) = reclaim.interval_secs else { return };
    if interval == 0 {
        report.error("reclaim.intervalSecs", "intervalSecs must be > 0");
        return;
    }
    if let Some(retention) = reclaim.retention_secs {
        if retention < interval {
            report.warn(
                "reclaim.retentionSecs",
                "Retention is shorter than the reclaim interval; files may linger for a full interval",
            );
        }
    }
    let idle = config.engine.as_ref().and_then(|e| e.idle_timeout_secs);
    if let Some(idle) = idle {
        if idle < interval {
            report.warn(
                "engine.idleTimeoutSecs",
                "Idle timeout is shorter than the reclaim interval; eviction happens on the next pass",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{ReclaimConfig, UploadConfig};

    #[test]
    fn defaults_are_valid() {
        let report = validate(&apply_all_defaults(OcrGateConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    }

    #[test]
    fn extension_without_dot_is_error() {
        let mut cfg = OcrGateConfig::default();
        cfg.upload = Some(UploadConfig {
            allowed_extensions: Some(vec!["png".into()]),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "upload.allowedExtensions[0]");
    }

    #[test]
    fn zero_limits_are_errors() {
        let mut cfg = OcrGateConfig::default();
        cfg.upload = Some(UploadConfig {
            max_bytes: Some(0),
            default_languages: Some(" , ".into()),
            ..Default::default()
        });
        cfg.reclaim = Some(ReclaimConfig {
            interval_secs: Some(0),
            ..Default::default()
        });
        let report = validate(&cfg);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"upload.maxBytes"));
        assert!(paths.contains(&"upload.defaultLanguages"));
        assert!(paths.contains(&"reclaim.intervalSecs"));
    }

    #[test]
    fn short_retention_is_warning() {
        let mut cfg = apply_all_defaults(OcrGateConfig::default());
        if let Some(reclaim) = cfg.reclaim.as_mut() {
            reclaim.retention_secs = Some(10);
        }
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "reclaim.retentionSecs");
    }
}
