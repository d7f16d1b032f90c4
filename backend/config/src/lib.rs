//! `ocrgate-config`: runtime configuration for the ocrgate service.
//!
//! Provides:
//! - Typed YAML schema with every field optional
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with dotted-path messages
//! - Resolution into concrete [`Settings`]

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod settings;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, parse_config};
pub use schema::OcrGateConfig;
pub use settings::Settings;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// Warnings are logged; any validation error aborts loading.
pub async fn load_and_prepare(path: &Path) -> Result<OcrGateConfig> {
    prepare(load_config(path).await?, path)
}

/// Apply defaults to an already loaded config and validate it.
///
/// Split from [`load_and_prepare`] so callers can install logging from the
/// raw file before validation findings are reported.
pub fn prepare(config: OcrGateConfig, origin: &Path) -> Result<OcrGateConfig> {
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.first() {
        bail!(
            "config at {} has {} error(s); first: {}",
            origin.display(),
            report.errors.len(),
            first
        );
    }

    Ok(config)
}
