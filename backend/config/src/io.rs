//! Config file discovery and loading.

use crate::env::resolve_env_vars;
use crate::schema::OcrGateConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the config directory.
/// Priority: `OCRGATE_CONFIG_DIR` env > `~/.ocrgate/` > `./.ocrgate`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OCRGATE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".ocrgate"),
        None => PathBuf::from(".ocrgate"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read a config file and substitute `${VAR}` references.
///
/// Returns the default config if the file does not exist.
pub async fn load_config(path: &Path) -> Result<OcrGateConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(OcrGateConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&raw)
        .with_context(|| format!("Invalid config at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text into the typed config, resolving env references first.
pub fn parse_config(raw: &str) -> Result<OcrGateConfig> {
    // An empty file parses as YAML null.
    let value: Value = serde_yaml::from_str::<Option<Value>>(raw)
        .context("Failed to parse config YAML")?
        .unwrap_or(Value::Object(Default::default()));
    let value = resolve_env_vars(&value)?;
    serde_json::from_value(value).context("Config does not match the expected schema")
}
