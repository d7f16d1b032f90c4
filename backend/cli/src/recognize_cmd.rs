//! `ocrgate recognize`: one image through the same pipeline the server uses.

use std::path::Path;

use anyhow::{Context, Result};
use ocrgate_config::Settings;
use ocrgate_gateway::Upload;

pub async fn run(
    settings: Settings,
    image: &Path,
    languages: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read image: {}", image.display()))?;
    let filename = image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let service = crate::build_service(&settings);
    let outcome = service.submit(Upload::new(filename, bytes, languages)).await;
    service.shutdown().await;
    let result = outcome?;

    let json = serde_json::to_string_pretty(&result)?;
    println!("{json}");
    if let Some(path) = output {
        tokio::fs::write(path, &json)
            .await
            .with_context(|| format!("Failed to write result: {}", path.display()))?;
    }

    if !result.is_success() {
        anyhow::bail!("recognition failed: {}", result.error);
    }
    Ok(())
}
