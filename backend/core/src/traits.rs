use std::path::{Path, PathBuf};

use crate::error::{EngineError, ScaleError};
use crate::types::{DetectedRegion, LanguageSet};

/// Options handed to an [`EngineFactory`] on every construction.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub use_accelerator: bool,
    pub max_dimension: u32,
    pub model_dir: PathBuf,
}

/// Builds recognizers for a language set.
///
/// Construction is synchronous and may take seconds to minutes while models
/// load, so callers run it on a blocking thread.
pub trait EngineFactory: Send + Sync {
    /// Human-readable backend name (e.g. "tesseract").
    fn name(&self) -> &str;

    fn construct(
        &self,
        languages: &LanguageSet,
        options: &EngineOptions,
    ) -> Result<Box<dyn VisionEngine>, EngineError>;
}

/// A constructed recognizer. Never called concurrently and has no
/// cancellation hook: once `recognize` starts it runs to completion.
pub trait VisionEngine: Send {
    fn recognize(&mut self, image_path: &Path) -> Result<Vec<DetectedRegion>, EngineError>;

    /// Releases native resources. Called once before the engine is dropped.
    fn release(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Probes and downscales staged images.
pub trait ImageScaler: Send + Sync {
    /// Pixel `(width, height)` of the image at `path`.
    fn dimensions(&self, path: &Path) -> Result<(u32, u32), ScaleError>;

    /// Writes a copy bounded by `max_dimension` on both axes and returns its path.
    fn scale_to_fit(&self, path: &Path, max_dimension: u32) -> Result<PathBuf, ScaleError>;
}
