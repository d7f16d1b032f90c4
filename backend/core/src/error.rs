use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every way a submitted recognition job can end without a normal result.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("Server is busy processing another request. Please try again later.")]
    Busy,

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    Oversize { size: u64, limit: u64 },

    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("recognition failed: {0}")]
    Recognition(String),

    #[error("recognition timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("service is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// Short stable label used in logs and outcome events.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Busy => "busy",
            GatewayError::Oversize { .. } => "oversize",
            GatewayError::Construction(_) => "construction",
            GatewayError::Recognition(_) => "recognition",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::ShuttingDown => "shutting_down",
            GatewayError::Io(_) => "io",
            GatewayError::Other(_) => "internal",
        }
    }

    /// Rejections happen before any gate hold or staging and leave no trace.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GatewayError::Validation(_) | GatewayError::Busy | GatewayError::ShuttingDown
        )
    }
}

/// Failures reported by an engine factory or a live engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot build engine for [{languages}]: {message}")]
    Construction { languages: String, message: String },

    #[error("{0}")]
    Recognition(String),

    #[error("engine teardown failed: {0}")]
    Teardown(String),
}

impl From<EngineError> for GatewayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Construction { .. } => GatewayError::Construction(err.to_string()),
            EngineError::Recognition(message) => GatewayError::Recognition(message),
            EngineError::Teardown(message) => {
                GatewayError::Other(anyhow::anyhow!("engine teardown failed: {message}"))
            }
        }
    }
}

/// Failures from the image scaling collaborator.
#[derive(Debug, Error)]
#[error("image processing failed for {}: {message}", .path.display())]
pub struct ScaleError {
    pub path: PathBuf,
    pub message: String,
}

impl ScaleError {
    pub fn new(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<ScaleError> for GatewayError {
    fn from(err: ScaleError) -> Self {
        GatewayError::Recognition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_message_tells_caller_to_retry() {
        assert!(GatewayError::Busy.to_string().contains("try again later"));
    }

    #[test]
    fn construction_error_keeps_language_list() {
        let err: GatewayError = EngineError::Construction {
            languages: "en,xx".into(),
            message: "missing model xx".into(),
        }
        .into();
        assert_eq!(err.kind(), "construction");
        assert!(err.to_string().contains("en,xx"));
    }

    #[test]
    fn rejections_are_classified() {
        assert!(GatewayError::Busy.is_rejection());
        assert!(GatewayError::Validation("Invalid file type".into()).is_rejection());
        assert!(!GatewayError::Oversize { size: 2, limit: 1 }.is_rejection());
    }
}
