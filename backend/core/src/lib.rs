pub mod error;
pub mod traits;
pub mod types;

pub use error::{EngineError, GatewayError, ScaleError};
pub use traits::{EngineFactory, EngineOptions, ImageScaler, VisionEngine};
pub use types::{DetailRecord, DetectedRegion, LanguageSet, Quad, RecognitionResult};
