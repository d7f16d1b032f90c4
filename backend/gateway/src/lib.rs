//! ocrgate HTTP gateway.
//!
//! Admits at most one recognition at a time, keeps a single engine warm
//! between requests and reclaims it when idle.

pub mod control_ui;
pub mod gate;
pub mod health_api;
pub mod lifecycle;
pub mod pipeline;
pub mod reclaim;
pub mod server;
pub mod service;
pub mod staging;
pub mod stats;

#[cfg(test)]
mod testing;

pub use gate::{GatePermit, SingleFlightGate};
pub use lifecycle::{EngineLifecycle, EngineStatus, LifecycleState};
pub use pipeline::{PipelineConfig, RequestPipeline, Upload, UploadedFile};
pub use reclaim::{ReclaimReport, ReclaimSettings, Reclaimer};
pub use server::{GatewayState, build_router, serve, start_server};
pub use service::{EngineHealth, OcrService, ServiceConfig};
pub use stats::{StatsCollector, StatsSnapshot};
