//! The recognition service: one gate, one engine slot, one pipeline, one
//! reclaimer, shared by every transport.

use std::sync::Arc;
use std::time::Duration;

use ocrgate_config::Settings;
use ocrgate_core::{
    EngineFactory, EngineOptions, GatewayError, ImageScaler, LanguageSet, RecognitionResult,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::gate::SingleFlightGate;
use crate::lifecycle::{EngineLifecycle, LifecycleState};
use crate::pipeline::{PipelineConfig, RequestPipeline, Upload};
use crate::reclaim::{ReclaimSettings, Reclaimer};
use crate::stats::{StatsCollector, StatsSnapshot};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub pipeline: PipelineConfig,
    pub engine: EngineOptions,
    pub reclaim: ReclaimSettings,
    pub shutdown_grace: Duration,
}

impl From<&Settings> for ServiceConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            pipeline: PipelineConfig::from(settings),
            engine: EngineOptions {
                use_accelerator: settings.use_accelerator,
                max_dimension: settings.max_dimension,
                model_dir: settings.model_dir.clone(),
            },
            reclaim: ReclaimSettings::from(settings),
            shutdown_grace: settings.shutdown_grace,
        }
    }
}

/// Engine view for health checks. Never waits on a running recognition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    pub engine_loaded: bool,
    pub idle_seconds: Option<f64>,
    pub languages: Option<LanguageSet>,
    pub state: LifecycleState,
    pub busy: bool,
    pub backend: String,
    pub constructions: u64,
    pub teardowns: u64,
}

pub struct OcrService {
    pipeline: RequestPipeline,
    gate: SingleFlightGate,
    lifecycle: Arc<EngineLifecycle>,
    stats: Arc<StatsCollector>,
    reclaim: ReclaimSettings,
    shutdown_grace: Duration,
    background: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl OcrService {
    pub fn new(
        config: ServiceConfig,
        factory: Arc<dyn EngineFactory>,
        scaler: Arc<dyn ImageScaler>,
    ) -> Self {
        let gate = SingleFlightGate::new();
        let lifecycle = Arc::new(EngineLifecycle::new(factory, config.engine));
        let stats = Arc::new(StatsCollector::new());
        let pipeline = RequestPipeline::new(
            config.pipeline,
            gate.clone(),
            Arc::clone(&lifecycle),
            scaler,
            Arc::clone(&stats),
        );
        Self {
            pipeline,
            gate,
            lifecycle,
            stats,
            reclaim: config.reclaim,
            shutdown_grace: config.shutdown_grace,
            background: Mutex::new(None),
        }
    }

    /// Starts the background reclaimer. Calling it again is a no-op.
    pub fn start_reclaimer(&self) {
        let mut background = self.background.lock();
        if background.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let handle = Reclaimer::new(
            self.gate.clone(),
            Arc::clone(&self.lifecycle),
            self.reclaim.clone(),
        )
        .spawn(token.clone());
        *background = Some((token, handle));
    }

    pub async fn submit(&self, upload: Upload) -> Result<RecognitionResult, GatewayError> {
        self.pipeline.submit(upload).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn health(&self) -> EngineHealth {
        let status = self.lifecycle.status();
        EngineHealth {
            engine_loaded: status.is_loaded(),
            idle_seconds: status.idle.map(|idle| idle.as_secs_f64()),
            languages: status.languages,
            state: status.state,
            busy: self.gate.is_busy(),
            backend: self.lifecycle.factory_name().to_string(),
            constructions: status.constructions,
            teardowns: status.teardowns,
        }
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Refuses new work, stops the reclaimer, waits up to the grace period
    /// for an in-flight request and then releases the engine.
    pub async fn shutdown(&self) {
        self.pipeline.close();
        info!("Recognition service shutting down");

        let background = self.background.lock().take();
        if let Some((token, handle)) = background {
            token.cancel();
            match tokio::time::timeout(self.shutdown_grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Reclamation task ended abnormally"),
                Err(_) => warn!(
                    grace_secs = self.shutdown_grace.as_secs_f64(),
                    "Reclamation task did not stop in time"
                ),
            }
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        let permit = loop {
            if let Some(permit) = self.gate.try_enter() {
                break Some(permit);
            }
            if tokio::time::Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        match permit {
            Some(permit) => {
                let lifecycle = Arc::clone(&self.lifecycle);
                match tokio::task::spawn_blocking(move || lifecycle.invalidate(&permit)).await {
                    Ok(true) => info!("Engine released"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Engine release task panicked"),
                }
            }
            None => warn!("Request still running at shutdown; engine left to process exit"),
        }
    }
}
